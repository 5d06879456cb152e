//! Error types.
//!
//! Every failure reaching the caller is either a configuration problem caught
//! before any request is made, or an [`ApiError`]: a classified failure whose
//! [`ErrorKind`] drives the retry policy in [`crate::http`].

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Discriminator for a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimit,
    Authentication,
    Permission,
    NotFound,
    Connection,
    Timeout,
    Generic,
}

impl ErrorKind {
    /// Stable `type` string, matching the service's error vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit_error",
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::Permission => "permission_error",
            ErrorKind::NotFound => "not_found_error",
            ErrorKind::Connection => "connection_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Generic => "api_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure mapped from an HTTP status or a transport fault.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// `type` reported by the server, or the kind's own type string
    pub error_type: String,
    pub code: Option<String>,
    pub param: Option<String>,
    pub status: Option<u16>,
    /// Only set for [`ErrorKind::RateLimit`]
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    fn with_kind(kind: ErrorKind, message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            kind,
            message: message.into(),
            error_type: kind.as_str().to_string(),
            code: None,
            param: None,
            status,
            retry_after_secs: None,
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self {
            retry_after_secs,
            ..Self::with_kind(ErrorKind::RateLimit, message, Some(429))
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Authentication, message, Some(401))
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Permission, message, Some(403))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotFound, message, Some(404))
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Connection, message, None)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Timeout, message, None)
    }

    /// Any other failure; `error_type` defaults to `api_error`.
    pub fn generic(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::with_kind(ErrorKind::Generic, message, status)
    }

    /// Map a non-2xx response to a classified error.
    ///
    /// `body` is the raw response body; when it is not a structured error
    /// payload the message falls back to the status line.
    pub fn from_response(status: StatusCode, body: &[u8], retry_after: Option<&str>) -> Self {
        let detail = serde_json::from_slice::<ErrorResponse>(body)
            .map(|resp| resp.error)
            .unwrap_or_else(|_| ErrorDetail {
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown Status")
                ),
                error_type: ErrorKind::Generic.as_str().to_string(),
                code: None,
                param: None,
            });

        match status.as_u16() {
            401 => Self::authentication(detail.message),
            403 => Self::permission(detail.message),
            404 => Self::not_found(detail.message),
            429 => Self::rate_limit(
                detail.message,
                retry_after.and_then(|v| v.trim().parse::<u64>().ok()),
            ),
            code => Self {
                error_type: detail.error_type,
                code: detail.code.as_ref().and_then(value_to_string),
                param: detail.param,
                ..Self::generic(detail.message, Some(code))
            },
        }
    }

    /// Server-requested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_secs.map(Duration::from_secs)
    }

    /// Whether the engine may attempt the request again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RateLimit | ErrorKind::Connection | ErrorKind::Generic
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ApiError::connection(format!("Connection failed: {}", err))
        } else {
            ApiError::connection(err.to_string())
        }
    }
}

/// Errors returned by the client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// The classified failure, when this error came from the service.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.api_error().map(|err| err.kind)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type", default = "default_error_type")]
    error_type: String,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    param: Option<String>,
}

fn default_error_type() -> String {
    ErrorKind::Generic.as_str().to_string()
}

// Some backends send numeric codes.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(ErrorKind::RateLimit.as_str(), "rate_limit_error");
        assert_eq!(ErrorKind::Authentication.as_str(), "authentication_error");
        assert_eq!(ErrorKind::Permission.as_str(), "permission_error");
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found_error");
        assert_eq!(ErrorKind::Connection.as_str(), "connection_error");
        assert_eq!(ErrorKind::Timeout.as_str(), "timeout_error");
        assert_eq!(ErrorKind::Generic.as_str(), "api_error");
    }

    #[test]
    fn test_rate_limit_error() {
        let err = ApiError::rate_limit("Rate limited", Some(60));
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.error_type, "rate_limit_error");
        assert_eq!(err.status, Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
        assert_eq!(err.to_string(), "rate_limit_error: Rate limited");
    }

    #[test]
    fn test_fixed_statuses() {
        assert_eq!(ApiError::authentication("x").status, Some(401));
        assert_eq!(ApiError::permission("x").status, Some(403));
        assert_eq!(ApiError::not_found("x").status, Some(404));
        assert_eq!(ApiError::connection("x").status, None);
        assert_eq!(ApiError::timeout("x").error_type, "timeout_error");
    }

    #[test]
    fn test_from_response_structured_body() {
        let body = br#"{"error":{"message":"bad temperature","type":"invalid_request_error","code":"E001","param":"temperature"}}"#;
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, body, None);

        assert_eq!(err.kind, ErrorKind::Generic);
        assert_eq!(err.message, "bad temperature");
        assert_eq!(err.error_type, "invalid_request_error");
        assert_eq!(err.code.as_deref(), Some("E001"));
        assert_eq!(err.param.as_deref(), Some("temperature"));
        assert_eq!(err.status, Some(400));
    }

    #[test]
    fn test_from_response_numeric_code() {
        let body = br#"{"error":{"message":"boom","type":"server_error","code":500}}"#;
        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, body, None);
        assert_eq!(err.code.as_deref(), Some("500"));
    }

    #[test]
    fn test_from_response_unparsable_body() {
        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, b"<html>oops</html>", None);
        assert_eq!(err.kind, ErrorKind::Generic);
        assert_eq!(err.message, "HTTP 502: Bad Gateway");
        assert_eq!(err.error_type, "api_error");
        assert_eq!(err.status, Some(502));
    }

    #[test]
    fn test_from_response_status_mapping() {
        let body = br#"{"error":{"message":"nope","type":"x"}}"#;
        let kind = |status: u16| {
            ApiError::from_response(StatusCode::from_u16(status).unwrap(), body, None).kind
        };
        assert_eq!(kind(401), ErrorKind::Authentication);
        assert_eq!(kind(403), ErrorKind::Permission);
        assert_eq!(kind(404), ErrorKind::NotFound);
        assert_eq!(kind(429), ErrorKind::RateLimit);
        assert_eq!(kind(503), ErrorKind::Generic);
    }

    #[test]
    fn test_from_response_retry_after() {
        let err = ApiError::from_response(StatusCode::TOO_MANY_REQUESTS, b"", Some("5"));
        assert_eq!(err.retry_after_secs, Some(5));
        assert_eq!(err.message, "HTTP 429: Too Many Requests");

        let err = ApiError::from_response(StatusCode::TOO_MANY_REQUESTS, b"", Some("soon"));
        assert_eq!(err.retry_after_secs, None);
    }

    #[test]
    fn test_is_retryable() {
        assert!(ApiError::rate_limit("x", None).is_retryable());
        assert!(ApiError::connection("x").is_retryable());
        assert!(ApiError::generic("x", Some(500)).is_retryable());
        assert!(!ApiError::authentication("x").is_retryable());
        assert!(!ApiError::permission("x").is_retryable());
        assert!(!ApiError::not_found("x").is_retryable());
        assert!(!ApiError::timeout("x").is_retryable());
    }

    #[test]
    fn test_client_error_kind() {
        let err = ClientError::from(ApiError::not_found("missing"));
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.to_string(), "not_found_error: missing");
        assert_eq!(ClientError::Config("x".into()).kind(), None);
    }
}
