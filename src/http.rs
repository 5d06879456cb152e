//! Request engine.
//!
//! Turns a [`RequestDescriptor`] into an authenticated HTTP exchange with
//! bounded automatic retries. One logical call may span several physical
//! attempts; attempts run strictly one after another.
//!
//! Retry policy, for attempts numbered `0..=max_retries`:
//! - rate limits and connection failures back off exponentially
//!   (`retry_delay * 2^attempt`), preferring the server's `Retry-After`
//! - authentication, permission and not-found failures surface immediately
//! - a timeout surfaces immediately
//! - anything else is retried straight away until the budget is spent

use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, ClientError, ErrorKind};
use crate::options::ClientOptions;

const USER_AGENT_VALUE: &str = concat!("usai-rust/", env!("CARGO_PKG_VERSION"));

/// HTTP method of a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One logical request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: Method,
    pub body: Option<Value>,
    /// Merged over the default headers; same-name entries win
    pub headers: HeaderMap,
    /// Return the open body instead of parsing it
    pub stream: bool,
}

impl RequestDescriptor {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            body: None,
            headers: HeaderMap::new(),
            stream: false,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: Method::Post,
            body: Some(body),
            headers: HeaderMap::new(),
            stream: false,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Rate-limit counters reported by the service. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u64,
    pub reset: u64,
    pub limit: u64,
}

impl RateLimitInfo {
    /// Read the `X-RateLimit-*` headers; all three must be present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        };
        Some(Self {
            remaining: read("x-ratelimit-remaining")?,
            reset: read("x-ratelimit-reset")?,
            limit: read("x-ratelimit-limit")?,
        })
    }
}

/// Body of a successful exchange.
#[derive(Debug)]
pub enum Payload {
    Json(Value),
    /// Unread body, handed to [`crate::sse`]
    Stream(reqwest::Response),
}

/// Result of a successful logical call.
#[derive(Debug)]
pub struct EngineResponse {
    pub status: StatusCode,
    pub rate_limit: Option<RateLimitInfo>,
    pub payload: Payload,
}

impl EngineResponse {
    /// Parsed JSON body, or an error if the request was streamed.
    pub fn into_json(self) -> Result<Value, ClientError> {
        match self.payload {
            Payload::Json(value) => Ok(value),
            Payload::Stream(_) => Err(ClientError::InvalidRequest(
                "expected a JSON body but the request was streamed".to_string(),
            )),
        }
    }

    /// Open byte stream, or an error if the body was already parsed.
    pub fn into_stream(self) -> Result<reqwest::Response, ClientError> {
        match self.payload {
            Payload::Stream(response) => Ok(response),
            Payload::Json(_) => Err(ClientError::InvalidRequest(
                "expected a streamed body but the request was not streamed".to_string(),
            )),
        }
    }
}

/// Build a configured HTTP client from client options.
///
/// The per-attempt timeout is enforced by the engine, not here, so long
/// streaming bodies are not cut off.
pub fn build_http_client(options: &ClientOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(proxy_url) = &options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("Invalid proxy {:?}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Wait before the next attempt, or `None` to surface `error` now.
pub fn retry_delay(error: &ApiError, attempt: u32, options: &ClientOptions) -> Option<Duration> {
    if attempt >= options.max_retries || !error.is_retryable() {
        return None;
    }

    let delay = match error.kind {
        ErrorKind::RateLimit => error
            .retry_after()
            .filter(|wait| !wait.is_zero())
            .unwrap_or_else(|| backoff(options.retry_delay, attempt)),
        ErrorKind::Connection => backoff(options.retry_delay, attempt),
        _ => Duration::ZERO,
    };
    Some(delay)
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Issues requests against one service with the configured retry policy.
///
/// Cheap to clone; clones share the underlying connection pool and nothing
/// else.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    http: Client,
    options: ClientOptions,
    authorization: HeaderValue,
}

impl HttpEngine {
    /// Validate `options` and build the engine. Makes no network calls.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        options.validate()?;

        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", options.api_key.expose_secret()))
                .map_err(|_| ClientError::Config("Invalid API key".to_string()))?;
        authorization.set_sensitive(true);

        let http = build_http_client(&options)?;

        Ok(Self {
            http,
            options,
            authorization,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Run one logical call, retrying per the engine's policy.
    ///
    /// Returns the most recent classified error once retries are exhausted.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<EngineResponse, ApiError> {
        let mut attempt = 0u32;

        loop {
            debug!(
                method = ?request.method,
                path = %request.path,
                attempt,
                "sending request"
            );

            let error = match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            match retry_delay(&error, attempt, &self.options) {
                Some(delay) => {
                    warn!(
                        kind = %error.kind,
                        status = ?error.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "request failed, retrying: {}",
                        error.message
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                None => {
                    debug!(kind = %error.kind, attempt, "request failed: {}", error.message);
                    return Err(error);
                }
            }
        }
    }

    /// One physical attempt.
    async fn send_once(&self, request: &RequestDescriptor) -> Result<EngineResponse, ApiError> {
        let url = format!("{}{}", self.options.normalized_base_url(), request.path);

        let mut builder = self
            .http
            .request(request.method.into(), &url)
            .headers(self.headers_for(request));

        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::generic(format!("Failed to encode request body: {}", e), None))?;
            builder = builder.body(bytes);
        }

        // Dropping the send future on expiry aborts the in-flight exchange.
        let response = match tokio::time::timeout(self.options.timeout, builder.send()).await {
            Err(_) => return Err(ApiError::timeout("Request timed out")),
            Ok(result) => result?,
        };

        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());

        if status.is_success() {
            if request.stream {
                return Ok(EngineResponse {
                    status,
                    rate_limit,
                    payload: Payload::Stream(response),
                });
            }

            let bytes = response.bytes().await?;
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::generic(
                    format!("Invalid JSON in response body: {}", e),
                    Some(status.as_u16()),
                )
            })?;
            return Ok(EngineResponse {
                status,
                rate_limit,
                payload: Payload::Json(value),
            });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.unwrap_or_default();

        Err(ApiError::from_response(status, &body, retry_after.as_deref()))
    }

    fn headers_for(&self, request: &RequestDescriptor) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        for (name, value) in request.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }
}
