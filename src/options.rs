//! Client configuration.
//!
//! Options are loaded once when a client is constructed and never re-checked
//! afterwards. Missing credentials fail at construction time, before any
//! request is attempted.

use std::time::Duration;

use url::Url;

use crate::error::ClientError;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Connection and retry settings for a client.
///
/// # Example
/// ```rust
/// use usai::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("sk-test", "https://api.example.gov")
///     .with_timeout(Duration::from_secs(10))
///     .with_max_retries(5);
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bearer token sent with every request
    pub api_key: SecretString,

    /// Service root; request paths are appended verbatim
    pub base_url: String,

    /// Deadline for receiving response headers on each attempt
    pub timeout: Duration,

    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Base delay for exponential backoff
    pub retry_delay: Duration,

    /// HTTP proxy URL
    pub proxy: Option<String>,
}

impl ClientOptions {
    /// Create options with the default timeout and retry policy.
    pub fn new(api_key: impl Into<SecretString>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy: None,
        }
    }

    /// Load options from `USAI_API_KEY`, `USAI_BASE_URL` and the optional
    /// `USAI_TIMEOUT_MS`, `USAI_MAX_RETRIES` and `USAI_RETRY_DELAY_MS`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("USAI_API_KEY").unwrap_or_default();
        let base_url = lookup("USAI_BASE_URL").unwrap_or_default();
        let mut options = Self::new(api_key, base_url);

        if let Some(ms) = parse_env_number::<u64>(&lookup, "USAI_TIMEOUT_MS")? {
            options.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_env_number::<u32>(&lookup, "USAI_MAX_RETRIES")? {
            options.max_retries = retries;
        }
        if let Some(ms) = parse_env_number::<u64>(&lookup, "USAI_RETRY_DELAY_MS")? {
            options.retry_delay = Duration::from_millis(ms);
        }

        options.validate()?;
        Ok(options)
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base backoff delay.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Check the invariants every client relies on.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ClientError::Config("API key is required".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("Base URL is required".to_string()));
        }
        Url::parse(self.base_url.trim())
            .map_err(|e| ClientError::Config(format!("Invalid base URL {:?}: {}", self.base_url, e)))?;
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub(crate) fn normalized_base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

fn parse_env_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("{key} must be a number: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new("key", "https://api.example.gov");
        assert_eq!(options.timeout, Duration::from_millis(30_000));
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_millis(1_000));
        assert!(options.proxy.is_none());
    }

    #[test]
    fn test_missing_api_key() {
        let err = ClientOptions::new("", "https://api.example.gov")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: API key is required");
    }

    #[test]
    fn test_missing_base_url() {
        let err = ClientOptions::new("key", "").validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Base URL is required");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ClientOptions::new("key", "not a url").validate().unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.starts_with("Invalid base URL")));
    }

    #[test]
    fn test_normalized_base_url() {
        let options = ClientOptions::new("key", "https://api.example.gov/");
        assert_eq!(options.normalized_base_url(), "https://api.example.gov");
    }

    #[test]
    fn test_secret_is_redacted() {
        let options = ClientOptions::new("sk-very-secret", "https://api.example.gov");
        let rendered = format!("{:?}", options);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_lookup() {
        let options = ClientOptions::from_lookup(lookup_from(&[
            ("USAI_API_KEY", "key"),
            ("USAI_BASE_URL", "https://api.example.gov"),
            ("USAI_TIMEOUT_MS", "5000"),
            ("USAI_MAX_RETRIES", "1"),
        ]))
        .unwrap();

        assert_eq!(options.api_key.expose_secret(), "key");
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.retry_delay, DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_from_lookup_requires_key() {
        let err = ClientOptions::from_lookup(lookup_from(&[(
            "USAI_BASE_URL",
            "https://api.example.gov",
        )]))
        .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_from_lookup_rejects_bad_number() {
        let err = ClientOptions::from_lookup(lookup_from(&[
            ("USAI_API_KEY", "key"),
            ("USAI_BASE_URL", "https://api.example.gov"),
            ("USAI_MAX_RETRIES", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.starts_with("USAI_MAX_RETRIES")));
    }
}
