//! Client configuration: backend location and transport settings.

use std::collections::HashMap;
use std::time::Duration;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

const ENV_BASE_URL: &str = "CHATWIRE_API_URL";
const ENV_API_KEY: &str = "CHATWIRE_API_KEY";
const ENV_TIMEOUT_SECS: &str = "CHATWIRE_TIMEOUT_SECS";

/// A secret string type for bearer tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

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

/// Options for talking to the chat backend.
///
/// The base URL is always explicit; nothing is read from global state once
/// the options have been built.
///
/// # Example
/// ```rust
/// use chatwire::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("http://localhost:3001")
///     .with_timeout(Duration::from_secs(30))
///     .with_header("x-client".to_string(), "web".to_string());
///
/// assert_eq!(options.endpoint("/api/chats"), "http://localhost:3001/api/chats");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Backend origin, e.g. `http://localhost:3001`
    pub base_url: String,

    /// Request timeout. Applies to the whole request, including a streamed body,
    /// so leave it unset for long-running streams.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,

    /// Sent as a bearer token when present
    pub api_key: Option<SecretString>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            proxy: None,
            extra_headers: None,
            api_key: None,
        }
    }

    /// Build options from `CHATWIRE_API_URL`, `CHATWIRE_API_KEY` and
    /// `CHATWIRE_TIMEOUT_SECS`. Unparsable timeouts are ignored.
    pub fn from_env() -> Self {
        let base_url = std::env::var(ENV_BASE_URL)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut options = Self::new(base_url);

        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.is_empty() {
                options = options.with_api_key(key);
            }
        }

        if let Some(secs) = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            options = options.with_timeout(Duration::from_secs(secs));
        }

        options
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Absolute URL for `path` under the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
