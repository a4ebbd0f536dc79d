//! Configuration for the HTTP downloads backend.

use std::time::Duration;

/// Default base URL of the downloads API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api/";

/// Configuration for [`ReqwestBackend`](crate::ReqwestBackend).
///
/// # Example
///
/// ```
/// use jobsync_http::HttpBackendConfig;
/// use std::time::Duration;
///
/// let config = HttpBackendConfig::new()
///     .with_base_url("https://downloads.internal/api")
///     .with_timeout(Duration::from_secs(10))
///     .with_token("secret");
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL every endpoint is resolved against
    pub(crate) base_url: String,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Per-request timeout
    pub(crate) timeout: Duration,
    /// Optional bearer token
    pub(crate) token: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("jobsync-http/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

impl HttpBackendConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL. A trailing slash is added if missing.
    ///
    /// Defaults to `http://localhost:3001/api/`.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the user agent string for HTTP requests.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the per-request timeout.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a bearer token sent with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set an optional bearer token.
    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
