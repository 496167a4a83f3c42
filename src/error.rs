use thiserror::Error;

/// Unified error type for the browser pool
#[derive(Error, Debug)]
pub enum PoolError {
    // Task errors
    #[error("Handler failed: {0}")]
    HandlerFailure(String),

    #[error("Proxy connectivity failed: {0}")]
    ProxyConnectivityFailure(String),

    #[error("Task cancelled")]
    Cancelled,

    // Proxy errors
    #[error("No proxies available")]
    ResourceExhausted,

    #[error("Malformed proxy entry: {0}")]
    MalformedProxyEntry(String),

    // Pool lifecycle
    #[error("Worker pool is already running")]
    AlreadyRunning,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

impl PoolError {
    /// Whether the failure is attributable to the proxy rather than the handler
    pub fn is_proxy_failure(&self) -> bool {
        matches!(self, PoolError::ProxyConnectivityFailure(_))
    }

    /// Whether a task that failed with this error may be attempted again
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PoolError::Cancelled | PoolError::InvalidConfig(_) | PoolError::AlreadyRunning
        )
    }
}

// Transport-level failures reaching a supplier or the browser are proxy-attributable,
// anything else the HTTP client reports is an ordinary HTTP error.
impl From<reqwest::Error> for PoolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            PoolError::ProxyConnectivityFailure(err.to_string())
        } else {
            PoolError::Http(err.to_string())
        }
    }
}
