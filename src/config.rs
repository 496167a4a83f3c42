use crate::error::{PoolError, Result};
use crate::proxy::supplier::geonode::DEFAULT_MAX_RESPONSE_TIME_MS;
use std::env;
use std::path::PathBuf;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Worker pool configuration
    pub pool: PoolConfig,
    /// Proxy source configuration
    pub proxy: ProxySourceConfig,
    /// Logging configuration
    pub log: LogConfig,
}

/// Which task failures penalise the proxy that was used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlacklistPolicy {
    /// Only proxy connectivity failures blacklist the proxy
    #[default]
    ConnectivityOnly,
    /// Every failure blacklists the proxy
    AnyFailure,
    /// Failures never blacklist; success still whitelists
    Never,
}

impl BlacklistPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "connectivity" | "connectivity_only" | "proxy" => Some(Self::ConnectivityOnly),
            "any" | "any_failure" | "always" => Some(Self::AnyFailure),
            "never" | "none" => Some(Self::Never),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectivityOnly => "connectivity",
            Self::AnyFailure => "any",
            Self::Never => "never",
        }
    }

    /// Whether a failure with this error should blacklist the proxy
    pub fn should_blacklist(&self, error: &PoolError) -> bool {
        match self {
            Self::ConnectivityOnly => error.is_proxy_failure(),
            Self::AnyFailure => true,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers (default: 3)
    pub num_workers: usize,
    /// Retries allowed after the first attempt (default: 5)
    pub max_retries: u32,
    /// Proxy feedback on failure
    pub blacklist_policy: BlacklistPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 3,
            max_retries: 5,
            blacklist_policy: BlacklistPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn new(num_workers: usize, max_retries: u32) -> Self {
        Self {
            num_workers,
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_blacklist_policy(mut self, policy: BlacklistPolicy) -> Self {
        self.blacklist_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "num_workers must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProxySourceConfig {
    /// Static proxy list file
    pub proxy_file: Option<PathBuf>,
    /// ProxyScrape endpoint
    pub proxyscrape_url: Option<Url>,
    /// GeoNode endpoint
    pub geonode_url: Option<Url>,
    /// GeoNode entries slower than this are dropped (ms)
    pub max_response_time_ms: f64,
    /// Supplier request timeout in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for ProxySourceConfig {
    fn default() -> Self {
        Self {
            proxy_file: None,
            proxyscrape_url: None,
            geonode_url: None,
            max_response_time_ms: DEFAULT_MAX_RESPONSE_TIME_MS,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let pool = PoolConfig {
            num_workers: get_env_or("POOL_WORKERS", "3").parse().map_err(|_| {
                PoolError::InvalidConfig("POOL_WORKERS must be a positive number".into())
            })?,
            max_retries: get_env_or("POOL_MAX_RETRIES", "5").parse().map_err(|_| {
                PoolError::InvalidConfig("POOL_MAX_RETRIES must be a non-negative number".into())
            })?,
            blacklist_policy: {
                let raw = get_env_or("POOL_BLACKLIST_POLICY", "connectivity");
                BlacklistPolicy::from_str(&raw).ok_or_else(|| {
                    PoolError::InvalidConfig(format!(
                        "POOL_BLACKLIST_POLICY must be connectivity, any or never, got {}",
                        raw
                    ))
                })?
            },
        };
        pool.validate()?;

        Ok(Config {
            pool,
            proxy: ProxySourceConfig {
                proxy_file: get_env_opt("PROXY_FILE").map(PathBuf::from),
                proxyscrape_url: parse_url("PROXY_PROXYSCRAPE_URL")?,
                geonode_url: parse_url("PROXY_GEONODE_URL")?,
                max_response_time_ms: get_env_or("PROXY_MAX_RESPONSE_TIME_MS", "500")
                    .parse()
                    .map_err(|_| {
                        PoolError::InvalidConfig(
                            "PROXY_MAX_RESPONSE_TIME_MS must be a number".into(),
                        )
                    })?,
                fetch_timeout_secs: get_env_or("PROXY_FETCH_TIMEOUT", "30")
                    .parse()
                    .unwrap_or(30),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }
}

fn parse_url(key: &str) -> Result<Option<Url>> {
    let Some(raw) = get_env_opt(key) else {
        return Ok(None);
    };

    let url = Url::parse(&raw)
        .map_err(|e| PoolError::InvalidConfig(format!("{} must be a valid URL: {}", key, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PoolError::InvalidConfig(format!(
            "{} has unsupported scheme: {}",
            key,
            url.scheme()
        )));
    }

    Ok(Some(url))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a non-blank environment variable
fn get_env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
