//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{PoolError, Result};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(config: &LogConfig) -> String {
    format!("browser_pool={}", config.level.trim().to_lowercase())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `LogConfig.level`.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config).into());

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    installed.map_err(|e| PoolError::InvalidConfig(format!("failed to initialise logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_level() {
        let config = LogConfig {
            level: "DEBUG".to_string(),
            format: "json".to_string(),
        };
        assert_eq!(default_filter(&config), "browser_pool=debug");
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = LogConfig::default();
        let _ = init(&config);
        assert!(matches!(init(&config), Err(PoolError::InvalidConfig(_))));
    }
}
