//! Structured logging setup.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber built from `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when console logging is disabled or a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::info!(app = %config.app_name, level = %config.log_level, "logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_disabled() {
        let config = LoggingConfig {
            log_to_console: false,
            ..LoggingConfig::default()
        };
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_subscriber_installed_once() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config));
        assert!(!init_logging(&config));
    }
}
