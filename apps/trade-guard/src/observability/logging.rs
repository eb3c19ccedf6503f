//! Structured logging setup.
//!
//! `RUST_LOG` supplies the base filter; the configured level is added as a
//! `trade_guard=<level>` directive on top of it.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level for this crate's targets (`trace` .. `error`).
    pub level: String,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Error type for logging setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level does not parse as a filter directive.
    #[error("invalid log level '{level}': {message}")]
    InvalidLevel {
        /// Configured level.
        level: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber is already installed.
    #[error("failed to initialize tracing subscriber: {0}")]
    Subscriber(String),
}

/// Build the filter for a configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let directive: Directive =
        format!("trade_guard={level}")
            .parse()
            .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::InvalidLevel {
                level: level.to_string(),
                message: e.to_string(),
            })?;
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    Ok(base.add_directive(directive))
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level)?;
    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    result.map_err(|e| LoggingError::Subscriber(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("info")]
    #[test_case("debug")]
    #[test_case("warn")]
    fn known_levels_build(level: &str) {
        assert!(build_filter(level).is_ok());
    }

    #[test]
    fn garbage_level_is_rejected() {
        let Err(err) = build_filter("loud!!") else {
            panic!("expected invalid level");
        };
        assert!(matches!(err, LoggingError::InvalidLevel { .. }));
    }
}
