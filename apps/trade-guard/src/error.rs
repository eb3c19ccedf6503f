//! Top-level error for the trade-guard binary.
//!
//! Library layers keep their own `thiserror` enums; this one only gathers
//! what can stop the process at startup, and maps it to an exit status.

use thiserror::Error;

use crate::application::ports::OracleError;
use crate::application::services::BookError;
use crate::config::ConfigError;
use crate::observability::{LoggingError, MetricsError};

/// Exit status for configuration errors (`EX_CONFIG` from sysexits.h).
pub const EXIT_CONFIG: u8 = 78;

/// Exit status for every other startup failure.
pub const EXIT_FAILURE: u8 = 1;

/// Errors that stop the bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be set up.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// Metrics exporter could not be started.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Oracle client could not be built.
    #[error("Oracle client setup failed: {0}")]
    Oracle(#[from] OracleError),

    /// Persisted positions could not be restored.
    #[error("Position restore failed: {0}")]
    Restore(#[from] BookError),
}

impl BotError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Logging(_) => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }
}
