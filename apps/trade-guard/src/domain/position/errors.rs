//! Position errors.

use thiserror::Error;

use super::PositionState;
use crate::domain::shared::Symbol;

/// Errors raised by the position aggregate and the position book.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// Transition not allowed by the lifecycle table.
    #[error("Invalid position transition {from} -> {to}: {reason}")]
    InvalidStateTransition {
        /// Current state.
        from: PositionState,
        /// Attempted state.
        to: PositionState,
        /// Human-readable reason.
        reason: String,
    },

    /// A second active position was requested for a symbol.
    #[error("Position already active for {symbol} ({state})")]
    AlreadyActive {
        /// Symbol.
        symbol: Symbol,
        /// State of the existing position.
        state: PositionState,
    },

    /// No active position for the symbol.
    #[error("No active position for {symbol}")]
    NotFound {
        /// Symbol.
        symbol: Symbol,
    },

    /// Exchange fill data was unusable.
    #[error("Invalid fill for {symbol}: {message}")]
    InvalidFill {
        /// Symbol.
        symbol: Symbol,
        /// Details.
        message: String,
    },
}
