//! Position Store Port (Driven Port)
//!
//! Durable home of the position book: the active snapshot, archived closed
//! positions and the append-only trade journal, all keyed by exchange.

use async_trait::async_trait;

use crate::domain::position::{Position, TradeRecord};
use crate::domain::shared::ExchangeId;

/// Persistence error.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem or backend I/O failure.
    #[error("Persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized.
    #[error("Persistence serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data is inconsistent.
    #[error("Corrupt persisted state for {exchange}: {message}")]
    Corrupt {
        /// Exchange account.
        exchange: ExchangeId,
        /// What is wrong.
        message: String,
    },
}

/// Port for position persistence.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Load the active positions of an exchange account.
    async fn load_positions(&self, exchange: &ExchangeId) -> Result<Vec<Position>, PersistenceError>;

    /// Replace the stored active positions of an exchange account.
    async fn save_positions(
        &self,
        exchange: &ExchangeId,
        positions: &[Position],
    ) -> Result<(), PersistenceError>;

    /// Move a closed position to the archive.
    async fn archive_position(&self, position: &Position) -> Result<(), PersistenceError>;

    /// Append one journal record.
    async fn append_trade(&self, record: &TradeRecord) -> Result<(), PersistenceError>;

    /// Read the journal of an exchange account, oldest first.
    async fn load_trades(&self, exchange: &ExchangeId) -> Result<Vec<TradeRecord>, PersistenceError>;
}
