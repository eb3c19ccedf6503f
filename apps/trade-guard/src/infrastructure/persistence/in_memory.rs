//! In-memory position store for tests and dry runs.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::application::ports::{PersistenceError, PositionStore};
use crate::domain::position::{Position, TradeRecord};
use crate::domain::shared::ExchangeId;

#[derive(Debug, Default)]
struct StoreState {
    active: HashMap<ExchangeId, Vec<Position>>,
    archived: Vec<Position>,
    trades: Vec<TradeRecord>,
}

/// In-memory implementation of `PositionStore`.
///
/// State lives as long as the value. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    state: RwLock<StoreState>,
}

impl InMemoryPositionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Every archived position, all exchanges.
    #[must_use]
    pub fn archived(&self) -> Vec<Position> {
        self.read().archived.clone()
    }

    /// Every journal record, all exchanges.
    #[must_use]
    pub fn trades(&self) -> Vec<TradeRecord> {
        self.read().trades.clone()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn load_positions(&self, exchange: &ExchangeId) -> Result<Vec<Position>, PersistenceError> {
        Ok(self.read().active.get(exchange).cloned().unwrap_or_default())
    }

    async fn save_positions(
        &self,
        exchange: &ExchangeId,
        positions: &[Position],
    ) -> Result<(), PersistenceError> {
        self.write()
            .active
            .insert(exchange.clone(), positions.to_vec());
        Ok(())
    }

    async fn archive_position(&self, position: &Position) -> Result<(), PersistenceError> {
        self.write().archived.push(position.clone());
        Ok(())
    }

    async fn append_trade(&self, record: &TradeRecord) -> Result<(), PersistenceError> {
        self.write().trades.push(record.clone());
        Ok(())
    }

    async fn load_trades(&self, exchange: &ExchangeId) -> Result<Vec<TradeRecord>, PersistenceError> {
        Ok(self
            .read()
            .trades
            .iter()
            .filter(|r| &r.exchange == exchange)
            .cloned()
            .collect())
    }
}
