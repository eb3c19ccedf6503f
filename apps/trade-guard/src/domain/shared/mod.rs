//! Shared Domain Types
//!
//! Value objects and errors shared across the market, decision, position and
//! exit-rule contexts.

pub mod errors;
pub mod value_objects;

pub use errors::DomainError;
pub use value_objects::{
    ClientOrderId, CycleId, ExchangeId, ExchangeMarketId, OrderId, PositionId, Symbol, Timestamp,
    TradeRecordId,
};
