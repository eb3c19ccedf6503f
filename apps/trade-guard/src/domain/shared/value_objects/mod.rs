//! Shared Value Objects
//!
//! Immutable domain types compared by value, not identity.

mod identifiers;
mod symbol;
mod timestamp;

pub use identifiers::{
    ClientOrderId, CycleId, ExchangeId, ExchangeMarketId, OrderId, PositionId, TradeRecordId,
};
pub use symbol::Symbol;
pub use timestamp::Timestamp;
