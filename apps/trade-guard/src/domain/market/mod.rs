//! Market Bounded Context
//!
//! Tradeable perpetual markets as discovered from an exchange. Discovery is
//! the only source of the symbol to exchange-market-id mapping.

mod entity;
mod snapshot;

pub use entity::{Market, MarketStatus};
pub use snapshot::MarketSnapshot;
