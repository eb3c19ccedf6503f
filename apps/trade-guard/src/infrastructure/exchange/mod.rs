//! Exchange Adapters
//!
//! Implementations of the `MarketAdapter` port. Only the simulated paper
//! account ships here; venue SDK adapters live outside this crate.

pub mod paper;

pub use paper::{PaperExchange, PaperExchangeConfig, PaperMarketConfig};
