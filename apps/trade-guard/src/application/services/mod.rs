//! Application Services
//!
//! Stateful collaborators the orchestrator drives every cycle: the market
//! cache, the position book and the execution gateway.

mod execution_gateway;
mod market_cache;
mod position_book;

pub use execution_gateway::{ExecutionGateway, GatewayConfig, GatewayError, OrderFill};
pub use market_cache::{CacheError, MarketCache};
pub use position_book::{BookError, CloseOutcome, OpenRequest, PositionBook, ReconcileSummary};
