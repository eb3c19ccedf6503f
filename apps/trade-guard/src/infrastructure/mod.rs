//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `exchange/`: `MarketAdapter` implementations (paper account)
//! - `oracle/`: `DecisionOracle` over HTTP
//! - `persistence/`: `PositionStore` in memory and as JSON files

pub mod exchange;
pub mod oracle;
pub mod persistence;
