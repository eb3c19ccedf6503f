//! Application Ports (Driven)
//!
//! Interfaces to the systems a bot depends on: the exchange account, the
//! decision oracle and the position store.

mod decision_oracle;
mod market_adapter;
mod position_store;

#[cfg(test)]
pub use decision_oracle::MockDecisionOracle;
pub use decision_oracle::{
    DecisionOracle, OracleContext, OracleError, OracleProposal, OracleRequest,
};
pub use market_adapter::{AdapterError, MarketAdapter, OrderRequest, OrderResult};
pub use position_store::{PersistenceError, PositionStore};
