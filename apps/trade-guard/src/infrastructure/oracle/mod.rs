//! Decision Oracle Adapters

pub mod http;

pub use http::{HttpDecisionOracle, HttpOracleConfig};
