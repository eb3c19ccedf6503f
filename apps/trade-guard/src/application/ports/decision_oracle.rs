//! Decision Oracle Port (Driven Port)
//!
//! The external decision source. Its output is untrusted: the port hands
//! back the raw JSON body, and the caller runs it through
//! [`parse_decisions`](crate::domain::decision::parse_decisions).

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::decision::{DecisionParseError, ParsedDecisions, parse_decisions};
use crate::domain::market::Market;
use crate::domain::position::Position;
use crate::domain::shared::{CycleId, ExchangeId, Timestamp};

/// Cycle context sent alongside the snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleContext {
    /// Cycle asking.
    pub cycle_id: CycleId,
    /// Exchange account.
    pub exchange: ExchangeId,
    /// Free collateral.
    pub balance: Option<Decimal>,
    /// Strategy version in force.
    pub strategy_version: u64,
    /// Strategy name.
    pub strategy_name: String,
    /// Cycle time.
    pub now: Timestamp,
}

/// Everything the oracle sees for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Cycle context.
    pub context: OracleContext,
    /// Tradeable markets.
    pub markets: Vec<Market>,
    /// Active positions.
    pub positions: Vec<Position>,
}

/// Raw oracle answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleProposal {
    /// Response body as received.
    pub body: Value,
}

impl OracleProposal {
    /// Wrap a response body.
    #[must_use]
    pub const fn new(body: Value) -> Self {
        Self { body }
    }

    /// Parse the body into tagged decisions.
    pub fn parse(&self) -> Result<ParsedDecisions, DecisionParseError> {
        parse_decisions(&self.body)
    }
}

/// Oracle error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Could not reach the oracle.
    #[error("Oracle transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// No answer in time.
    #[error("Oracle timed out after {elapsed:?}")]
    Timeout {
        /// Time waited.
        elapsed: Duration,
    },

    /// Non-success HTTP status.
    #[error("Oracle returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Response was not usable JSON.
    #[error("Oracle response unusable: {0}")]
    Malformed(#[from] DecisionParseError),
}

/// Port for the decision source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Ask for proposals for one cycle.
    async fn propose(&self, request: &OracleRequest) -> Result<OracleProposal, OracleError>;
}
