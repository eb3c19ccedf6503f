//! Append-only trade journal entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{ExchangeId, PositionId, Symbol, Timestamp, TradeRecordId};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    /// Entry order about to be sent.
    OpenRequested,
    /// Entry filled.
    Opened,
    /// Entry failed or timed out; the position never existed.
    OpenAbandoned,
    /// Exit order about to be sent.
    CloseRequested,
    /// Exit filled or position gone from the exchange.
    Closed,
    /// Exit filled in part; the remainder stays OPEN.
    PartiallyClosed,
    /// Exit failed or timed out; back to OPEN.
    CloseReverted,
    /// Oracle proposal refused.
    Rejected,
    /// Entry price or size corrected from exchange truth.
    Adjusted,
    /// Exchange position adopted into the book.
    Adopted,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpenRequested => "OPEN_REQUESTED",
            Self::Opened => "OPENED",
            Self::OpenAbandoned => "OPEN_ABANDONED",
            Self::CloseRequested => "CLOSE_REQUESTED",
            Self::Closed => "CLOSED",
            Self::PartiallyClosed => "PARTIALLY_CLOSED",
            Self::CloseReverted => "CLOSE_REVERTED",
            Self::Rejected => "REJECTED",
            Self::Adjusted => "ADJUSTED",
            Self::Adopted => "ADOPTED",
        };
        f.write_str(s)
    }
}

/// Who caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSource {
    /// A validated oracle decision.
    Oracle,
    /// A hard exit rule overriding the oracle.
    HardRule,
    /// An oracle decision refused by the validator.
    ValidatorReject,
    /// Exchange ground truth during reconciliation.
    Reconciliation,
    /// Pending-state expiry.
    Timeout,
}

impl fmt::Display for TradeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Oracle => "ORACLE",
            Self::HardRule => "HARD_RULE",
            Self::ValidatorReject => "VALIDATOR_REJECT",
            Self::Reconciliation => "RECONCILIATION",
            Self::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// One journal line. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Record id.
    pub id: TradeRecordId,
    /// Exchange account.
    pub exchange: ExchangeId,
    /// Symbol.
    pub symbol: Symbol,
    /// Position the record belongs to, if one exists.
    pub position_id: Option<PositionId>,
    /// What happened.
    pub action_taken: TradeAction,
    /// Who caused it.
    pub source: TradeSource,
    /// When.
    pub timestamp: Timestamp,
    /// Realized P&L resulting from this step, if any.
    pub resulting_pnl: Option<Decimal>,
    /// Free-form cause (rejection reason, rule name, error).
    pub detail: Option<String>,
}

impl TradeRecord {
    /// Create a record without position, P&L or detail.
    #[must_use]
    pub fn new(
        exchange: ExchangeId,
        symbol: Symbol,
        action_taken: TradeAction,
        source: TradeSource,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: TradeRecordId::generate(),
            exchange,
            symbol,
            position_id: None,
            action_taken,
            source,
            timestamp,
            resulting_pnl: None,
            detail: None,
        }
    }

    /// Attach the position id.
    #[must_use]
    pub fn with_position(mut self, id: &PositionId) -> Self {
        self.position_id = Some(id.clone());
        self
    }

    /// Attach realized P&L.
    #[must_use]
    pub const fn with_pnl(mut self, pnl: Option<Decimal>) -> Self {
        self.resulting_pnl = pnl;
        self
    }

    /// Attach a cause.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_source_and_action_screaming_case() {
        let record = TradeRecord::new(
            ExchangeId::new("paper"),
            Symbol::new("ETH"),
            TradeAction::Rejected,
            TradeSource::ValidatorReject,
            Timestamp::parse("2026-03-01T12:00:00Z").unwrap(),
        )
        .with_detail("symbol_not_found");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "VALIDATOR_REJECT");
        assert_eq!(json["action_taken"], "REJECTED");
        assert_eq!(json["detail"], "symbol_not_found");
        assert!(json["position_id"].is_null());
    }
}
