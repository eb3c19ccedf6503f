//! Decision Validator
//!
//! Cross-references each oracle proposal with the market snapshot and the
//! active positions. Pure: the caller logs, counts and journals rejections.

use std::collections::HashSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Action, Decision};
use crate::domain::market::MarketSnapshot;
use crate::domain::position::{Position, PositionState};
use crate::domain::shared::{ExchangeMarketId, Symbol, Timestamp};

/// Why a proposal was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Symbol absent from the market snapshot.
    SymbolNotFound,
    /// Market listed but not accepting orders.
    MarketInactive,
    /// Confidence outside `[0, 1]` or not a number.
    ConfidenceOutOfRange,
    /// Confidence below the configured minimum.
    ConfidenceBelowThreshold,
    /// BUY/SELL while a position is already active on the symbol.
    PositionAlreadyOpen,
    /// CLOSE without an OPEN position on the symbol.
    NoOpenPosition,
    /// Second proposal for a symbol in the same cycle.
    DuplicateSymbol,
}

impl RejectionReason {
    /// Stable label used in logs, metrics and the journal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SymbolNotFound => "symbol_not_found",
            Self::MarketInactive => "market_inactive",
            Self::ConfidenceOutOfRange => "confidence_out_of_range",
            Self::ConfidenceBelowThreshold => "confidence_below_threshold",
            Self::PositionAlreadyOpen => "position_already_open",
            Self::NoOpenPosition => "no_open_position",
            Self::DuplicateSymbol => "duplicate_symbol",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused proposal.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}: {} {} ({detail})", .decision.action, .decision.symbol)]
pub struct ValidationRejection {
    /// The proposal as the oracle sent it.
    pub decision: Decision,
    /// Machine-readable reason.
    pub reason: RejectionReason,
    /// Human-readable context.
    pub detail: String,
}

/// A proposal that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAction {
    /// The original proposal.
    pub decision: Decision,
    /// Market the proposal resolved to.
    pub exchange_market_id: ExchangeMarketId,
    /// Minimum order size of that market.
    pub min_order_size: Decimal,
    /// When validation ran.
    pub validated_at: Timestamp,
}

impl ValidatedAction {
    /// Symbol shortcut.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.decision.symbol
    }

    /// Action shortcut.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.decision.action
    }
}

/// Outcome of validating one proposal list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Proposals allowed through, in oracle order.
    pub accepted: Vec<ValidatedAction>,
    /// Proposals refused, in oracle order.
    pub rejected: Vec<ValidationRejection>,
}

/// Validates oracle proposals.
#[derive(Debug, Clone, Copy)]
pub struct DecisionValidator {
    min_confidence: f64,
}

impl DecisionValidator {
    /// Create a validator with a minimum confidence threshold.
    #[must_use]
    pub const fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Configured threshold.
    #[must_use]
    pub const fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Validate proposals against one market snapshot and the active
    /// positions of the same exchange.
    #[must_use]
    pub fn validate(
        &self,
        proposed: &[Decision],
        markets: &MarketSnapshot,
        positions: &[Position],
        now: Timestamp,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut seen: HashSet<&Symbol> = HashSet::new();

        for decision in proposed {
            match self.check(decision, markets, positions, &seen) {
                Ok(market_id_and_min) => {
                    seen.insert(&decision.symbol);
                    let (exchange_market_id, min_order_size) = market_id_and_min;
                    report.accepted.push(ValidatedAction {
                        decision: decision.clone(),
                        exchange_market_id,
                        min_order_size,
                        validated_at: now,
                    });
                }
                Err((reason, detail)) => report.rejected.push(ValidationRejection {
                    decision: decision.clone(),
                    reason,
                    detail,
                }),
            }
        }

        report
    }

    fn check(
        &self,
        decision: &Decision,
        markets: &MarketSnapshot,
        positions: &[Position],
        seen: &HashSet<&Symbol>,
    ) -> Result<(ExchangeMarketId, Decimal), (RejectionReason, String)> {
        let symbol = &decision.symbol;

        let Some(market) = markets.get(symbol) else {
            return Err((
                RejectionReason::SymbolNotFound,
                format!(
                    "{symbol} not among {} markets discovered at {}",
                    markets.len(),
                    markets.fetched_at()
                ),
            ));
        };
        if !market.is_active() {
            return Err((
                RejectionReason::MarketInactive,
                format!("{symbol} is {}", market.status),
            ));
        }

        let confidence = decision.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err((
                RejectionReason::ConfidenceOutOfRange,
                format!("confidence {confidence} outside [0, 1]"),
            ));
        }
        if decision.action != Action::Hold && confidence < self.min_confidence {
            return Err((
                RejectionReason::ConfidenceBelowThreshold,
                format!("confidence {confidence} < {}", self.min_confidence),
            ));
        }

        if seen.contains(symbol) {
            return Err((
                RejectionReason::DuplicateSymbol,
                "an earlier proposal for this symbol was accepted this cycle".to_string(),
            ));
        }

        let active = positions
            .iter()
            .find(|p| p.is_active() && p.symbol() == symbol);
        match decision.action {
            Action::Buy | Action::Sell => {
                if let Some(existing) = active {
                    return Err((
                        RejectionReason::PositionAlreadyOpen,
                        format!("{} position is {}", existing.side(), existing.state()),
                    ));
                }
            }
            Action::Close => match active {
                Some(p) if p.state() == PositionState::Open => {}
                Some(p) => {
                    return Err((
                        RejectionReason::NoOpenPosition,
                        format!("position is {}", p.state()),
                    ));
                }
                None => {
                    return Err((
                        RejectionReason::NoOpenPosition,
                        "no position on this symbol".to_string(),
                    ));
                }
            },
            Action::Hold => {}
        }

        Ok((market.exchange_market_id.clone(), market.min_order_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Market, MarketStatus};
    use crate::domain::position::PositionSide;
    use crate::domain::shared::{ClientOrderId, ExchangeId};
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn snapshot() -> MarketSnapshot {
        let market = |symbol: &str, id: &str, status| Market {
            symbol: Symbol::new(symbol),
            exchange_market_id: ExchangeMarketId::new(id),
            status,
            min_order_size: dec!(0.01),
            last_refreshed_at: Timestamp::now(),
        };
        MarketSnapshot::new(
            ExchangeId::new("paper"),
            Timestamp::now(),
            vec![
                market("BTC", "0", MarketStatus::Active),
                market("SOL", "5", MarketStatus::Active),
                market("LUNA", "9", MarketStatus::Inactive),
            ],
        )
    }

    fn open_position(symbol: &str) -> Position {
        let mut p = Position::pending_open(
            ExchangeId::new("paper"),
            Symbol::new(symbol),
            ExchangeMarketId::new("5"),
            PositionSide::Long,
            dec!(100),
            dec!(1),
            0.9,
            ClientOrderId::generate(),
            Timestamp::now(),
        );
        p.confirm_open(dec!(100), dec!(1), Timestamp::now()).unwrap();
        p
    }

    fn reject_reason(decision: Decision, positions: &[Position]) -> Option<RejectionReason> {
        let report =
            DecisionValidator::new(0.6).validate(&[decision], &snapshot(), positions, Timestamp::now());
        report.rejected.first().map(|r| r.reason)
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        assert_eq!(
            reject_reason(Decision::new("ETH", Action::Buy, 0.9), &[]),
            Some(RejectionReason::SymbolNotFound)
        );
    }

    #[test]
    fn inactive_market_is_rejected() {
        assert_eq!(
            reject_reason(Decision::new("LUNA", Action::Buy, 0.9), &[]),
            Some(RejectionReason::MarketInactive)
        );
    }

    #[test_case(1.2 ; "above one")]
    #[test_case(-0.1 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    fn confidence_out_of_range(confidence: f64) {
        assert_eq!(
            reject_reason(Decision::new("SOL", Action::Buy, confidence), &[]),
            Some(RejectionReason::ConfidenceOutOfRange)
        );
    }

    #[test]
    fn low_confidence_open_is_rejected_but_hold_is_not() {
        assert_eq!(
            reject_reason(Decision::new("SOL", Action::Buy, 0.3), &[]),
            Some(RejectionReason::ConfidenceBelowThreshold)
        );
        assert_eq!(reject_reason(Decision::new("SOL", Action::Hold, 0.3), &[]), None);
    }

    #[test]
    fn second_open_on_symbol_is_rejected() {
        assert_eq!(
            reject_reason(Decision::new("SOL", Action::Sell, 0.9), &[open_position("SOL")]),
            Some(RejectionReason::PositionAlreadyOpen)
        );
    }

    #[test]
    fn close_without_position_is_rejected() {
        assert_eq!(
            reject_reason(Decision::new("BTC", Action::Close, 0.9), &[open_position("SOL")]),
            Some(RejectionReason::NoOpenPosition)
        );
    }

    #[test]
    fn close_with_open_position_passes() {
        let report = DecisionValidator::new(0.6).validate(
            &[Decision::new("SOL", Action::Close, 0.9)],
            &snapshot(),
            &[open_position("SOL")],
            Timestamp::now(),
        );
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].exchange_market_id, ExchangeMarketId::new("5"));
    }

    #[test]
    fn duplicate_symbol_in_one_proposal() {
        let report = DecisionValidator::new(0.6).validate(
            &[
                Decision::new("SOL", Action::Buy, 0.9),
                Decision::new("SOL", Action::Sell, 0.8),
            ],
            &snapshot(),
            &[],
            Timestamp::now(),
        );
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.rejected[0].reason, RejectionReason::DuplicateSymbol);
    }

    #[test]
    fn rejection_display_names_reason_and_symbol() {
        let report = DecisionValidator::new(0.6).validate(
            &[Decision::new("ETH", Action::Buy, 0.9)],
            &snapshot(),
            &[],
            Timestamp::now(),
        );
        let text = report.rejected[0].to_string();
        assert!(text.starts_with("symbol_not_found: BUY ETH"));
    }
}
