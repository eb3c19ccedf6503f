//! Hard Exit Rule Engine

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ExitRulesConfig, TrendSignal};
use crate::domain::position::{Position, PositionState};
use crate::domain::shared::{PositionId, Symbol, Timestamp};

/// Rule that forced a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitRule {
    /// Unrealized P&L reached the take-profit threshold.
    TakeProfit,
    /// Unrealized P&L fell to the stop-loss threshold.
    StopLoss,
    /// Held past the maximum hold duration.
    MaxHold,
    /// Trend turned against the position.
    TrendReversal,
}

impl ExitRule {
    /// Stable label used in logs, metrics and the journal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TakeProfit => "take_profit",
            Self::StopLoss => "stop_loss",
            Self::MaxHold => "max_hold",
            Self::TrendReversal => "trend_reversal",
        }
    }
}

impl fmt::Display for ExitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine verdict for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Close now, whatever the oracle said.
    Force {
        /// Rule that fired.
        rule: ExitRule,
        /// Unrealized P&L % at evaluation.
        pnl_pct: Decimal,
    },
    /// Inside minimum hold: drop any oracle close this cycle.
    SuppressClose {
        /// Unrealized P&L % at evaluation.
        pnl_pct: Decimal,
    },
    /// No rule fired; the oracle decision stands.
    NoAction,
}

impl ExitDecision {
    /// The forcing rule, if any.
    #[must_use]
    pub const fn forced_rule(&self) -> Option<ExitRule> {
        match self {
            Self::Force { rule, .. } => Some(*rule),
            _ => None,
        }
    }
}

/// A logged divergence from oracle intent. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEngineOverride {
    /// Position affected.
    pub position_id: PositionId,
    /// Symbol affected.
    pub symbol: Symbol,
    /// What the oracle asked for (`None` if it said nothing for the symbol).
    pub oracle_action: Option<String>,
    /// What the engine decided (`CLOSE` or `HOLD`).
    pub enforced_action: String,
    /// Rule responsible (`min_hold` for suppressions).
    pub rule: String,
}

impl fmt::Display for RuleEngineOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: oracle {} overridden by {} ({})",
            self.symbol,
            self.position_id,
            self.oracle_action.as_deref().unwrap_or("NONE"),
            self.enforced_action,
            self.rule
        )
    }
}

/// Evaluates the hard exit rules. Deterministic and side-effect free.
#[derive(Debug, Clone)]
pub struct HardExitRuleEngine {
    config: ExitRulesConfig,
}

impl HardExitRuleEngine {
    /// Create an engine with the given thresholds.
    #[must_use]
    pub const fn new(config: ExitRulesConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn config(&self) -> &ExitRulesConfig {
        &self.config
    }

    /// Evaluate one position at `current_price`.
    ///
    /// Only `OPEN` positions with a known entry are evaluated; anything else
    /// yields `NoAction`.
    #[must_use]
    pub fn evaluate(
        &self,
        position: &Position,
        current_price: Decimal,
        now: Timestamp,
        trend: TrendSignal,
    ) -> ExitDecision {
        if position.state() != PositionState::Open {
            return ExitDecision::NoAction;
        }
        let (Some(pnl_pct), Some(held)) = (
            position.unrealized_pnl_pct(current_price),
            position.held_for(now),
        ) else {
            return ExitDecision::NoAction;
        };

        if pnl_pct >= self.config.take_profit_pct {
            return ExitDecision::Force {
                rule: ExitRule::TakeProfit,
                pnl_pct,
            };
        }
        if pnl_pct <= self.config.stop_loss_pct {
            return ExitDecision::Force {
                rule: ExitRule::StopLoss,
                pnl_pct,
            };
        }
        if held > self.config.max_hold {
            return ExitDecision::Force {
                rule: ExitRule::MaxHold,
                pnl_pct,
            };
        }
        if held < self.config.min_hold {
            return ExitDecision::SuppressClose { pnl_pct };
        }
        if self.config.trend_reversal_enabled && trend.opposes(position.side()) {
            return ExitDecision::Force {
                rule: ExitRule::TrendReversal,
                pnl_pct,
            };
        }
        ExitDecision::NoAction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::PositionSide;
    use crate::domain::shared::{ClientOrderId, ExchangeId, ExchangeMarketId};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const T0: &str = "2026-03-01T12:00:00Z";

    fn at(secs: u64) -> Timestamp {
        Timestamp::parse(T0).unwrap().plus(Duration::from_secs(secs))
    }

    fn open(side: PositionSide, entry: Decimal) -> Position {
        let mut p = Position::pending_open(
            ExchangeId::new("paper"),
            Symbol::new("BTC"),
            ExchangeMarketId::new("0"),
            side,
            entry,
            dec!(1),
            0.8,
            ClientOrderId::generate(),
            at(0),
        );
        p.confirm_open(entry, dec!(1), at(0)).unwrap();
        p
    }

    fn engine() -> HardExitRuleEngine {
        HardExitRuleEngine::new(ExitRulesConfig {
            take_profit_pct: dec!(2),
            stop_loss_pct: dec!(-1),
            max_hold: Duration::from_secs(4 * 3600),
            min_hold: Duration::from_secs(30 * 60),
            trend_reversal_enabled: true,
        })
    }

    #[test]
    fn stop_loss_beats_min_hold() {
        let decision = engine().evaluate(
            &open(PositionSide::Long, dec!(100)),
            dec!(98.9),
            at(60),
            TrendSignal::Neutral,
        );
        assert_eq!(
            decision,
            ExitDecision::Force {
                rule: ExitRule::StopLoss,
                pnl_pct: dec!(-1.1)
            }
        );
    }

    #[test]
    fn take_profit_beats_min_hold() {
        let decision = engine().evaluate(
            &open(PositionSide::Short, dec!(100)),
            dec!(97),
            at(10),
            TrendSignal::Neutral,
        );
        assert_eq!(decision.forced_rule(), Some(ExitRule::TakeProfit));
    }

    #[test]
    fn min_hold_suppresses_and_hides_trend_reversal() {
        let decision = engine().evaluate(
            &open(PositionSide::Long, dec!(100)),
            dec!(99.5),
            at(600),
            TrendSignal::Bearish,
        );
        assert!(matches!(decision, ExitDecision::SuppressClose { .. }));
    }

    #[test]
    fn max_hold_forces_regardless_of_pnl() {
        let decision = engine().evaluate(
            &open(PositionSide::Long, dec!(100)),
            dec!(100.5),
            at(5 * 3600),
            TrendSignal::Bullish,
        );
        assert_eq!(decision.forced_rule(), Some(ExitRule::MaxHold));
    }

    #[test]
    fn trend_reversal_after_min_hold() {
        let decision = engine().evaluate(
            &open(PositionSide::Short, dec!(100)),
            dec!(100.2),
            at(3600),
            TrendSignal::Bullish,
        );
        assert_eq!(decision.forced_rule(), Some(ExitRule::TrendReversal));
    }

    #[test]
    fn disabled_trend_rule_defers_to_oracle() {
        let mut config = engine().config().clone();
        config.trend_reversal_enabled = false;
        let decision = HardExitRuleEngine::new(config).evaluate(
            &open(PositionSide::Short, dec!(100)),
            dec!(100.2),
            at(3600),
            TrendSignal::Bullish,
        );
        assert_eq!(decision, ExitDecision::NoAction);
    }

    #[test]
    fn pending_positions_are_not_evaluated() {
        let pending = Position::pending_open(
            ExchangeId::new("paper"),
            Symbol::new("BTC"),
            ExchangeMarketId::new("0"),
            PositionSide::Long,
            dec!(100),
            dec!(1),
            0.8,
            ClientOrderId::generate(),
            at(0),
        );
        assert_eq!(
            engine().evaluate(&pending, dec!(50), at(60), TrendSignal::Bearish),
            ExitDecision::NoAction
        );
    }
}
