//! Versioned strategy configuration.
//!
//! Passed explicitly into every cycle. Swapping it changes how the next
//! cycle decides, never the positions already held.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::exit_rules::{ExitRulesConfig, TrendConfig};
use crate::domain::shared::DomainError;

/// Position sizing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Share of free balance committed as margin per entry, in percent.
    pub balance_pct: Decimal,
    /// Leverage applied to the margin.
    pub leverage: Decimal,
    /// Upper bound on simultaneously active positions.
    pub max_open_positions: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            balance_pct: dec!(10),
            leverage: dec!(1),
            max_open_positions: 3,
        }
    }
}

impl SizingConfig {
    /// Unrounded order size for `balance` at `price`.
    #[must_use]
    pub fn raw_size(&self, balance: Decimal, price: Decimal) -> Option<Decimal> {
        if price <= Decimal::ZERO || balance <= Decimal::ZERO {
            return None;
        }
        Some(balance * self.balance_pct / Decimal::ONE_HUNDRED * self.leverage / price)
    }
}

/// Everything that shapes a bot's decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Monotonic version, reported with every cycle.
    pub version: u64,
    /// Human-readable name.
    pub name: String,
    /// Minimum oracle confidence for BUY/SELL/CLOSE.
    pub min_confidence: f64,
    /// Position sizing.
    pub sizing: SizingConfig,
    /// Hard exit thresholds.
    pub exit_rules: ExitRulesConfig,
    /// Trend detector periods.
    pub trend: TrendConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            version: 1,
            name: "default".to_string(),
            min_confidence: 0.6,
            sizing: SizingConfig::default(),
            exit_rules: ExitRulesConfig::default(),
            trend: TrendConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Check every parameter.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(DomainError::InvalidValue {
                field: "strategy.min_confidence".to_string(),
                message: format!("{} outside [0, 1]", self.min_confidence),
            });
        }
        if self.sizing.balance_pct <= Decimal::ZERO || self.sizing.balance_pct > Decimal::ONE_HUNDRED
        {
            return Err(DomainError::InvalidValue {
                field: "strategy.sizing.balance_pct".to_string(),
                message: "must be in (0, 100]".to_string(),
            });
        }
        if self.sizing.leverage < Decimal::ONE {
            return Err(DomainError::InvalidValue {
                field: "strategy.sizing.leverage".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.sizing.max_open_positions == 0 {
            return Err(DomainError::InvalidValue {
                field: "strategy.sizing.max_open_positions".to_string(),
                message: "must be positive".to_string(),
            });
        }
        self.exit_rules.validate()?;
        self.trend.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn raw_size_applies_pct_and_leverage() {
        let sizing = SizingConfig {
            balance_pct: dec!(10),
            leverage: dec!(3),
            max_open_positions: 1,
        };
        assert_eq!(sizing.raw_size(dec!(1000), dec!(150)), Some(dec!(2)));
        assert_eq!(sizing.raw_size(dec!(1000), Decimal::ZERO), None);
    }

    #[test]
    fn confidence_threshold_must_be_a_probability() {
        let config = StrategyConfig {
            min_confidence: 1.5,
            ..StrategyConfig::default()
        };
        let Err(DomainError::InvalidValue { field, .. }) = config.validate() else {
            panic!("expected invalid min_confidence");
        };
        assert_eq!(field, "strategy.min_confidence");
    }
}
