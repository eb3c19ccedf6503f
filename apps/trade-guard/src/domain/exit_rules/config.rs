//! Exit rule thresholds.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::shared::DomainError;

/// Thresholds for the hard exit rules. Percentages are of entry price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRulesConfig {
    /// Close when unrealized P&L % reaches this value (positive).
    pub take_profit_pct: Decimal,
    /// Close when unrealized P&L % falls to this value (negative).
    pub stop_loss_pct: Decimal,
    /// Close once held longer than this.
    pub max_hold: Duration,
    /// Suppress oracle closes while held shorter than this.
    pub min_hold: Duration,
    /// Whether the trend-reversal rule is evaluated.
    pub trend_reversal_enabled: bool,
}

impl Default for ExitRulesConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: dec!(3),
            stop_loss_pct: dec!(-1.5),
            max_hold: Duration::from_secs(24 * 3600),
            min_hold: Duration::from_secs(30 * 60),
            trend_reversal_enabled: true,
        }
    }
}

impl ExitRulesConfig {
    /// Check threshold signs and ordering.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(invalid("take_profit_pct", "must be positive"));
        }
        if self.stop_loss_pct >= Decimal::ZERO {
            return Err(invalid("stop_loss_pct", "must be negative"));
        }
        if self.max_hold <= self.min_hold {
            return Err(invalid("max_hold", "must exceed min_hold"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> DomainError {
    DomainError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
