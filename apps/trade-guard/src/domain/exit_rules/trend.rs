//! Trend signal from recent closes.
//!
//! A fast/slow simple-moving-average cross confirmed by momentum (rate of
//! change over a lookback). Both must agree for a directional signal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::position::PositionSide;
use crate::domain::shared::DomainError;

/// Direction of the independently computed trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendSignal {
    /// Fast average above slow, positive momentum.
    Bullish,
    /// Fast average below slow, negative momentum.
    Bearish,
    /// No agreement, or not enough data.
    Neutral,
}

impl TrendSignal {
    /// Whether the trend runs against a position on `side`.
    #[must_use]
    pub const fn opposes(self, side: PositionSide) -> bool {
        matches!(
            (self, side),
            (Self::Bearish, PositionSide::Long) | (Self::Bullish, PositionSide::Short)
        )
    }
}

impl fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Lookback periods, in closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Fast SMA period.
    pub fast_period: usize,
    /// Slow SMA period.
    pub slow_period: usize,
    /// Momentum lookback.
    pub momentum_period: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            fast_period: 9,
            slow_period: 21,
            momentum_period: 5,
        }
    }
}

impl TrendConfig {
    /// Closes required for a directional signal.
    #[must_use]
    pub fn required_closes(&self) -> usize {
        self.slow_period.max(self.momentum_period + 1)
    }

    /// Check the periods are usable.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.fast_period == 0 || self.momentum_period == 0 {
            return Err(DomainError::InvalidValue {
                field: "trend".to_string(),
                message: "periods must be positive".to_string(),
            });
        }
        if self.fast_period >= self.slow_period {
            return Err(DomainError::InvalidValue {
                field: "trend.fast_period".to_string(),
                message: "must be shorter than slow_period".to_string(),
            });
        }
        Ok(())
    }
}

/// Computes [`TrendSignal`] from closes ordered oldest first.
#[derive(Debug, Clone, Copy)]
pub struct TrendDetector {
    config: TrendConfig,
}

impl TrendDetector {
    /// Create a detector.
    #[must_use]
    pub const fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Number of closes to request from the exchange.
    #[must_use]
    pub fn required_closes(&self) -> usize {
        self.config.required_closes()
    }

    /// Classify the trend.
    #[must_use]
    pub fn detect(&self, closes: &[Decimal]) -> TrendSignal {
        if closes.len() < self.config.required_closes() {
            return TrendSignal::Neutral;
        }
        let (Some(fast), Some(slow)) = (
            sma(closes, self.config.fast_period),
            sma(closes, self.config.slow_period),
        ) else {
            return TrendSignal::Neutral;
        };
        let Some(momentum) = momentum(closes, self.config.momentum_period) else {
            return TrendSignal::Neutral;
        };

        if fast > slow && momentum > Decimal::ZERO {
            TrendSignal::Bullish
        } else if fast < slow && momentum < Decimal::ZERO {
            TrendSignal::Bearish
        } else {
            TrendSignal::Neutral
        }
    }
}

fn sma(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let sum: Decimal = window.iter().copied().sum();
    Some(sum / Decimal::from(period))
}

fn momentum(closes: &[Decimal], lookback: usize) -> Option<Decimal> {
    let last = *closes.last()?;
    let base = *closes.get(closes.len().checked_sub(lookback + 1)?)?;
    if base <= Decimal::ZERO {
        return None;
    }
    Some((last - base) / base)
}
