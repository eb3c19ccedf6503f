//! Strategy configuration.
//!
//! Reloadable at runtime: the binary re-reads this section on SIGHUP and the
//! next cycle uses it.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::application::use_cases::{SizingConfig, StrategyConfig};
use crate::domain::exit_rules::{ExitRulesConfig, TrendConfig};

/// Strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySettings {
    /// Monotonic version; bump on every change.
    #[serde(default = "default_version")]
    pub version: u64,
    /// Display name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Minimum oracle confidence.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Position sizing.
    #[serde(default)]
    pub sizing: SizingSettings,
    /// Hard exit rules.
    #[serde(default)]
    pub exit_rules: ExitRulesSettings,
    /// Trend detector periods.
    #[serde(default)]
    pub trend: TrendSettings,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            min_confidence: default_min_confidence(),
            sizing: SizingSettings::default(),
            exit_rules: ExitRulesSettings::default(),
            trend: TrendSettings::default(),
        }
    }
}

impl StrategySettings {
    /// Convert to the versioned config passed into every cycle.
    #[must_use]
    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            version: self.version,
            name: self.name.clone(),
            min_confidence: self.min_confidence,
            sizing: SizingConfig {
                balance_pct: self.sizing.balance_pct,
                leverage: self.sizing.leverage,
                max_open_positions: self.sizing.max_open_positions,
            },
            exit_rules: ExitRulesConfig {
                take_profit_pct: self.exit_rules.take_profit_pct,
                stop_loss_pct: self.exit_rules.stop_loss_pct,
                max_hold: Duration::from_secs(self.exit_rules.max_hold_secs),
                min_hold: Duration::from_secs(self.exit_rules.min_hold_secs),
                trend_reversal_enabled: self.exit_rules.trend_reversal_enabled,
            },
            trend: TrendConfig {
                fast_period: self.trend.fast_period,
                slow_period: self.trend.slow_period,
                momentum_period: self.trend.momentum_period,
            },
        }
    }
}

/// Sizing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingSettings {
    /// Percent of free balance used as margin per entry.
    #[serde(default = "default_balance_pct")]
    pub balance_pct: Decimal,
    /// Leverage on that margin.
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    /// Cap on simultaneously active positions.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
}

impl Default for SizingSettings {
    fn default() -> Self {
        Self {
            balance_pct: default_balance_pct(),
            leverage: default_leverage(),
            max_open_positions: default_max_open_positions(),
        }
    }
}

/// Exit rule settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRulesSettings {
    /// Take-profit threshold, percent of entry (positive).
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Stop-loss threshold, percent of entry (negative).
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Maximum hold (seconds).
    #[serde(default = "default_max_hold_secs")]
    pub max_hold_secs: u64,
    /// Minimum hold before oracle closes are honoured (seconds).
    #[serde(default = "default_min_hold_secs")]
    pub min_hold_secs: u64,
    /// Evaluate the trend-reversal rule.
    #[serde(default = "default_true")]
    pub trend_reversal_enabled: bool,
}

impl Default for ExitRulesSettings {
    fn default() -> Self {
        Self {
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            max_hold_secs: default_max_hold_secs(),
            min_hold_secs: default_min_hold_secs(),
            trend_reversal_enabled: true,
        }
    }
}

/// Trend detector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSettings {
    /// Fast SMA period.
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    /// Slow SMA period.
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
    /// Momentum lookback.
    #[serde(default = "default_momentum_period")]
    pub momentum_period: usize,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            momentum_period: default_momentum_period(),
        }
    }
}

const fn default_version() -> u64 {
    1
}

fn default_name() -> String {
    "default".to_string()
}

const fn default_min_confidence() -> f64 {
    0.6
}

fn default_balance_pct() -> Decimal {
    dec!(10)
}

fn default_leverage() -> Decimal {
    dec!(1)
}

const fn default_max_open_positions() -> usize {
    3
}

fn default_take_profit_pct() -> Decimal {
    dec!(3)
}

fn default_stop_loss_pct() -> Decimal {
    dec!(-1.5)
}

const fn default_max_hold_secs() -> u64 {
    24 * 3600
}

const fn default_min_hold_secs() -> u64 {
    30 * 60
}

const fn default_true() -> bool {
    true
}

const fn default_fast_period() -> usize {
    9
}

const fn default_slow_period() -> usize {
    21
}

const fn default_momentum_period() -> usize {
    5
}
