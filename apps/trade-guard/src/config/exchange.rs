//! Exchange account configuration.
//!
//! Only the simulated paper account is built in; its markets, balance and
//! price behaviour are configured here.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::infrastructure::exchange::{PaperExchangeConfig, PaperMarketConfig};

/// Adapter kinds this binary can wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    /// In-process simulated account.
    #[default]
    Paper,
}

/// Exchange account settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// Adapter kind.
    #[serde(default)]
    pub kind: ExchangeKind,
    /// Account name; keys persisted state.
    #[serde(default = "default_name")]
    pub name: String,
    /// Starting free collateral.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
    /// Maximum account leverage.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,
    /// Taker slippage in basis points.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: Decimal,
    /// Maximum price move per tick, in percent.
    #[serde(default = "default_volatility_pct")]
    pub volatility_pct: Decimal,
    /// Milliseconds between simulated price ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Closes kept per market.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// Listed markets.
    #[serde(default = "default_markets")]
    pub markets: Vec<PaperMarketSettings>,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            kind: ExchangeKind::default(),
            name: default_name(),
            starting_balance: default_starting_balance(),
            max_leverage: default_max_leverage(),
            slippage_bps: default_slippage_bps(),
            volatility_pct: default_volatility_pct(),
            tick_interval_ms: default_tick_interval_ms(),
            history_len: default_history_len(),
            markets: default_markets(),
        }
    }
}

impl ExchangeSettings {
    /// Convert to the paper exchange config.
    #[must_use]
    pub fn to_paper_config(&self) -> PaperExchangeConfig {
        PaperExchangeConfig {
            name: self.name.clone(),
            starting_balance: self.starting_balance,
            max_leverage: self.max_leverage,
            slippage_bps: self.slippage_bps,
            volatility_pct: self.volatility_pct,
            history_len: self.history_len,
            markets: self
                .markets
                .iter()
                .map(|m| PaperMarketConfig {
                    symbol: m.symbol.clone(),
                    initial_price: m.initial_price,
                    min_order_size: m.min_order_size,
                    active: m.active,
                })
                .collect(),
        }
    }
}

/// One simulated market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMarketSettings {
    /// Display symbol.
    pub symbol: String,
    /// Starting mark price.
    pub initial_price: Decimal,
    /// Minimum order size and size step.
    pub min_order_size: Decimal,
    /// Whether the market accepts orders.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_name() -> String {
    "paper".to_string()
}

fn default_starting_balance() -> Decimal {
    dec!(10000)
}

fn default_max_leverage() -> Decimal {
    dec!(10)
}

fn default_slippage_bps() -> Decimal {
    dec!(5)
}

fn default_volatility_pct() -> Decimal {
    dec!(0.5)
}

const fn default_tick_interval_ms() -> u64 {
    5_000
}

const fn default_history_len() -> usize {
    100
}

const fn default_true() -> bool {
    true
}

fn default_markets() -> Vec<PaperMarketSettings> {
    PaperExchangeConfig::default()
        .markets
        .into_iter()
        .map(|m| PaperMarketSettings {
            symbol: m.symbol,
            initial_price: m.initial_price,
            min_order_size: m.min_order_size,
            active: m.active,
        })
        .collect()
}
