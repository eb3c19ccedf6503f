//! Market entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{ExchangeMarketId, Symbol, Timestamp};

/// Trading status of a market as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    /// Accepting orders.
    Active,
    /// Halted, delisted or reduce-only.
    Inactive,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// A perpetual market on one exchange.
///
/// Identity is `(exchange, exchange_market_id)`. `symbol` is a display label
/// re-derived on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Display label.
    pub symbol: Symbol,
    /// Exchange-assigned identifier.
    pub exchange_market_id: ExchangeMarketId,
    /// Trading status.
    pub status: MarketStatus,
    /// Smallest order size the exchange accepts; also the size step.
    pub min_order_size: Decimal,
    /// When this record was fetched from the exchange.
    pub last_refreshed_at: Timestamp,
}

impl Market {
    /// Whether the market currently accepts orders.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MarketStatus::Active
    }

    /// Round `raw` down to a multiple of the minimum order size.
    ///
    /// Returns `None` when the result is below the minimum.
    #[must_use]
    pub fn round_order_size(&self, raw: Decimal) -> Option<Decimal> {
        if raw <= Decimal::ZERO {
            return None;
        }
        let step = self.min_order_size;
        let rounded = if step > Decimal::ZERO {
            (raw / step).floor() * step
        } else {
            raw
        };
        (rounded > Decimal::ZERO && rounded >= step).then(|| rounded.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(min: Decimal) -> Market {
        Market {
            symbol: Symbol::new("SOL"),
            exchange_market_id: ExchangeMarketId::new("5"),
            status: MarketStatus::Active,
            min_order_size: min,
            last_refreshed_at: Timestamp::now(),
        }
    }

    #[test]
    fn round_order_size_floors_to_step() {
        assert_eq!(market(dec!(0.1)).round_order_size(dec!(1.37)), Some(dec!(1.3)));
    }

    #[test]
    fn round_order_size_rejects_below_minimum() {
        assert_eq!(market(dec!(0.1)).round_order_size(dec!(0.09)), None);
    }

    #[test]
    fn round_order_size_without_step_keeps_raw_size() {
        assert_eq!(market(Decimal::ZERO).round_order_size(dec!(0.0042)), Some(dec!(0.0042)));
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&MarketStatus::Inactive).unwrap(),
            "\"INACTIVE\""
        );
    }
}
