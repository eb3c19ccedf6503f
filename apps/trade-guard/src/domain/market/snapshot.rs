//! Immutable market set produced by one discovery call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Market;
use crate::domain::shared::{ExchangeId, ExchangeMarketId, Symbol, Timestamp};

/// The complete market set of one exchange at one point in time.
///
/// Snapshots are replaced wholesale, never merged, so a symbol and its
/// exchange id always come from the same discovery response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    exchange: ExchangeId,
    fetched_at: Timestamp,
    markets: BTreeMap<Symbol, Market>,
}

impl MarketSnapshot {
    /// Build a snapshot from a discovery response.
    ///
    /// When the exchange reports the same symbol twice, the active listing
    /// wins; between equals the first one wins.
    #[must_use]
    pub fn new(exchange: ExchangeId, fetched_at: Timestamp, markets: Vec<Market>) -> Self {
        let mut by_symbol: BTreeMap<Symbol, Market> = BTreeMap::new();
        for market in markets {
            match by_symbol.get(&market.symbol) {
                Some(existing) if existing.is_active() || !market.is_active() => {
                    tracing::warn!(
                        exchange = %exchange,
                        symbol = %market.symbol,
                        kept = %existing.exchange_market_id,
                        dropped = %market.exchange_market_id,
                        "Duplicate symbol in market discovery"
                    );
                }
                _ => {
                    by_symbol.insert(market.symbol.clone(), market);
                }
            }
        }
        Self {
            exchange,
            fetched_at,
            markets: by_symbol,
        }
    }

    /// Exchange the snapshot belongs to.
    #[must_use]
    pub const fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    /// When discovery completed.
    #[must_use]
    pub const fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Look up a market by display symbol.
    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<&Market> {
        self.markets.get(symbol)
    }

    /// Look up a market by exchange identifier.
    #[must_use]
    pub fn by_exchange_id(&self, id: &ExchangeMarketId) -> Option<&Market> {
        self.markets.values().find(|m| &m.exchange_market_id == id)
    }

    /// Whether the symbol is listed (in any status).
    #[must_use]
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.markets.contains_key(symbol)
    }

    /// Iterate markets in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    /// Number of listed markets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether discovery returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketStatus;
    use rust_decimal_macros::dec;

    fn market(symbol: &str, id: &str, status: MarketStatus) -> Market {
        Market {
            symbol: Symbol::new(symbol),
            exchange_market_id: ExchangeMarketId::new(id),
            status,
            min_order_size: dec!(0.01),
            last_refreshed_at: Timestamp::now(),
        }
    }

    #[test]
    fn lookup_by_symbol_and_id() {
        let snapshot = MarketSnapshot::new(
            ExchangeId::new("paper"),
            Timestamp::now(),
            vec![
                market("BTC", "0", MarketStatus::Active),
                market("SOL", "5", MarketStatus::Active),
            ],
        );
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get(&Symbol::new("sol")).unwrap().exchange_market_id,
            ExchangeMarketId::new("5")
        );
        assert_eq!(
            snapshot
                .by_exchange_id(&ExchangeMarketId::new("0"))
                .unwrap()
                .symbol,
            Symbol::new("BTC")
        );
        assert!(!snapshot.contains(&Symbol::new("ETH")));
    }

    #[test]
    fn duplicate_symbol_prefers_active_listing() {
        let snapshot = MarketSnapshot::new(
            ExchangeId::new("paper"),
            Timestamp::now(),
            vec![
                market("MATIC", "11", MarketStatus::Inactive),
                market("MATIC", "42", MarketStatus::Active),
            ],
        );
        let m = snapshot.get(&Symbol::new("MATIC")).unwrap();
        assert_eq!(m.exchange_market_id, ExchangeMarketId::new("42"));
    }
}
