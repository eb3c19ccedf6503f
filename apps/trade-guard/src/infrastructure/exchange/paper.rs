//! Paper exchange.
//!
//! In-process simulated perpetual-futures account used for dry runs and
//! tests. Market orders fill immediately at the mark price plus slippage,
//! margin is checked against free balance, and replayed client order ids
//! return the original outcome.
//!
//! Prices move only when [`PaperExchange::tick`] or
//! [`PaperExchange::set_price`] is called.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::application::ports::{AdapterError, MarketAdapter, OrderRequest, OrderResult};
use crate::domain::market::{Market, MarketStatus};
use crate::domain::position::{ExchangePosition, OrderSide, PositionSide};
use crate::domain::shared::{ClientOrderId, ExchangeId, ExchangeMarketId, OrderId, Symbol, Timestamp};

/// One simulated market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMarketConfig {
    /// Display symbol.
    pub symbol: String,
    /// Starting mark price.
    pub initial_price: Decimal,
    /// Minimum order size and size step.
    pub min_order_size: Decimal,
    /// Whether the market accepts orders.
    pub active: bool,
}

/// Paper exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperExchangeConfig {
    /// Exchange account name.
    pub name: String,
    /// Starting free collateral.
    pub starting_balance: Decimal,
    /// Maximum leverage the account allows.
    pub max_leverage: Decimal,
    /// Slippage applied against the taker, in basis points.
    pub slippage_bps: Decimal,
    /// Maximum move per tick, in percent.
    pub volatility_pct: Decimal,
    /// Closes kept per market.
    pub history_len: usize,
    /// Listed markets.
    pub markets: Vec<PaperMarketConfig>,
}

impl Default for PaperExchangeConfig {
    fn default() -> Self {
        Self {
            name: "paper".to_string(),
            starting_balance: dec!(10000),
            max_leverage: dec!(10),
            slippage_bps: dec!(5),
            volatility_pct: dec!(0.5),
            history_len: 100,
            markets: vec![
                PaperMarketConfig {
                    symbol: "BTC".to_string(),
                    initial_price: dec!(60000),
                    min_order_size: dec!(0.001),
                    active: true,
                },
                PaperMarketConfig {
                    symbol: "ETH".to_string(),
                    initial_price: dec!(3000),
                    min_order_size: dec!(0.01),
                    active: true,
                },
                PaperMarketConfig {
                    symbol: "SOL".to_string(),
                    initial_price: dec!(150),
                    min_order_size: dec!(0.1),
                    active: true,
                },
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    market_id: ExchangeMarketId,
    side: PositionSide,
    size: Decimal,
    entry_price: Decimal,
    margin: Decimal,
    realized_pnl: Decimal,
}

#[derive(Debug)]
struct PaperState {
    markets: Vec<Market>,
    prices: BTreeMap<Symbol, Decimal>,
    history: BTreeMap<Symbol, VecDeque<Decimal>>,
    positions: BTreeMap<Symbol, PaperPosition>,
    balance: Decimal,
    orders: HashMap<ClientOrderId, OrderResult>,
    next_order: u64,
    injected: VecDeque<AdapterError>,
}

/// Simulated exchange account.
#[derive(Debug)]
pub struct PaperExchange {
    exchange: ExchangeId,
    config: PaperExchangeConfig,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    /// Create an account with the configured markets and balance.
    #[must_use]
    pub fn new(config: PaperExchangeConfig) -> Self {
        let now = Timestamp::now();
        let mut markets = Vec::with_capacity(config.markets.len());
        let mut prices = BTreeMap::new();
        let mut history = BTreeMap::new();
        for (index, m) in config.markets.iter().enumerate() {
            let symbol = Symbol::new(&m.symbol);
            markets.push(Market {
                symbol: symbol.clone(),
                exchange_market_id: ExchangeMarketId::new(index.to_string()),
                status: if m.active {
                    MarketStatus::Active
                } else {
                    MarketStatus::Inactive
                },
                min_order_size: m.min_order_size,
                last_refreshed_at: now,
            });
            prices.insert(symbol.clone(), m.initial_price);
            history.insert(symbol, VecDeque::from([m.initial_price]));
        }
        Self {
            exchange: ExchangeId::new(&config.name),
            state: Mutex::new(PaperState {
                markets,
                prices,
                history,
                positions: BTreeMap::new(),
                balance: config.starting_balance,
                orders: HashMap::new(),
                next_order: 1,
                injected: VecDeque::new(),
            }),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Simulation controls
    // ------------------------------------------------------------------

    /// Random-walk every price by at most `volatility_pct`.
    pub fn tick(&self) {
        let volatility = self.config.volatility_pct.try_into().unwrap_or(0.0_f64);
        let mut rng = rand::rng();
        let mut state = self.lock();
        let symbols: Vec<Symbol> = state.prices.keys().cloned().collect();
        for symbol in symbols {
            let pct: f64 = if volatility > 0.0 {
                rng.random_range(-volatility..=volatility)
            } else {
                0.0
            };
            let factor = Decimal::ONE + Decimal::from_f64(pct / 100.0).unwrap_or_default();
            if let Some(price) = state.prices.get(&symbol).copied() {
                let next = (price * factor).round_dp(8).max(Decimal::new(1, 8));
                self.record_price(&mut state, &symbol, next);
            }
        }
    }

    /// Set a mark price (appends to the close history).
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) {
        let mut state = self.lock();
        self.record_price(&mut state, symbol, price);
    }

    /// Change a market's status.
    pub fn set_market_active(&self, symbol: &Symbol, active: bool) {
        let mut state = self.lock();
        if let Some(market) = state.markets.iter_mut().find(|m| &m.symbol == symbol) {
            market.status = if active {
                MarketStatus::Active
            } else {
                MarketStatus::Inactive
            };
        }
    }

    /// Remove a market from discovery entirely.
    pub fn delist(&self, symbol: &Symbol) {
        self.lock().markets.retain(|m| &m.symbol != symbol);
    }

    /// Make the next calls to `place_order` fail with these errors, in order.
    pub fn inject_failures(&self, errors: impl IntoIterator<Item = AdapterError>) {
        self.lock().injected.extend(errors);
    }

    /// Drop a position as if closed outside the bot (manual close,
    /// liquidation). Margin is returned without P&L.
    pub fn close_externally(&self, symbol: &Symbol) {
        let mut state = self.lock();
        if let Some(position) = state.positions.remove(symbol) {
            state.balance += position.margin;
        }
    }

    /// Orders processed so far, excluding replays.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    fn record_price(&self, state: &mut PaperState, symbol: &Symbol, price: Decimal) {
        state.prices.insert(symbol.clone(), price);
        let history = state.history.entry(symbol.clone()).or_default();
        history.push_back(price);
        while history.len() > self.config.history_len.max(1) {
            history.pop_front();
        }
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    fn fill_price(&self, mark: Decimal, side: OrderSide) -> Decimal {
        let slip = mark * self.config.slippage_bps / dec!(10000);
        match side {
            OrderSide::Buy => mark + slip,
            OrderSide::Sell => mark - slip,
        }
    }

    fn execute(&self, state: &mut PaperState, request: &OrderRequest) -> Result<OrderResult, AdapterError> {
        let Some(market) = state
            .markets
            .iter()
            .find(|m| m.exchange_market_id == request.exchange_market_id)
            .cloned()
        else {
            return Ok(OrderResult::Rejected {
                reason: format!("unknown market {}", request.exchange_market_id),
            });
        };
        if !market.is_active() {
            return Ok(OrderResult::Rejected {
                reason: format!("market {} is {}", market.symbol, market.status),
            });
        }
        if request.size <= Decimal::ZERO || request.size < market.min_order_size {
            return Err(AdapterError::InvalidOrder {
                reason: format!(
                    "size {} below minimum {}",
                    request.size, market.min_order_size
                ),
            });
        }
        let mark = state
            .prices
            .get(&market.symbol)
            .copied()
            .ok_or_else(|| AdapterError::Unknown {
                message: format!("no price for {}", market.symbol),
            })?;
        let price = self.fill_price(mark, request.side);

        if request.reduce_only {
            return Ok(Self::reduce(state, &market.symbol, request, price));
        }

        let side = match request.side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };
        if state
            .positions
            .get(&market.symbol)
            .is_some_and(|p| p.side != side)
        {
            return Ok(OrderResult::Rejected {
                reason: format!("opposite position open on {}", market.symbol),
            });
        }

        let margin = request.size * price / self.config.max_leverage;
        if margin > state.balance {
            return Err(AdapterError::InsufficientBalance {
                required: margin,
                available: state.balance,
            });
        }
        state.balance -= margin;

        let position = state
            .positions
            .entry(market.symbol.clone())
            .or_insert_with(|| PaperPosition {
                market_id: market.exchange_market_id.clone(),
                side,
                size: Decimal::ZERO,
                entry_price: price,
                margin: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
            });
        let total = position.size + request.size;
        position.entry_price = (position.entry_price * position.size + price * request.size) / total;
        position.size = total;
        position.margin += margin;

        Ok(Self::accepted(state, price, request.size))
    }

    fn reduce(
        state: &mut PaperState,
        symbol: &Symbol,
        request: &OrderRequest,
        price: Decimal,
    ) -> OrderResult {
        let Some(position) = state.positions.get_mut(symbol) else {
            return OrderResult::Rejected {
                reason: format!("reduce-only order without position on {symbol}"),
            };
        };
        if position.side.exit_order_side() != request.side {
            return OrderResult::Rejected {
                reason: "reduce-only order would increase position".to_string(),
            };
        }
        let size = request.size.min(position.size);
        let pnl = (price - position.entry_price) * size * position.side.sign();
        let released = position.margin * size / position.size;
        position.size -= size;
        position.margin -= released;
        position.realized_pnl += pnl;
        if position.size.is_zero() {
            state.positions.remove(symbol);
        }
        state.balance += released + pnl;
        Self::accepted(state, price, size)
    }

    fn accepted(state: &mut PaperState, price: Decimal, size: Decimal) -> OrderResult {
        let order_id = OrderId::new(format!("paper-{}", state.next_order));
        state.next_order += 1;
        OrderResult::Accepted {
            order_id,
            fill_price: price,
            fill_size: size,
        }
    }
}

#[async_trait]
impl MarketAdapter for PaperExchange {
    fn exchange(&self) -> ExchangeId {
        self.exchange.clone()
    }

    async fn discover_markets(&self) -> Result<Vec<Market>, AdapterError> {
        let now = Timestamp::now();
        Ok(self
            .lock()
            .markets
            .iter()
            .cloned()
            .map(|mut m| {
                m.last_refreshed_at = now;
                m
            })
            .collect())
    }

    async fn get_positions(&self) -> Result<Vec<ExchangePosition>, AdapterError> {
        Ok(self
            .lock()
            .positions
            .iter()
            .map(|(symbol, p)| ExchangePosition {
                symbol: symbol.clone(),
                exchange_market_id: p.market_id.clone(),
                side: p.side,
                size: p.size,
                entry_price: p.entry_price,
                realized_pnl: (!p.realized_pnl.is_zero()).then_some(p.realized_pnl),
            })
            .collect())
    }

    async fn get_account_balance(&self) -> Result<Decimal, AdapterError> {
        Ok(self.lock().balance)
    }

    async fn get_mark_price(&self, symbol: &Symbol) -> Result<Decimal, AdapterError> {
        self.lock()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| AdapterError::Unknown {
                message: format!("no price for {symbol}"),
            })
    }

    async fn get_recent_closes(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<Vec<Decimal>, AdapterError> {
        let state = self.lock();
        let history = state.history.get(symbol).ok_or_else(|| AdapterError::Unknown {
            message: format!("no history for {symbol}"),
        })?;
        let skip = history.len().saturating_sub(limit);
        Ok(history.iter().skip(skip).copied().collect())
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderResult, AdapterError> {
        let mut state = self.lock();
        if let Some(previous) = state.orders.get(&request.client_order_id) {
            tracing::debug!(
                client_order_id = %request.client_order_id,
                "Replayed client order id, returning original outcome"
            );
            return Ok(previous.clone());
        }
        if let Some(error) = state.injected.pop_front() {
            return Err(error);
        }
        let result = self.execute(&mut state, &request)?;
        state
            .orders
            .insert(request.client_order_id.clone(), result.clone());
        tracing::debug!(
            exchange = %self.exchange,
            symbol = %request.symbol,
            side = %request.side,
            size = %request.size,
            reduce_only = request.reduce_only,
            ?result,
            "Paper order processed"
        );
        Ok(result)
    }

    async fn cancel_order(&self, _order_id: &OrderId) -> Result<bool, AdapterError> {
        // Market orders fill on arrival; nothing is ever resting.
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> PaperExchange {
        PaperExchange::new(PaperExchangeConfig {
            slippage_bps: Decimal::ZERO,
            ..PaperExchangeConfig::default()
        })
    }

    fn order(id: &str, side: OrderSide, size: Decimal, reduce_only: bool) -> OrderRequest {
        OrderRequest {
            client_order_id: ClientOrderId::new(id),
            symbol: Symbol::new("SOL"),
            exchange_market_id: ExchangeMarketId::new("2"),
            side,
            size,
            reduce_only,
        }
    }

    #[tokio::test]
    async fn open_then_close_realizes_pnl() {
        let ex = exchange();
        ex.place_order(order("a", OrderSide::Buy, dec!(10), false))
            .await
            .unwrap();
        assert_eq!(ex.get_account_balance().await.unwrap(), dec!(9850));

        ex.set_price(&Symbol::new("SOL"), dec!(160));
        let result = ex
            .place_order(order("b", OrderSide::Sell, dec!(10), true))
            .await
            .unwrap();

        assert!(matches!(result, OrderResult::Accepted { fill_price, .. } if fill_price == dec!(160)));
        assert_eq!(ex.get_account_balance().await.unwrap(), dec!(10100));
        assert!(ex.get_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replayed_client_order_id_does_not_fill_twice() {
        let ex = exchange();
        let first = ex
            .place_order(order("dup", OrderSide::Buy, dec!(1), false))
            .await
            .unwrap();
        let second = ex
            .place_order(order("dup", OrderSide::Buy, dec!(1), false))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ex.get_positions().await.unwrap()[0].size, dec!(1));
        assert_eq!(ex.order_count(), 1);
    }

    #[tokio::test]
    async fn margin_is_checked() {
        let ex = exchange();
        let err = ex
            .place_order(order("big", OrderSide::Buy, dec!(1000), false))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn inactive_market_rejects() {
        let ex = exchange();
        ex.set_market_active(&Symbol::new("SOL"), false);
        let result = ex
            .place_order(order("x", OrderSide::Sell, dec!(1), false))
            .await
            .unwrap();
        assert!(matches!(result, OrderResult::Rejected { .. }));
    }

    #[tokio::test]
    async fn injected_failures_come_first() {
        let ex = exchange();
        ex.inject_failures([AdapterError::Connection {
            message: "reset".to_string(),
        }]);
        assert!(
            ex.place_order(order("a", OrderSide::Buy, dec!(1), false))
                .await
                .is_err()
        );
        assert!(
            ex.place_order(order("a", OrderSide::Buy, dec!(1), false))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn delisted_market_disappears_from_discovery() {
        let ex = exchange();
        ex.delist(&Symbol::new("ETH"));
        let markets = ex.discover_markets().await.unwrap();
        assert!(markets.iter().all(|m| m.symbol.as_str() != "ETH"));
        assert_eq!(markets.len(), 2);
    }

    #[tokio::test]
    async fn tick_keeps_prices_positive_and_grows_history() {
        let ex = exchange();
        for _ in 0..10 {
            ex.tick();
        }
        let closes = ex.get_recent_closes(&Symbol::new("BTC"), 5).await.unwrap();
        assert_eq!(closes.len(), 5);
        assert!(closes.iter().all(|p| *p > Decimal::ZERO));
    }
}
