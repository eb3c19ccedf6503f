//! Position aggregate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{PositionError, PositionSide, PositionState, PositionStateMachine};
use crate::domain::shared::{
    ClientOrderId, ExchangeId, ExchangeMarketId, PositionId, Symbol, Timestamp,
};

/// Ground-truth position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePosition {
    /// Display symbol.
    pub symbol: Symbol,
    /// Exchange market identifier.
    pub exchange_market_id: ExchangeMarketId,
    /// Direction.
    pub side: PositionSide,
    /// Absolute size.
    pub size: Decimal,
    /// Average entry price.
    pub entry_price: Decimal,
    /// Cumulative realized P&L the exchange attributes to the position
    /// (funding, partial reductions), when it reports one.
    pub realized_pnl: Option<Decimal>,
}

/// A tracked position.
///
/// Until the entry is confirmed, `entry_price` holds the quoted price and
/// `size` the requested size; confirmation overwrites both with fill values.
/// `opened_at` is written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    exchange: ExchangeId,
    symbol: Symbol,
    exchange_market_id: ExchangeMarketId,
    side: PositionSide,
    state: PositionState,
    entry_price: Decimal,
    size: Decimal,
    opened_at: Option<Timestamp>,
    confidence_at_entry: f64,
    realized_pnl: Option<Decimal>,
    closed_at: Option<Timestamp>,
    pending_order: Option<ClientOrderId>,
    pending_since: Option<Timestamp>,
}

impl Position {
    /// Start a position in `PENDING_OPEN` for an entry order about to be sent.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn pending_open(
        exchange: ExchangeId,
        symbol: Symbol,
        exchange_market_id: ExchangeMarketId,
        side: PositionSide,
        quoted_price: Decimal,
        requested_size: Decimal,
        confidence: f64,
        client_order_id: ClientOrderId,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PositionId::generate(),
            exchange,
            symbol,
            exchange_market_id,
            side,
            state: PositionState::PendingOpen,
            entry_price: quoted_price,
            size: requested_size,
            opened_at: None,
            confidence_at_entry: confidence,
            realized_pnl: None,
            closed_at: None,
            pending_order: Some(client_order_id),
            pending_since: Some(now),
        }
    }

    /// Adopt a position found on the exchange but unknown locally.
    ///
    /// Hold-duration history is unavailable, so `opened_at` starts at `now`.
    #[must_use]
    pub fn adopt(exchange: ExchangeId, found: &ExchangePosition, now: Timestamp) -> Self {
        Self {
            id: PositionId::generate(),
            exchange,
            symbol: found.symbol.clone(),
            exchange_market_id: found.exchange_market_id.clone(),
            side: found.side,
            state: PositionState::Open,
            entry_price: found.entry_price,
            size: found.size,
            opened_at: Some(now),
            confidence_at_entry: 0.0,
            realized_pnl: found.realized_pnl,
            closed_at: None,
            pending_order: None,
            pending_since: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Position id.
    #[must_use]
    pub const fn id(&self) -> &PositionId {
        &self.id
    }

    /// Exchange account.
    #[must_use]
    pub const fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    /// Symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Exchange market id.
    #[must_use]
    pub const fn exchange_market_id(&self) -> &ExchangeMarketId {
        &self.exchange_market_id
    }

    /// Direction.
    #[must_use]
    pub const fn side(&self) -> PositionSide {
        self.side
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PositionState {
        self.state
    }

    /// Entry price.
    #[must_use]
    pub const fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Size.
    #[must_use]
    pub const fn size(&self) -> Decimal {
        self.size
    }

    /// Fill confirmation time. `None` while `PENDING_OPEN`.
    #[must_use]
    pub const fn opened_at(&self) -> Option<Timestamp> {
        self.opened_at
    }

    /// Oracle confidence at entry (0 for adopted positions).
    #[must_use]
    pub const fn confidence_at_entry(&self) -> f64 {
        self.confidence_at_entry
    }

    /// Realized P&L so far.
    #[must_use]
    pub const fn realized_pnl(&self) -> Option<Decimal> {
        self.realized_pnl
    }

    /// Close time.
    #[must_use]
    pub const fn closed_at(&self) -> Option<Timestamp> {
        self.closed_at
    }

    /// Client order id of the order currently awaited.
    #[must_use]
    pub const fn pending_order(&self) -> Option<&ClientOrderId> {
        self.pending_order.as_ref()
    }

    /// Whether the position occupies its symbol.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// How long the position has been waiting on an order outcome.
    #[must_use]
    pub fn pending_for(&self, now: Timestamp) -> Option<Duration> {
        if !self.state.is_pending() {
            return None;
        }
        self.pending_since.map(|since| now.elapsed_since(since))
    }

    /// Time since the entry fill.
    #[must_use]
    pub fn held_for(&self, now: Timestamp) -> Option<Duration> {
        self.opened_at.map(|opened| now.elapsed_since(opened))
    }

    /// Unrealized P&L in percent of entry price, side-aware.
    #[must_use]
    pub fn unrealized_pnl_pct(&self, price: Decimal) -> Option<Decimal> {
        if self.entry_price <= Decimal::ZERO {
            return None;
        }
        let change = (price - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED;
        Some(change * self.side.sign())
    }

    /// Unrealized P&L in quote currency at `price`.
    #[must_use]
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn transition(&mut self, to: PositionState) -> Result<(), PositionError> {
        PositionStateMachine::validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }

    fn check_fill(&self, price: Decimal, size: Decimal) -> Result<(), PositionError> {
        if price <= Decimal::ZERO || size <= Decimal::ZERO {
            return Err(PositionError::InvalidFill {
                symbol: self.symbol.clone(),
                message: format!("price {price} and size {size} must be positive"),
            });
        }
        Ok(())
    }

    /// `PENDING_OPEN → OPEN` with the actual fill.
    pub fn confirm_open(
        &mut self,
        fill_price: Decimal,
        fill_size: Decimal,
        at: Timestamp,
    ) -> Result<(), PositionError> {
        self.check_fill(fill_price, fill_size)?;
        self.transition(PositionState::Open)?;
        self.entry_price = fill_price;
        self.size = fill_size;
        if self.opened_at.is_none() {
            self.opened_at = Some(at);
        }
        self.pending_order = None;
        self.pending_since = None;
        Ok(())
    }

    /// `OPEN → PENDING_CLOSE` for an accepted close.
    pub fn begin_close(
        &mut self,
        client_order_id: ClientOrderId,
        at: Timestamp,
    ) -> Result<(), PositionError> {
        self.transition(PositionState::PendingClose)?;
        self.pending_order = Some(client_order_id);
        self.pending_since = Some(at);
        Ok(())
    }

    /// Book an exit fill. Returns the P&L realized by this fill.
    ///
    /// A fill covering the whole size ends in `CLOSED`. A smaller fill
    /// realizes P&L on the filled part, shrinks `size` and returns to `OPEN`
    /// with `opened_at` untouched.
    pub fn confirm_close(
        &mut self,
        fill_price: Decimal,
        fill_size: Decimal,
        at: Timestamp,
    ) -> Result<Decimal, PositionError> {
        self.check_fill(fill_price, fill_size)?;
        let filled = fill_size.min(self.size);
        let remaining = self.size - filled;
        let next = if remaining > Decimal::ZERO {
            PositionState::Open
        } else {
            PositionState::Closed
        };
        self.transition(next)?;

        let trade_pnl = (fill_price - self.entry_price) * filled * self.side.sign();
        self.realized_pnl = Some(self.realized_pnl.unwrap_or_default() + trade_pnl);
        if next == PositionState::Closed {
            self.closed_at = Some(at);
        } else {
            self.size = remaining;
        }
        self.pending_order = None;
        self.pending_since = None;
        Ok(trade_pnl)
    }

    /// `PENDING_CLOSE → OPEN` after a failed or timed-out close.
    pub fn revert_close(&mut self) -> Result<(), PositionError> {
        self.transition(PositionState::Open)?;
        self.pending_order = None;
        self.pending_since = None;
        Ok(())
    }

    /// Close a position that disappeared from the exchange (manual close,
    /// liquidation). Realized P&L stays whatever was last known.
    pub fn close_externally(&mut self, at: Timestamp) -> Result<(), PositionError> {
        if self.state == PositionState::Open {
            self.transition(PositionState::PendingClose)?;
        }
        self.transition(PositionState::Closed)?;
        self.closed_at = Some(at);
        self.pending_order = None;
        self.pending_since = None;
        Ok(())
    }

    /// Set the cumulative realized P&L reported for a live position.
    pub fn apply_realized_pnl(&mut self, realized: Decimal) -> Result<(), PositionError> {
        if !matches!(
            self.state,
            PositionState::Open | PositionState::PendingClose
        ) {
            return Err(PositionError::InvalidStateTransition {
                from: self.state,
                to: self.state,
                reason: "realized P&L only applies to live positions".to_string(),
            });
        }
        self.realized_pnl = Some(realized);
        Ok(())
    }

    /// Take the display symbol the exchange now reports for this market.
    pub fn relabel(&mut self, symbol: Symbol) {
        self.symbol = symbol;
    }

    /// Replace entry price and size with exchange truth. `opened_at` is kept.
    /// Returns whether anything changed.
    pub fn align_with_exchange(&mut self, entry_price: Decimal, size: Decimal) -> bool {
        let changed = self.entry_price != entry_price || self.size != size;
        self.entry_price = entry_price;
        self.size = size;
        changed
    }
}
