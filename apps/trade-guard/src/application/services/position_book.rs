//! Position Book
//!
//! Single writer of the positions of one exchange account. Every transition
//! goes through here so that:
//!
//! - at most one active position exists per symbol
//! - the active snapshot is persisted after each transition
//! - closed positions are archived and leave the active map
//! - each transition appends one trade record to the journal
//!
//! The book knows nothing about the strategy; reconfiguring a bot never
//! touches it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::ports::{PersistenceError, PositionStore};
use crate::domain::position::{
    ExchangePosition, Position, PositionError, PositionSide, PositionState, TradeAction,
    TradeRecord, TradeSource,
};
use crate::domain::shared::{
    ClientOrderId, ExchangeId, ExchangeMarketId, PositionId, Symbol, Timestamp,
};

/// Position book error.
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    /// Transition refused by the position aggregate.
    #[error(transparent)]
    Position(#[from] PositionError),

    /// Snapshot could not be persisted or loaded.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Parameters of a new entry.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    /// Symbol.
    pub symbol: Symbol,
    /// Exchange market id.
    pub exchange_market_id: ExchangeMarketId,
    /// Direction.
    pub side: PositionSide,
    /// Mark price at sizing time.
    pub quoted_price: Decimal,
    /// Size about to be ordered.
    pub size: Decimal,
    /// Oracle confidence.
    pub confidence: f64,
    /// Idempotency key of the entry order.
    pub client_order_id: ClientOrderId,
}

/// Result of booking an exit fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Fully closed and archived.
    Closed {
        /// P&L of the exit fill.
        pnl: Decimal,
    },
    /// Filled in part; the remainder is `OPEN` again.
    Partial {
        /// P&L of the filled part.
        pnl: Decimal,
        /// Size still held.
        remaining: Decimal,
    },
}

impl CloseOutcome {
    /// P&L realized by the fill.
    #[must_use]
    pub const fn pnl(&self) -> Decimal {
        match self {
            Self::Closed { pnl } | Self::Partial { pnl, .. } => *pnl,
        }
    }
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Exchange positions unknown locally, now tracked.
    pub adopted: Vec<Symbol>,
    /// Tracked positions whose entry or size was corrected.
    pub adjusted: Vec<Symbol>,
    /// Pending opens found filled on the exchange.
    pub confirmed: Vec<Symbol>,
    /// Tracked positions whose market the exchange now reports under a new
    /// symbol (listed by the new symbol).
    pub relabelled: Vec<Symbol>,
    /// Pending opens dropped because the exchange holds the opposite side.
    pub abandoned: Vec<Symbol>,
    /// Tracked positions missing on the exchange, now closed.
    pub closed_externally: Vec<Symbol>,
}

impl ReconcileSummary {
    /// Whether local state already matched the exchange.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.adopted.is_empty()
            && self.adjusted.is_empty()
            && self.confirmed.is_empty()
            && self.relabelled.is_empty()
            && self.abandoned.is_empty()
            && self.closed_externally.is_empty()
    }
}

/// The active positions of one exchange account.
pub struct PositionBook {
    exchange: ExchangeId,
    store: Arc<dyn PositionStore>,
    pending_timeout: Duration,
    active: BTreeMap<Symbol, Position>,
}

impl std::fmt::Debug for PositionBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionBook")
            .field("exchange", &self.exchange)
            .field("pending_timeout", &self.pending_timeout)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl PositionBook {
    /// Create an empty book.
    #[must_use]
    pub fn new(
        exchange: ExchangeId,
        store: Arc<dyn PositionStore>,
        pending_timeout: Duration,
    ) -> Self {
        Self {
            exchange,
            store,
            pending_timeout,
            active: BTreeMap::new(),
        }
    }

    /// Load the persisted snapshot of `exchange`.
    ///
    /// Terminal entries are dropped; a second active entry for a symbol is
    /// reported as corrupt state.
    pub async fn restore(
        exchange: ExchangeId,
        store: Arc<dyn PositionStore>,
        pending_timeout: Duration,
    ) -> Result<Self, BookError> {
        let mut book = Self::new(exchange, store, pending_timeout);
        for position in book.store.load_positions(&book.exchange).await? {
            if !position.is_active() {
                continue;
            }
            if book.active.contains_key(position.symbol()) {
                return Err(PersistenceError::Corrupt {
                    exchange: book.exchange.clone(),
                    message: format!("two active positions for {}", position.symbol()),
                }
                .into());
            }
            book.active.insert(position.symbol().clone(), position);
        }
        tracing::info!(
            exchange = %book.exchange,
            positions = book.active.len(),
            "Position book restored"
        );
        crate::observability::set_open_positions(&book.exchange, book.active.len());
        Ok(book)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Exchange account.
    #[must_use]
    pub const fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    /// Active position on `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<&Position> {
        self.active.get(symbol)
    }

    /// Whether `symbol` is occupied.
    #[must_use]
    pub fn has_active(&self, symbol: &Symbol) -> bool {
        self.active.contains_key(symbol)
    }

    /// Active positions, ordered by symbol.
    pub fn active(&self) -> impl Iterator<Item = &Position> {
        self.active.values()
    }

    /// Positions in state `OPEN`.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.active
            .values()
            .filter(|p| p.state() == PositionState::Open)
    }

    /// Owned copy of the active positions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Position> {
        self.active.values().cloned().collect()
    }

    /// Number of active positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no position is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Track a new entry in `PENDING_OPEN`.
    pub async fn begin_open(
        &mut self,
        request: OpenRequest,
        source: TradeSource,
        now: Timestamp,
    ) -> Result<PositionId, BookError> {
        if let Some(existing) = self.active.get(&request.symbol) {
            return Err(PositionError::AlreadyActive {
                symbol: request.symbol,
                state: existing.state(),
            }
            .into());
        }
        let position = Position::pending_open(
            self.exchange.clone(),
            request.symbol.clone(),
            request.exchange_market_id,
            request.side,
            request.quoted_price,
            request.size,
            request.confidence,
            request.client_order_id,
            now,
        );
        let id = position.id().clone();
        self.active.insert(request.symbol.clone(), position);
        self.persist().await?;
        self.journal(
            self.record(&request.symbol, TradeAction::OpenRequested, source, now)
                .with_position(&id)
                .with_detail(format!("{} {}", request.side, request.size)),
        )
        .await;
        Ok(id)
    }

    /// Entry filled: `PENDING_OPEN → OPEN`.
    pub async fn confirm_open(
        &mut self,
        symbol: &Symbol,
        fill_price: Decimal,
        fill_size: Decimal,
        source: TradeSource,
        now: Timestamp,
    ) -> Result<(), BookError> {
        let position = self.active_mut(symbol)?;
        position.confirm_open(fill_price, fill_size, now)?;
        let id = position.id().clone();
        self.persist().await?;
        tracing::info!(
            exchange = %self.exchange,
            symbol = %symbol,
            fill_price = %fill_price,
            fill_size = %fill_size,
            "Position opened"
        );
        self.journal(
            self.record(symbol, TradeAction::Opened, source, now)
                .with_position(&id)
                .with_detail(format!("filled {fill_size} @ {fill_price}")),
        )
        .await;
        Ok(())
    }

    /// Entry failed or timed out: the pending position is discarded.
    pub async fn fail_open(
        &mut self,
        symbol: &Symbol,
        source: TradeSource,
        reason: &str,
        now: Timestamp,
    ) -> Result<(), BookError> {
        let state = self.active_mut(symbol)?.state();
        if state != PositionState::PendingOpen {
            return Err(PositionError::InvalidStateTransition {
                from: state,
                to: PositionState::Closed,
                reason: "only a pending open can be abandoned".to_string(),
            }
            .into());
        }
        let Some(position) = self.active.remove(symbol) else {
            return Err(PositionError::NotFound {
                symbol: symbol.clone(),
            }
            .into());
        };
        self.persist().await?;
        tracing::warn!(
            exchange = %self.exchange,
            symbol = %symbol,
            reason = %reason,
            "Pending open abandoned"
        );
        self.journal(
            self.record(symbol, TradeAction::OpenAbandoned, source, now)
                .with_position(position.id())
                .with_detail(reason),
        )
        .await;
        Ok(())
    }

    /// Close accepted: `OPEN → PENDING_CLOSE`.
    pub async fn begin_close(
        &mut self,
        symbol: &Symbol,
        client_order_id: ClientOrderId,
        source: TradeSource,
        detail: &str,
        now: Timestamp,
    ) -> Result<(), BookError> {
        let position = self.active_mut(symbol)?;
        position.begin_close(client_order_id, now)?;
        let id = position.id().clone();
        self.persist().await?;
        self.journal(
            self.record(symbol, TradeAction::CloseRequested, source, now)
                .with_position(&id)
                .with_detail(detail),
        )
        .await;
        Ok(())
    }

    /// Book an exit fill.
    ///
    /// A full fill moves `PENDING_CLOSE → CLOSED` and archives the position.
    /// A partial fill realizes P&L on the filled size and returns the
    /// remainder to `OPEN` under the same `opened_at`.
    pub async fn confirm_close(
        &mut self,
        symbol: &Symbol,
        fill_price: Decimal,
        fill_size: Decimal,
        source: TradeSource,
        now: Timestamp,
    ) -> Result<CloseOutcome, BookError> {
        let position = self.active_mut(symbol)?;
        let pnl = position.confirm_close(fill_price, fill_size, now)?;

        if position.state() == PositionState::Open {
            let remaining = position.size();
            let id = position.id().clone();
            self.persist().await?;
            tracing::warn!(
                exchange = %self.exchange,
                symbol = %symbol,
                fill_price = %fill_price,
                fill_size = %fill_size,
                remaining = %remaining,
                pnl = %pnl,
                "Exit partially filled, remainder stays open"
            );
            self.journal(
                self.record(symbol, TradeAction::PartiallyClosed, source, now)
                    .with_position(&id)
                    .with_pnl(Some(pnl))
                    .with_detail(format!("filled {fill_size} @ {fill_price}, {remaining} left")),
            )
            .await;
            return Ok(CloseOutcome::Partial { pnl, remaining });
        }

        let Some(position) = self.active.remove(symbol) else {
            return Err(PositionError::NotFound {
                symbol: symbol.clone(),
            }
            .into());
        };
        self.store.archive_position(&position).await?;
        self.persist().await?;
        tracing::info!(
            exchange = %self.exchange,
            symbol = %symbol,
            fill_price = %fill_price,
            pnl = %pnl,
            "Position closed"
        );
        self.journal(
            self.record(symbol, TradeAction::Closed, source, now)
                .with_position(position.id())
                .with_pnl(Some(pnl)),
        )
        .await;
        Ok(CloseOutcome::Closed { pnl })
    }

    /// Exit failed or timed out: `PENDING_CLOSE → OPEN`.
    pub async fn fail_close(
        &mut self,
        symbol: &Symbol,
        source: TradeSource,
        reason: &str,
        now: Timestamp,
    ) -> Result<(), BookError> {
        let position = self.active_mut(symbol)?;
        position.revert_close()?;
        let id = position.id().clone();
        self.persist().await?;
        tracing::warn!(
            exchange = %self.exchange,
            symbol = %symbol,
            reason = %reason,
            "Close reverted, position back to OPEN"
        );
        self.journal(
            self.record(symbol, TradeAction::CloseReverted, source, now)
                .with_position(&id)
                .with_detail(reason),
        )
        .await;
        Ok(())
    }

    /// Resolve every pending position older than the timeout.
    ///
    /// Pending opens are abandoned; pending closes revert to `OPEN`.
    pub async fn expire_stale_pending(&mut self, now: Timestamp) -> Result<Vec<Symbol>, BookError> {
        let stale: Vec<(Symbol, PositionState)> = self
            .active
            .values()
            .filter(|p| p.pending_for(now).is_some_and(|d| d >= self.pending_timeout))
            .map(|p| (p.symbol().clone(), p.state()))
            .collect();

        let reason = format!("pending longer than {}s", self.pending_timeout.as_secs());
        for (symbol, state) in &stale {
            match state {
                PositionState::PendingOpen => {
                    self.fail_open(symbol, TradeSource::Timeout, &reason, now)
                        .await?;
                }
                PositionState::PendingClose => {
                    self.fail_close(symbol, TradeSource::Timeout, &reason, now)
                        .await?;
                }
                PositionState::Open | PositionState::Closed => {}
            }
        }
        Ok(stale.into_iter().map(|(symbol, _)| symbol).collect())
    }

    /// Record cumulative realized P&L reported for a live position.
    pub async fn apply_realized_pnl(
        &mut self,
        symbol: &Symbol,
        realized: Decimal,
        source: TradeSource,
        now: Timestamp,
    ) -> Result<(), BookError> {
        let position = self.active_mut(symbol)?;
        if position.realized_pnl() == Some(realized) {
            return Ok(());
        }
        position.apply_realized_pnl(realized)?;
        let id = position.id().clone();
        self.persist().await?;
        self.journal(
            self.record(symbol, TradeAction::Adjusted, source, now)
                .with_position(&id)
                .with_pnl(Some(realized))
                .with_detail("realized pnl"),
        )
        .await;
        Ok(())
    }

    /// Journal a record that is not a transition (validator rejections).
    pub async fn append_record(&self, record: TradeRecord) {
        self.journal(record).await;
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Align the book with the exchange's positions.
    ///
    /// - on both sides: exchange entry and size win, `opened_at` is kept, a
    ///   pending open is confirmed, reported realized P&L is applied
    /// - same market under a new label: the tracked position takes the label
    /// - opposite side: the tracked position (or pending open) is replaced by
    ///   the exchange one
    /// - only local and live: closed externally
    /// - only local and pending open: left for the timeout
    /// - only on the exchange: adopted with `opened_at = now`
    pub async fn reconcile(
        &mut self,
        exchange_positions: &[ExchangePosition],
        now: Timestamp,
    ) -> Result<ReconcileSummary, BookError> {
        let mut summary = ReconcileSummary::default();
        let source = TradeSource::Reconciliation;
        let reported: Vec<&ExchangePosition> = exchange_positions
            .iter()
            .filter(|p| p.size > Decimal::ZERO)
            .collect();

        for found in &reported {
            let symbol = &found.symbol;

            if let Some(previous) = self.tracked_under_other_label(found, &reported) {
                self.relabel(&previous, found, now).await?;
                summary.relabelled.push(symbol.clone());
            }

            let mismatch = self
                .active
                .get(symbol)
                .filter(|local| local.side() != found.side)
                .map(|local| (local.state(), local.side()));
            if let Some((state, local_side)) = mismatch {
                tracing::warn!(
                    exchange = %self.exchange,
                    symbol = %symbol,
                    local_side = %local_side,
                    exchange_side = %found.side,
                    "Exchange side differs from tracked position, replacing it"
                );
                if state == PositionState::PendingOpen {
                    self.fail_open(symbol, source, "side mismatch", now).await?;
                    summary.abandoned.push(symbol.clone());
                } else {
                    self.close_externally(symbol, now).await?;
                    summary.closed_externally.push(symbol.clone());
                }
            }

            match self.active.get(symbol).map(Position::state) {
                None => {
                    self.adopt(found, now).await?;
                    summary.adopted.push(symbol.clone());
                }
                Some(PositionState::PendingOpen) => {
                    self.confirm_open(symbol, found.entry_price, found.size, source, now)
                        .await?;
                    summary.confirmed.push(symbol.clone());
                }
                Some(_) => {
                    if self.align(found, now).await? {
                        summary.adjusted.push(symbol.clone());
                    }
                }
            }

            if let Some(realized) = found.realized_pnl {
                self.apply_realized_pnl(symbol, realized, source, now)
                    .await?;
            }
        }

        let missing: Vec<Symbol> = self
            .active
            .values()
            .filter(|p| {
                p.state() != PositionState::PendingOpen
                    && !reported.iter().any(|r| &r.symbol == p.symbol())
            })
            .map(|p| p.symbol().clone())
            .collect();
        for symbol in missing {
            self.close_externally(&symbol, now).await?;
            summary.closed_externally.push(symbol);
        }

        if summary.is_clean() {
            tracing::debug!(exchange = %self.exchange, "Reconciliation found no drift");
        } else {
            tracing::info!(
                exchange = %self.exchange,
                adopted = summary.adopted.len(),
                adjusted = summary.adjusted.len(),
                confirmed = summary.confirmed.len(),
                relabelled = summary.relabelled.len(),
                abandoned = summary.abandoned.len(),
                closed_externally = summary.closed_externally.len(),
                "Reconciled position book with exchange"
            );
        }
        Ok(summary)
    }

    /// Label under which the market of `found` is tracked, when the exchange
    /// no longer reports that label.
    fn tracked_under_other_label(
        &self,
        found: &ExchangePosition,
        reported: &[&ExchangePosition],
    ) -> Option<Symbol> {
        if self.active.contains_key(&found.symbol) {
            return None;
        }
        self.active
            .values()
            .find(|local| {
                local.exchange_market_id() == &found.exchange_market_id
                    && !reported.iter().any(|r| &r.symbol == local.symbol())
            })
            .map(|local| local.symbol().clone())
    }

    async fn relabel(
        &mut self,
        previous: &Symbol,
        found: &ExchangePosition,
        now: Timestamp,
    ) -> Result<(), BookError> {
        let Some(mut position) = self.active.remove(previous) else {
            return Err(PositionError::NotFound {
                symbol: previous.clone(),
            }
            .into());
        };
        position.relabel(found.symbol.clone());
        let id = position.id().clone();
        self.active.insert(found.symbol.clone(), position);
        self.persist().await?;
        tracing::warn!(
            exchange = %self.exchange,
            market = %found.exchange_market_id,
            from = %previous,
            to = %found.symbol,
            "Market relabelled by the exchange, position follows"
        );
        self.journal(
            self.record(&found.symbol, TradeAction::Adjusted, TradeSource::Reconciliation, now)
                .with_position(&id)
                .with_detail(format!("relabelled from {previous}")),
        )
        .await;
        Ok(())
    }

    async fn adopt(&mut self, found: &ExchangePosition, now: Timestamp) -> Result<(), BookError> {
        let position = Position::adopt(self.exchange.clone(), found, now);
        let id = position.id().clone();
        self.active.insert(found.symbol.clone(), position);
        self.persist().await?;
        tracing::warn!(
            exchange = %self.exchange,
            symbol = %found.symbol,
            side = %found.side,
            size = %found.size,
            "Adopted untracked exchange position"
        );
        self.journal(
            self.record(&found.symbol, TradeAction::Adopted, TradeSource::Reconciliation, now)
                .with_position(&id)
                .with_detail(format!("{} {} @ {}", found.side, found.size, found.entry_price)),
        )
        .await;
        Ok(())
    }

    async fn align(&mut self, found: &ExchangePosition, now: Timestamp) -> Result<bool, BookError> {
        let position = self.active_mut(&found.symbol)?;
        if !position.align_with_exchange(found.entry_price, found.size) {
            return Ok(false);
        }
        let id = position.id().clone();
        self.persist().await?;
        self.journal(
            self.record(&found.symbol, TradeAction::Adjusted, TradeSource::Reconciliation, now)
                .with_position(&id)
                .with_detail(format!("entry {} size {}", found.entry_price, found.size)),
        )
        .await;
        Ok(true)
    }

    async fn close_externally(&mut self, symbol: &Symbol, now: Timestamp) -> Result<(), BookError> {
        self.active_mut(symbol)?.close_externally(now)?;
        let Some(position) = self.active.remove(symbol) else {
            return Err(PositionError::NotFound {
                symbol: symbol.clone(),
            }
            .into());
        };
        self.store.archive_position(&position).await?;
        self.persist().await?;
        tracing::warn!(
            exchange = %self.exchange,
            symbol = %symbol,
            "Tracked position missing on exchange, closed externally"
        );
        self.journal(
            self.record(symbol, TradeAction::Closed, TradeSource::Reconciliation, now)
                .with_position(position.id())
                .with_pnl(position.realized_pnl())
                .with_detail("closed outside the bot"),
        )
        .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn active_mut(&mut self, symbol: &Symbol) -> Result<&mut Position, PositionError> {
        self.active
            .get_mut(symbol)
            .ok_or_else(|| PositionError::NotFound {
                symbol: symbol.clone(),
            })
    }

    fn record(
        &self,
        symbol: &Symbol,
        action: TradeAction,
        source: TradeSource,
        now: Timestamp,
    ) -> TradeRecord {
        TradeRecord::new(self.exchange.clone(), symbol.clone(), action, source, now)
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        let positions = self.snapshot();
        self.store.save_positions(&self.exchange, &positions).await?;
        crate::observability::set_open_positions(&self.exchange, positions.len());
        Ok(())
    }

    /// Journal failures are logged, never propagated: the transition they
    /// describe has already been persisted.
    async fn journal(&self, record: TradeRecord) {
        if let Err(e) = self.store.append_trade(&record).await {
            tracing::error!(
                exchange = %self.exchange,
                symbol = %record.symbol,
                action = %record.action_taken,
                error = %e,
                "Failed to append trade record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::InMemoryPositionStore;
    use rust_decimal_macros::dec;

    const T0: &str = "2026-03-01T12:00:00Z";

    fn at(secs: u64) -> Timestamp {
        Timestamp::parse(T0).unwrap().plus(Duration::from_secs(secs))
    }

    fn exchange() -> ExchangeId {
        ExchangeId::new("paper")
    }

    fn book(store: &Arc<InMemoryPositionStore>) -> PositionBook {
        PositionBook::new(exchange(), store.clone(), Duration::from_secs(120))
    }

    fn market_id(symbol: &str) -> ExchangeMarketId {
        ExchangeMarketId::new(format!("perp-{}", symbol.to_lowercase()))
    }

    fn open_request(symbol: &str) -> OpenRequest {
        OpenRequest {
            symbol: Symbol::new(symbol),
            exchange_market_id: market_id(symbol),
            side: PositionSide::Long,
            quoted_price: dec!(100),
            size: dec!(2),
            confidence: 0.8,
            client_order_id: ClientOrderId::generate(),
        }
    }

    fn found(symbol: &str, entry: Decimal, size: Decimal) -> ExchangePosition {
        ExchangePosition {
            symbol: Symbol::new(symbol),
            exchange_market_id: market_id(symbol),
            side: PositionSide::Long,
            size,
            entry_price: entry,
            realized_pnl: None,
        }
    }

    async fn opened(book: &mut PositionBook, symbol: &str, at_secs: u64) {
        book.begin_open(open_request(symbol), TradeSource::Oracle, at(at_secs))
            .await
            .unwrap();
        book.confirm_open(
            &Symbol::new(symbol),
            dec!(100),
            dec!(2),
            TradeSource::Oracle,
            at(at_secs),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn second_open_on_symbol_is_refused() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        book.begin_open(open_request("SOL"), TradeSource::Oracle, at(0))
            .await
            .unwrap();

        let result = book
            .begin_open(open_request("SOL"), TradeSource::Oracle, at(1))
            .await;

        assert!(matches!(
            result,
            Err(BookError::Position(PositionError::AlreadyActive { .. }))
        ));
        assert_eq!(book.len(), 1);
    }

    #[tokio::test]
    async fn full_lifecycle_archives_and_journals() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        let sol = Symbol::new("SOL");
        opened(&mut book, "SOL", 0).await;

        book.begin_close(
            &sol,
            ClientOrderId::generate(),
            TradeSource::HardRule,
            "stop_loss",
            at(60),
        )
        .await
        .unwrap();
        let outcome = book
            .confirm_close(&sol, dec!(98), dec!(2), TradeSource::HardRule, at(61))
            .await
            .unwrap();

        assert_eq!(outcome, CloseOutcome::Closed { pnl: dec!(-4) });
        assert!(book.is_empty());
        assert!(store.load_positions(&exchange()).await.unwrap().is_empty());
        assert_eq!(store.archived().len(), 1);

        let actions: Vec<TradeAction> = store
            .load_trades(&exchange())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.action_taken)
            .collect();
        assert_eq!(
            actions,
            vec![
                TradeAction::OpenRequested,
                TradeAction::Opened,
                TradeAction::CloseRequested,
                TradeAction::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn failed_open_is_discarded() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        book.begin_open(open_request("BTC"), TradeSource::Oracle, at(0))
            .await
            .unwrap();

        book.fail_open(&Symbol::new("BTC"), TradeSource::Oracle, "rejected", at(1))
            .await
            .unwrap();

        assert!(!book.has_active(&Symbol::new("BTC")));
        assert!(store.archived().is_empty());
    }

    #[tokio::test]
    async fn stale_pending_states_expire() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        opened(&mut book, "ETH", 0).await;
        book.begin_close(
            &Symbol::new("ETH"),
            ClientOrderId::generate(),
            TradeSource::Oracle,
            "oracle",
            at(10),
        )
        .await
        .unwrap();
        book.begin_open(open_request("BTC"), TradeSource::Oracle, at(10))
            .await
            .unwrap();

        assert!(book.expire_stale_pending(at(60)).await.unwrap().is_empty());
        let expired = book.expire_stale_pending(at(200)).await.unwrap();

        assert_eq!(expired.len(), 2);
        assert!(!book.has_active(&Symbol::new("BTC")));
        assert_eq!(
            book.get(&Symbol::new("ETH")).unwrap().state(),
            PositionState::Open
        );
    }

    #[tokio::test]
    async fn restore_then_reconcile_keeps_opened_at() {
        let store = Arc::new(InMemoryPositionStore::new());
        {
            let mut book = book(&store);
            opened(&mut book, "SOL", 0).await;
        }

        let mut restored = PositionBook::restore(exchange(), store.clone(), Duration::from_secs(120))
            .await
            .unwrap();
        let summary = restored
            .reconcile(&[found("SOL", dec!(101), dec!(1.5))], at(3600))
            .await
            .unwrap();

        let sol = restored.get(&Symbol::new("SOL")).unwrap();
        assert_eq!(summary.adjusted, vec![Symbol::new("SOL")]);
        assert_eq!(sol.opened_at(), Some(at(0)));
        assert_eq!(sol.entry_price(), dec!(101));
        assert_eq!(sol.size(), dec!(1.5));
    }

    #[tokio::test]
    async fn reconcile_adopts_confirms_and_closes() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        opened(&mut book, "ETH", 0).await;
        book.begin_open(open_request("BTC"), TradeSource::Oracle, at(5))
            .await
            .unwrap();
        book.begin_open(open_request("DOGE"), TradeSource::Oracle, at(5))
            .await
            .unwrap();

        let summary = book
            .reconcile(
                &[
                    found("BTC", dec!(100.2), dec!(2)),
                    found("ARB", dec!(1.1), dec!(300)),
                ],
                at(30),
            )
            .await
            .unwrap();

        assert_eq!(summary.confirmed, vec![Symbol::new("BTC")]);
        assert_eq!(summary.adopted, vec![Symbol::new("ARB")]);
        assert_eq!(summary.closed_externally, vec![Symbol::new("ETH")]);
        assert_eq!(
            book.get(&Symbol::new("DOGE")).unwrap().state(),
            PositionState::PendingOpen
        );
        let arb = book.get(&Symbol::new("ARB")).unwrap();
        assert_eq!(arb.opened_at(), Some(at(30)));
        assert_eq!(arb.state(), PositionState::Open);
    }

    #[tokio::test]
    async fn reconcile_applies_reported_realized_pnl() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        opened(&mut book, "SOL", 0).await;

        let mut reported = found("SOL", dec!(100), dec!(2));
        reported.realized_pnl = Some(dec!(-0.35));
        book.reconcile(&[reported], at(60)).await.unwrap();

        assert_eq!(
            book.get(&Symbol::new("SOL")).unwrap().realized_pnl(),
            Some(dec!(-0.35))
        );
    }

    #[tokio::test]
    async fn partial_exit_fill_keeps_remainder_and_hold_history() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        let sol = Symbol::new("SOL");
        opened(&mut book, "SOL", 0).await;
        book.begin_close(
            &sol,
            ClientOrderId::generate(),
            TradeSource::Oracle,
            "oracle",
            at(3600),
        )
        .await
        .unwrap();

        let outcome = book
            .confirm_close(&sol, dec!(110), dec!(1), TradeSource::Oracle, at(3601))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CloseOutcome::Partial {
                pnl: dec!(10),
                remaining: dec!(1),
            }
        );
        let position = book.get(&sol).unwrap();
        assert_eq!(position.state(), PositionState::Open);
        assert_eq!(position.size(), dec!(1));
        assert_eq!(position.opened_at(), Some(at(0)));
        assert!(store.archived().is_empty());

        // The remainder still on the exchange is the same position.
        let summary = book
            .reconcile(&[found("SOL", dec!(100), dec!(1))], at(3700))
            .await
            .unwrap();
        assert!(summary.is_clean());
        assert_eq!(book.get(&sol).unwrap().opened_at(), Some(at(0)));

        let last = store.load_trades(&exchange()).await.unwrap();
        assert!(
            last.iter()
                .any(|r| r.action_taken == TradeAction::PartiallyClosed
                    && r.resulting_pnl == Some(dec!(10)))
        );
    }

    #[tokio::test]
    async fn pending_open_on_opposite_side_is_replaced_by_exchange_position() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        let sol = Symbol::new("SOL");
        book.begin_open(open_request("SOL"), TradeSource::Oracle, at(0))
            .await
            .unwrap();

        let mut short = found("SOL", dec!(99), dec!(3));
        short.side = PositionSide::Short;
        let summary = book.reconcile(&[short], at(30)).await.unwrap();

        assert_eq!(summary.abandoned, vec![sol.clone()]);
        assert_eq!(summary.adopted, vec![sol.clone()]);
        assert!(summary.confirmed.is_empty());
        let position = book.get(&sol).unwrap();
        assert_eq!(position.side(), PositionSide::Short);
        assert_eq!(position.size(), dec!(3));
        assert_eq!(position.state(), PositionState::Open);

        let actions: Vec<TradeAction> = store
            .load_trades(&exchange())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.action_taken)
            .collect();
        assert_eq!(
            actions,
            vec![
                TradeAction::OpenRequested,
                TradeAction::OpenAbandoned,
                TradeAction::Adopted,
            ]
        );
    }

    #[tokio::test]
    async fn open_position_on_opposite_side_is_closed_then_adopted() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        opened(&mut book, "ETH", 0).await;

        let mut short = found("ETH", dec!(100), dec!(2));
        short.side = PositionSide::Short;
        let summary = book.reconcile(&[short], at(60)).await.unwrap();

        assert_eq!(summary.closed_externally, vec![Symbol::new("ETH")]);
        assert_eq!(summary.adopted, vec![Symbol::new("ETH")]);
        assert_eq!(
            book.get(&Symbol::new("ETH")).unwrap().side(),
            PositionSide::Short
        );
        assert_eq!(store.archived().len(), 1);
    }

    #[tokio::test]
    async fn relabelled_market_keeps_tracked_position() {
        let store = Arc::new(InMemoryPositionStore::new());
        let mut book = book(&store);
        opened(&mut book, "MATIC", 0).await;

        let relabelled = ExchangePosition {
            symbol: Symbol::new("POL"),
            ..found("MATIC", dec!(100), dec!(2))
        };
        let summary = book.reconcile(&[relabelled], at(900)).await.unwrap();

        assert_eq!(summary.relabelled, vec![Symbol::new("POL")]);
        assert!(summary.adopted.is_empty());
        assert!(summary.closed_externally.is_empty());
        assert!(!book.has_active(&Symbol::new("MATIC")));
        let pol = book.get(&Symbol::new("POL")).unwrap();
        assert_eq!(pol.symbol(), &Symbol::new("POL"));
        assert_eq!(pol.exchange_market_id(), &market_id("MATIC"));
        assert_eq!(pol.opened_at(), Some(at(0)));
        assert!(store.archived().is_empty());
    }
}
