//! Run Cycle Use Case
//!
//! One decision cycle of one bot:
//!
//! 1. skip when the exchange breaker is open
//! 2. read the market cache
//! 3. expire stale pending states, reconcile when due
//! 4. price every OPEN position (and fetch closes for the trend signal)
//! 5. ask the oracle once; failures yield an empty proposal
//! 6. validate the proposal
//! 7. evaluate the hard exit rules
//! 8. merge: forced closes win, minimum hold drops oracle closes
//! 9. size entries
//! 10. dispatch closes, then opens, serially
//!
//! The orchestrator owns the position book, and `&mut self` keeps cycles
//! from overlapping.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StrategyConfig;
use crate::application::ports::{
    AdapterError, DecisionOracle, MarketAdapter, OracleContext, OracleError, OracleRequest,
    OrderRequest,
};
use crate::application::services::{
    BookError, CacheError, CloseOutcome, ExecutionGateway, MarketCache, OpenRequest,
    PositionBook, ReconcileSummary,
};
use crate::domain::decision::{
    Action, Decision, DecisionValidator, ValidatedAction, ValidationRejection,
};
use crate::domain::exit_rules::{
    ExitDecision, HardExitRuleEngine, RuleEngineOverride, TrendDetector, TrendSignal,
};
use crate::domain::market::MarketSnapshot;
use crate::domain::position::{TradeAction, TradeRecord, TradeSource};
use crate::domain::shared::{ClientOrderId, CycleId, Symbol, Timestamp};

// =============================================================================
// Configuration and results
// =============================================================================

/// Orchestrator timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Timeout for read-only exchange calls.
    pub read_timeout: Duration,
    /// Timeout for the oracle call.
    pub oracle_timeout: Duration,
    /// How often the book is reconciled with exchange positions.
    pub reconcile_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            oracle_timeout: Duration::from_secs(60),
            reconcile_interval: Duration::from_secs(300),
        }
    }
}

/// Why a cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The exchange breaker is open.
    CircuitOpen,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// All steps ran.
    Completed,
    /// Nothing ran.
    Skipped(SkipReason),
}

/// Summary of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cycle id.
    pub cycle_id: CycleId,
    /// Strategy version used.
    pub strategy_version: u64,
    /// How the cycle ended.
    pub outcome: CycleOutcome,
    /// Well-formed oracle proposals.
    pub proposals: usize,
    /// Oracle entries rejected at the parsing boundary.
    pub malformed: usize,
    /// Oracle failure, when the proposal was replaced by an empty one.
    pub oracle_error: Option<String>,
    /// Validator rejections.
    pub rejections: Vec<ValidationRejection>,
    /// Divergences from oracle intent (forced closes and suppressions).
    pub overrides: Vec<RuleEngineOverride>,
    /// Oracle closes dropped during minimum hold.
    pub suppressions: usize,
    /// Reconciliation outcome, when it ran.
    pub reconciliation: Option<ReconcileSummary>,
    /// Pending positions resolved by timeout.
    pub expired: Vec<Symbol>,
    /// Orders sent.
    pub orders_dispatched: usize,
    /// Orders that did not fill.
    pub orders_failed: usize,
    /// Symbols whose entry filled.
    pub opened: Vec<Symbol>,
    /// Symbols whose exit filled.
    pub closed: Vec<Symbol>,
    /// Symbols whose exit filled in part; the remainder stays open.
    pub partially_closed: Vec<Symbol>,
}

impl CycleReport {
    fn new(cycle_id: CycleId, strategy_version: u64, outcome: CycleOutcome) -> Self {
        Self {
            cycle_id,
            strategy_version,
            outcome,
            proposals: 0,
            malformed: 0,
            oracle_error: None,
            rejections: Vec::new(),
            overrides: Vec::new(),
            suppressions: 0,
            reconciliation: None,
            expired: Vec::new(),
            orders_dispatched: 0,
            orders_failed: 0,
            opened: Vec::new(),
            closed: Vec::new(),
            partially_closed: Vec::new(),
        }
    }

    /// Whether the cycle was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Skipped(_))
    }
}

/// Cycle-level failure. The next cycle starts afresh.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// No market set available.
    #[error("Market data unavailable: {0}")]
    Markets(#[from] CacheError),

    /// The position book could not be updated.
    #[error("Position book error: {0}")]
    Book(#[from] BookError),

    /// A read the step depends on failed.
    #[error("Exchange read failed: {0}")]
    Exchange(#[from] AdapterError),
}

// =============================================================================
// Planning
// =============================================================================

#[derive(Debug, Clone)]
struct PlannedClose {
    symbol: Symbol,
    source: TradeSource,
    detail: String,
}

#[derive(Debug, Clone)]
struct PlannedOpen {
    action: ValidatedAction,
    price: Decimal,
    size: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct PricedPosition {
    price: Decimal,
    trend: TrendSignal,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives decision cycles for one exchange account.
pub struct Orchestrator {
    adapter: Arc<dyn MarketAdapter>,
    oracle: Arc<dyn DecisionOracle>,
    cache: MarketCache,
    gateway: ExecutionGateway,
    book: PositionBook,
    config: OrchestratorConfig,
    last_reconcile: Option<Timestamp>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("exchange", self.book.exchange())
            .field("config", &self.config)
            .field("last_reconcile", &self.last_reconcile)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Assemble an orchestrator. The book should already be restored.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn MarketAdapter>,
        oracle: Arc<dyn DecisionOracle>,
        cache: MarketCache,
        gateway: ExecutionGateway,
        book: PositionBook,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            adapter,
            oracle,
            cache,
            gateway,
            book,
            config,
            last_reconcile: None,
        }
    }

    /// The position book.
    #[must_use]
    pub const fn book(&self) -> &PositionBook {
        &self.book
    }

    /// The execution gateway.
    #[must_use]
    pub const fn gateway(&self) -> &ExecutionGateway {
        &self.gateway
    }

    /// The market cache.
    #[must_use]
    pub const fn cache(&self) -> &MarketCache {
        &self.cache
    }

    /// Run one cycle now.
    pub async fn run_cycle(&mut self, strategy: &StrategyConfig) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(strategy, Timestamp::now()).await
    }

    /// Reconcile the book with exchange positions immediately.
    pub async fn reconcile_now(&mut self, now: Timestamp) -> Result<ReconcileSummary, CycleError> {
        let positions = self
            .read("get_positions", self.adapter.get_positions())
            .await?;
        let summary = self.book.reconcile(&positions, now).await?;
        self.last_reconcile = Some(now);
        Ok(summary)
    }

    /// Run one cycle with `now` as the cycle time.
    #[allow(clippy::too_many_lines)]
    pub async fn run_cycle_at(
        &mut self,
        strategy: &StrategyConfig,
        now: Timestamp,
    ) -> Result<CycleReport, CycleError> {
        let cycle_id = CycleId::generate();
        let exchange = self.book.exchange().clone();

        if self.gateway.is_circuit_open() {
            tracing::warn!(
                cycle_id = %cycle_id,
                exchange = %exchange,
                remaining_ms = self
                    .gateway
                    .breaker()
                    .remaining_cooldown()
                    .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                "Circuit open, skipping cycle"
            );
            crate::observability::record_cycle("skipped");
            return Ok(CycleReport::new(
                cycle_id,
                strategy.version,
                CycleOutcome::Skipped(SkipReason::CircuitOpen),
            ));
        }

        let mut report = CycleReport::new(cycle_id.clone(), strategy.version, CycleOutcome::Completed);
        let result = self.execute_cycle(strategy, now, &mut report).await;
        match &result {
            Ok(()) => {
                crate::observability::record_cycle("completed");
                tracing::info!(
                    cycle_id = %cycle_id,
                    exchange = %exchange,
                    strategy_version = strategy.version,
                    proposals = report.proposals,
                    rejections = report.rejections.len(),
                    overrides = report.overrides.len(),
                    dispatched = report.orders_dispatched,
                    failed = report.orders_failed,
                    "Cycle completed"
                );
            }
            Err(e) => {
                crate::observability::record_cycle("failed");
                tracing::error!(cycle_id = %cycle_id, exchange = %exchange, error = %e, "Cycle failed");
            }
        }
        result.map(|()| report)
    }

    async fn execute_cycle(
        &mut self,
        strategy: &StrategyConfig,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let markets = self.cache.get_markets(false).await?;

        report.expired = self.book.expire_stale_pending(now).await?;
        if self.reconcile_due(now) {
            match self.reconcile_now(now).await {
                Ok(summary) => report.reconciliation = Some(summary),
                Err(CycleError::Exchange(e)) => {
                    tracing::warn!(error = %e, "Could not fetch exchange positions, reconciliation deferred");
                }
                Err(e) => return Err(e),
            }
        }

        let detector = TrendDetector::new(strategy.trend);
        let priced = self.price_open_positions(&detector, strategy).await;

        let balance = match self
            .read("get_account_balance", self.adapter.get_account_balance())
            .await
        {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!(error = %e, "Balance unavailable, entries skipped this cycle");
                None
            }
        };

        let cycle_id = report.cycle_id.clone();
        let decisions = self
            .ask_oracle(&cycle_id, strategy, &markets, balance, now, report)
            .await;

        let validator = DecisionValidator::new(strategy.min_confidence);
        let validation = validator.validate(&decisions, &markets, &self.book.snapshot(), now);
        for rejection in &validation.rejected {
            self.record_rejection(rejection, now).await;
        }
        report.rejections = validation.rejected;

        let engine = HardExitRuleEngine::new(strategy.exit_rules.clone());
        // Accepted decisions first, then the first raw entry per symbol.
        let mut oracle_by_symbol: BTreeMap<&Symbol, &Decision> = validation
            .accepted
            .iter()
            .map(|a| (a.symbol(), &a.decision))
            .collect();
        for decision in &decisions {
            oracle_by_symbol.entry(&decision.symbol).or_insert(decision);
        }
        let closes = self.plan_closes(&engine, &priced, &validation.accepted, &oracle_by_symbol, now, report);
        let opens = self
            .plan_opens(strategy, &markets, &validation.accepted, balance)
            .await;

        for close in closes {
            self.dispatch_close(close, now, report).await?;
        }
        for open in opens {
            self.dispatch_open(open, now, report).await?;
        }
        Ok(())
    }

    fn reconcile_due(&self, now: Timestamp) -> bool {
        self.last_reconcile
            .is_none_or(|last| now.elapsed_since(last) >= self.config.reconcile_interval)
    }

    async fn read<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, AdapterError>>,
    ) -> Result<T, AdapterError> {
        match tokio::time::timeout(self.config.read_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, "Exchange read timed out");
                Err(AdapterError::Timeout {
                    elapsed: self.config.read_timeout,
                })
            }
        }
    }

    /// Mark price and trend for every OPEN position. Positions whose price
    /// cannot be fetched are left out and get no action this cycle.
    async fn price_open_positions(
        &self,
        detector: &TrendDetector,
        strategy: &StrategyConfig,
    ) -> BTreeMap<Symbol, PricedPosition> {
        let mut priced = BTreeMap::new();
        let symbols: Vec<Symbol> = self.book.open_positions().map(|p| p.symbol().clone()).collect();
        for symbol in symbols {
            let price = match self
                .read("get_mark_price", self.adapter.get_mark_price(&symbol))
                .await
            {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!(
                        symbol = %symbol,
                        error = %e,
                        "Price unavailable, no action on position this cycle"
                    );
                    continue;
                }
            };
            let trend = if strategy.exit_rules.trend_reversal_enabled {
                match self
                    .read(
                        "get_recent_closes",
                        self.adapter
                            .get_recent_closes(&symbol, detector.required_closes()),
                    )
                    .await
                {
                    Ok(closes) => detector.detect(&closes),
                    Err(e) => {
                        tracing::debug!(symbol = %symbol, error = %e, "Closes unavailable, trend neutral");
                        TrendSignal::Neutral
                    }
                }
            } else {
                TrendSignal::Neutral
            };
            priced.insert(symbol, PricedPosition { price, trend });
        }
        priced
    }

    async fn ask_oracle(
        &self,
        cycle_id: &CycleId,
        strategy: &StrategyConfig,
        markets: &MarketSnapshot,
        balance: Option<Decimal>,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Vec<Decision> {
        let request = OracleRequest {
            context: OracleContext {
                cycle_id: cycle_id.clone(),
                exchange: self.book.exchange().clone(),
                balance,
                strategy_version: strategy.version,
                strategy_name: strategy.name.clone(),
                now,
            },
            markets: markets.iter().filter(|m| m.is_active()).cloned().collect(),
            positions: self.book.snapshot(),
        };

        let proposal = match tokio::time::timeout(self.config.oracle_timeout, self.oracle.propose(&request)).await {
            Ok(Ok(proposal)) => proposal,
            Ok(Err(e)) => return self.oracle_failed(&e, report),
            Err(_) => {
                return self.oracle_failed(
                    &OracleError::Timeout {
                        elapsed: self.config.oracle_timeout,
                    },
                    report,
                );
            }
        };
        let parsed = match proposal.parse() {
            Ok(parsed) => parsed,
            Err(e) => return self.oracle_failed(&OracleError::from(e), report),
        };

        for malformed in &parsed.malformed {
            tracing::warn!(
                cycle_id = %cycle_id,
                index = malformed.index,
                reason = %malformed.reason,
                "Malformed oracle decision dropped"
            );
        }
        crate::observability::record_oracle_malformed(parsed.malformed.len());
        report.proposals = parsed.decisions.len();
        report.malformed = parsed.malformed.len();
        parsed.decisions
    }

    fn oracle_failed(&self, error: &OracleError, report: &mut CycleReport) -> Vec<Decision> {
        tracing::warn!(
            exchange = %self.book.exchange(),
            error = %error,
            "Oracle unavailable, continuing with hard rules only"
        );
        crate::observability::record_oracle_failure();
        report.oracle_error = Some(error.to_string());
        Vec::new()
    }

    async fn record_rejection(&self, rejection: &ValidationRejection, now: Timestamp) {
        tracing::warn!(
            symbol = %rejection.decision.symbol,
            action = %rejection.decision.action,
            reason = rejection.reason.as_str(),
            detail = %rejection.detail,
            "Oracle decision rejected by validator"
        );
        crate::observability::record_validator_rejection(rejection.reason.as_str());
        self.book
            .append_record(
                TradeRecord::new(
                    self.book.exchange().clone(),
                    rejection.decision.symbol.clone(),
                    TradeAction::Rejected,
                    TradeSource::ValidatorReject,
                    now,
                )
                .with_detail(format!(
                    "{} {}: {}",
                    rejection.reason, rejection.decision.action, rejection.detail
                )),
            )
            .await;
    }

    /// Merge hard-rule verdicts with validated oracle closes.
    fn plan_closes(
        &self,
        engine: &HardExitRuleEngine,
        priced: &BTreeMap<Symbol, PricedPosition>,
        accepted: &[ValidatedAction],
        oracle_by_symbol: &BTreeMap<&Symbol, &Decision>,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Vec<PlannedClose> {
        let oracle_closes: HashSet<&Symbol> = accepted
            .iter()
            .filter(|a| a.action() == Action::Close)
            .map(ValidatedAction::symbol)
            .collect();
        let mut closes = Vec::new();

        for position in self.book.open_positions() {
            let symbol = position.symbol();
            let oracle_action = oracle_by_symbol.get(symbol).map(|d| d.action);
            let oracle_close = oracle_closes.contains(symbol);

            let Some(quote) = priced.get(symbol) else {
                if oracle_close {
                    tracing::warn!(symbol = %symbol, "Oracle close skipped: position unpriced");
                }
                continue;
            };

            match engine.evaluate(position, quote.price, now, quote.trend) {
                ExitDecision::Force { rule, pnl_pct } => {
                    // A rejected CLOSE is not oracle intent; the rule still overrides.
                    if !oracle_close {
                        let divergence = RuleEngineOverride {
                            position_id: position.id().clone(),
                            symbol: symbol.clone(),
                            oracle_action: oracle_action.map(|a| a.to_string()),
                            enforced_action: Action::Close.to_string(),
                            rule: rule.as_str().to_string(),
                        };
                        tracing::info!(
                            symbol = %symbol,
                            rule = rule.as_str(),
                            pnl_pct = %pnl_pct,
                            oracle_action = divergence.oracle_action.as_deref().unwrap_or("NONE"),
                            "Hard rule overrides oracle"
                        );
                        crate::observability::record_rule_override(rule.as_str());
                        report.overrides.push(divergence);
                    }
                    closes.push(PlannedClose {
                        symbol: symbol.clone(),
                        source: TradeSource::HardRule,
                        detail: format!("{rule} at {pnl_pct}%"),
                    });
                }
                ExitDecision::SuppressClose { pnl_pct } => {
                    if oracle_close {
                        tracing::info!(
                            symbol = %symbol,
                            pnl_pct = %pnl_pct,
                            "Oracle close suppressed during minimum hold"
                        );
                        crate::observability::record_rule_override("min_hold");
                        report.suppressions += 1;
                        report.overrides.push(RuleEngineOverride {
                            position_id: position.id().clone(),
                            symbol: symbol.clone(),
                            oracle_action: Some(Action::Close.to_string()),
                            enforced_action: Action::Hold.to_string(),
                            rule: "min_hold".to_string(),
                        });
                    }
                }
                ExitDecision::NoAction => {
                    if oracle_close {
                        closes.push(PlannedClose {
                            symbol: symbol.clone(),
                            source: TradeSource::Oracle,
                            detail: "oracle close".to_string(),
                        });
                    }
                }
            }
        }
        closes
    }

    /// Size validated BUY/SELL decisions. Entries that cannot be priced,
    /// round below the market minimum or exceed the position cap are dropped.
    async fn plan_opens(
        &self,
        strategy: &StrategyConfig,
        markets: &MarketSnapshot,
        accepted: &[ValidatedAction],
        balance: Option<Decimal>,
    ) -> Vec<PlannedOpen> {
        let mut opens = Vec::new();
        let mut slots = strategy
            .sizing
            .max_open_positions
            .saturating_sub(self.book.len());

        for action in accepted.iter().filter(|a| a.action().is_open()) {
            let symbol = action.symbol();
            let Some(balance) = balance else {
                continue;
            };
            if slots == 0 {
                tracing::info!(
                    symbol = %symbol,
                    max_open_positions = strategy.sizing.max_open_positions,
                    "Entry skipped: position cap reached"
                );
                continue;
            }
            let Some(market) = markets.get(symbol) else {
                continue;
            };
            let price = match self
                .read("get_mark_price", self.adapter.get_mark_price(symbol))
                .await
            {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Entry skipped: price unavailable");
                    continue;
                }
            };
            let Some(size) = strategy
                .sizing
                .raw_size(balance, price)
                .and_then(|raw| market.round_order_size(raw))
            else {
                tracing::info!(
                    symbol = %symbol,
                    balance = %balance,
                    price = %price,
                    min_order_size = %market.min_order_size,
                    "Entry skipped: size below market minimum"
                );
                continue;
            };
            slots -= 1;
            opens.push(PlannedOpen {
                action: action.clone(),
                price,
                size,
            });
        }
        opens
    }

    async fn dispatch_close(
        &mut self,
        close: PlannedClose,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let Some(position) = self.book.get(&close.symbol) else {
            return Ok(());
        };
        let client_order_id = ClientOrderId::generate();
        let request = OrderRequest::close(
            client_order_id.clone(),
            close.symbol.clone(),
            position.exchange_market_id().clone(),
            position.side().exit_order_side(),
            position.size(),
        );
        self.book
            .begin_close(&close.symbol, client_order_id, close.source, &close.detail, now)
            .await?;

        report.orders_dispatched += 1;
        match self.gateway.place_order(request).await {
            Ok(fill) => {
                crate::observability::record_order("filled");
                let outcome = self
                    .book
                    .confirm_close(
                        &close.symbol,
                        fill.fill_price,
                        fill.fill_size,
                        close.source,
                        now,
                    )
                    .await?;
                match outcome {
                    CloseOutcome::Closed { .. } => report.closed.push(close.symbol),
                    CloseOutcome::Partial { .. } => report.partially_closed.push(close.symbol),
                }
            }
            Err(e) => {
                crate::observability::record_order(e.kind());
                report.orders_failed += 1;
                if e.is_definite() {
                    self.book
                        .fail_close(&close.symbol, close.source, &e.to_string(), now)
                        .await?;
                } else {
                    tracing::warn!(
                        symbol = %close.symbol,
                        error = %e,
                        "Close outcome unknown, position stays PENDING_CLOSE"
                    );
                }
            }
        }
        Ok(())
    }

    async fn dispatch_open(
        &mut self,
        open: PlannedOpen,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let decision = &open.action.decision;
        let Some(side) = decision.action.opening_side() else {
            return Ok(());
        };
        let symbol = decision.symbol.clone();
        let client_order_id = ClientOrderId::generate();
        let request = OrderRequest::open(
            client_order_id.clone(),
            symbol.clone(),
            open.action.exchange_market_id.clone(),
            side.entry_order_side(),
            open.size,
        );
        let begun = self
            .book
            .begin_open(
                OpenRequest {
                    symbol: symbol.clone(),
                    exchange_market_id: open.action.exchange_market_id.clone(),
                    side,
                    quoted_price: open.price,
                    size: open.size,
                    confidence: decision.confidence,
                    client_order_id,
                },
                TradeSource::Oracle,
                now,
            )
            .await;
        if let Err(BookError::Position(e)) = &begun {
            tracing::warn!(symbol = %symbol, error = %e, "Entry refused by position book");
            return Ok(());
        }
        begun?;

        report.orders_dispatched += 1;
        match self.gateway.place_order(request).await {
            Ok(fill) => {
                crate::observability::record_order("filled");
                self.book
                    .confirm_open(&symbol, fill.fill_price, fill.fill_size, TradeSource::Oracle, now)
                    .await?;
                report.opened.push(symbol);
            }
            Err(e) => {
                crate::observability::record_order(e.kind());
                report.orders_failed += 1;
                if e.is_definite() {
                    self.book
                        .fail_open(&symbol, TradeSource::Oracle, &e.to_string(), now)
                        .await?;
                } else {
                    tracing::warn!(
                        symbol = %symbol,
                        error = %e,
                        "Entry outcome unknown, position stays PENDING_OPEN"
                    );
                }
            }
        }
        Ok(())
    }
}
