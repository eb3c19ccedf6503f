//! Bot Runner
//!
//! Drives one orchestrator on a fixed interval until cancelled. The strategy
//! arrives through a `watch` channel: a new version takes effect at the start
//! of the next cycle, and never mid-cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::use_cases::{Orchestrator, StrategyConfig};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Cycles that ran to completion.
    pub completed: u64,
    /// Cycles skipped (circuit open).
    pub skipped: u64,
    /// Cycles that failed.
    pub failed: u64,
}

/// Periodic driver for one bot.
#[derive(Debug)]
pub struct BotRunner {
    orchestrator: Orchestrator,
    interval: Duration,
    strategy: watch::Receiver<Arc<StrategyConfig>>,
    shutdown: CancellationToken,
}

impl BotRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new(
        orchestrator: Orchestrator,
        interval: Duration,
        strategy: watch::Receiver<Arc<StrategyConfig>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            interval,
            strategy,
            shutdown,
        }
    }

    /// Run cycles until the token is cancelled. The first cycle starts
    /// immediately. Returns the orchestrator for inspection or reuse.
    pub async fn run(mut self) -> (Orchestrator, RunSummary) {
        let mut summary = RunSummary::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut version = self.strategy.borrow().version;

        tracing::info!(
            exchange = %self.orchestrator.book().exchange(),
            interval_secs = self.interval.as_secs(),
            strategy_version = version,
            "Bot runner started"
        );

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let strategy = Arc::clone(&self.strategy.borrow_and_update());
            if strategy.version != version {
                tracing::info!(
                    from = version,
                    to = strategy.version,
                    name = %strategy.name,
                    "Strategy reloaded"
                );
                version = strategy.version;
            }

            match self.orchestrator.run_cycle(&strategy).await {
                Ok(report) if report.is_skipped() => summary.skipped += 1,
                Ok(_) => summary.completed += 1,
                // Already logged by the orchestrator; the next tick retries.
                Err(_) => summary.failed += 1,
            }
        }

        tracing::info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Bot runner stopped"
        );
        (self.orchestrator, summary)
    }
}
