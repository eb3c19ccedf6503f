//! trade-guard Binary
//!
//! Runs one bot against one exchange account until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trade-guard
//! ```
//!
//! # Environment Variables
//!
//! - `TRADE_GUARD_CONFIG`: Config file path (default: config.yaml)
//! - `RUST_LOG`: Base log filter; `observability.log_level` is added on top
//!
//! Any `${VAR}` referenced from the config file (for example the oracle API
//! key) is read from the environment or a `.env` file.
//!
//! # Signals
//!
//! - `SIGINT` / `SIGTERM`: finish the current cycle and exit
//! - `SIGHUP`: re-read the `strategy` section; applies from the next cycle

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trade_guard::application::ports::{DecisionOracle, MarketAdapter, PositionStore};
use trade_guard::application::services::{ExecutionGateway, MarketCache, PositionBook};
use trade_guard::application::use_cases::{Orchestrator, StrategyConfig};
use trade_guard::application::BotRunner;
use trade_guard::config::{Config, DEFAULT_CONFIG_PATH, PersistenceBackend, load_config};
use trade_guard::domain::shared::Timestamp;
use trade_guard::error::BotError;
use trade_guard::infrastructure::exchange::PaperExchange;
use trade_guard::infrastructure::oracle::HttpDecisionOracle;
use trade_guard::infrastructure::persistence::{InMemoryPositionStore, JsonFilePositionStore};
use trade_guard::observability::{init_metrics, init_tracing};

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable naming the config file.
const CONFIG_PATH_ENV: &str = "TRADE_GUARD_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Config errors happen before the subscriber exists.
            eprintln!("trade-guard: {e}");
            tracing::error!(error = %e, "trade-guard stopped");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), BotError> {
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Some(&config_path))?;

    init_tracing(&config.observability.to_logging_config())?;
    if let Some(metrics) = config.observability.to_metrics_config() {
        init_metrics(&metrics)?;
    }
    log_config(&config, &config_path);

    let paper = Arc::new(PaperExchange::new(config.exchange.to_paper_config()));
    let adapter: Arc<dyn MarketAdapter> = Arc::clone(&paper) as Arc<dyn MarketAdapter>;
    let oracle: Arc<dyn DecisionOracle> =
        Arc::new(HttpDecisionOracle::new(config.oracle.to_http_config())?);

    let book = PositionBook::restore(
        adapter.exchange(),
        create_store(&config),
        config.positions.pending_timeout(),
    )
    .await?;
    tracing::info!(
        exchange = %book.exchange(),
        restored = book.len(),
        "Position book restored"
    );

    let mut orchestrator = Orchestrator::new(
        Arc::clone(&adapter),
        oracle,
        MarketCache::with_discover_timeout(
            Arc::clone(&adapter),
            config.market_cache.refresh_interval(),
            config.market_cache.discover_timeout(),
        ),
        ExecutionGateway::new(Arc::clone(&adapter), config.gateway.to_gateway_config()),
        book,
        config.to_orchestrator_config(),
    );

    // The first cycle reconciles again if this fails.
    match orchestrator.reconcile_now(Timestamp::now()).await {
        Ok(summary) => tracing::info!(
            adopted = summary.adopted.len(),
            adjusted = summary.adjusted.len(),
            confirmed = summary.confirmed.len(),
            closed_externally = summary.closed_externally.len(),
            relabelled = summary.relabelled.len(),
            abandoned = summary.abandoned.len(),
            "Startup reconciliation complete"
        ),
        Err(e) => tracing::warn!(error = %e, "Startup reconciliation failed, deferring to first cycle"),
    }

    let shutdown = CancellationToken::new();
    let (strategy_tx, strategy_rx) = watch::channel(Arc::new(config.strategy.to_strategy_config()));

    let ticker = spawn_paper_ticker(
        Arc::clone(&paper),
        Duration::from_millis(config.exchange.tick_interval_ms),
        shutdown.clone(),
    );
    let reloader = spawn_strategy_reloader(config_path, strategy_tx, shutdown.clone());
    let runner = tokio::spawn(
        BotRunner::new(
            orchestrator,
            config.cycle_interval(),
            strategy_rx,
            shutdown.clone(),
        )
        .run(),
    );

    shutdown_signal(shutdown).await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, runner).await {
        Ok(Ok((orchestrator, summary))) => tracing::info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            open_positions = orchestrator.book().len(),
            "Bot stopped"
        ),
        Ok(Err(e)) => tracing::error!(error = %e, "Bot runner task failed"),
        Err(_) => tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out waiting for the current cycle"
        ),
    }
    let _ = tokio::join!(ticker, reloader);

    Ok(())
}

fn create_store(config: &Config) -> Arc<dyn PositionStore> {
    match config.persistence.backend {
        PersistenceBackend::Memory => {
            tracing::warn!("Using in-memory persistence; positions are lost on exit");
            Arc::new(InMemoryPositionStore::new())
        }
        PersistenceBackend::JsonFile => {
            Arc::new(JsonFilePositionStore::new(&config.persistence.data_dir))
        }
    }
}

fn log_config(config: &Config, path: &str) {
    tracing::info!(
        config_path = %path,
        exchange = %config.exchange.name,
        markets = config.exchange.markets.len(),
        oracle = %config.oracle.endpoint,
        cycle_interval_secs = config.bot.cycle_interval_secs,
        persistence = ?config.persistence.backend,
        strategy = %config.strategy.name,
        strategy_version = config.strategy.version,
        "Starting trade-guard"
    );
}

/// Random-walk paper prices until shutdown.
fn spawn_paper_ticker(
    paper: Arc<PaperExchange>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => paper.tick(),
            }
        }
    })
}

/// Re-read the strategy section on SIGHUP.
fn spawn_strategy_reloader(
    config_path: String,
    strategy_tx: watch::Sender<Arc<StrategyConfig>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "SIGHUP handler unavailable, strategy reload disabled");
                    return;
                }
            };
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = hangup.recv() => reload_strategy(&config_path, &strategy_tx),
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (config_path, strategy_tx);
            shutdown.cancelled().await;
        }
    })
}

fn reload_strategy(config_path: &str, strategy_tx: &watch::Sender<Arc<StrategyConfig>>) {
    let next = match load_config(Some(config_path)) {
        Ok(config) => config.strategy.to_strategy_config(),
        Err(e) => {
            tracing::error!(error = %e, "Strategy reload failed, keeping current strategy");
            return;
        }
    };

    let current_version = strategy_tx.borrow().version;
    if **strategy_tx.borrow() == next {
        tracing::info!(version = current_version, "Strategy unchanged");
        return;
    }
    if next.version <= current_version {
        tracing::warn!(
            current = current_version,
            proposed = next.version,
            "Strategy changed without a version bump, ignoring"
        );
        return;
    }

    tracing::info!(from = current_version, to = next.version, "Strategy queued for next cycle");
    strategy_tx.send_replace(Arc::new(next));
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGTERM or SIGINT, then cancel the token.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; a bot that cannot be
/// stopped cleanly must not start trading.
#[allow(clippy::expect_used)]
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
