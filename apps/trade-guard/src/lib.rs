// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! trade-guard - Rust Core Library
//!
//! Validation and position-lifecycle layer between an untrusted decision
//! oracle (an LLM) and a perpetual-futures exchange account.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: deterministic business rules
//!   - `market`: markets discovered from the exchange, immutable snapshots
//!   - `decision`: strict oracle parsing and the decision validator
//!   - `position`: position aggregate, lifecycle table, trade journal records
//!   - `exit_rules`: hard exit rules and the trend detector
//!
//! - **Application**: ports, services and the cycle
//!   - `ports`: `MarketAdapter`, `DecisionOracle`, `PositionStore`
//!   - `services`: `MarketCache`, `PositionBook`, `ExecutionGateway`
//!   - `use_cases`: `Orchestrator` (one cycle) and `StrategyConfig`
//!   - `runner`: `BotRunner`, the periodic loop
//!
//! - **Infrastructure**: adapters
//!   - `exchange`: paper exchange
//!   - `oracle`: HTTP decision oracle
//!   - `persistence`: in-memory and JSON file position stores
//!
//! Cross-cutting: `resilience` (retry, circuit breaker), `observability`
//! (tracing, Prometheus), `config` (YAML settings).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration.
pub mod config;

/// Top-level error for the binary.
pub mod error;

/// Logging and metrics.
pub mod observability;

/// Retry and circuit breaking.
pub mod resilience;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::decision::{Action, Decision, DecisionValidator, RejectionReason};
pub use domain::exit_rules::{ExitDecision, ExitRule, HardExitRuleEngine};
pub use domain::market::{Market, MarketSnapshot, MarketStatus};
pub use domain::position::{Position, PositionSide, PositionState, TradeRecord};
pub use domain::shared::{ExchangeId, Symbol, Timestamp};

// Application re-exports
pub use application::ports::{DecisionOracle, MarketAdapter, PositionStore};
pub use application::services::{ExecutionGateway, MarketCache, PositionBook};
pub use application::use_cases::{CycleReport, Orchestrator, StrategyConfig};
pub use application::{BotRunner, RunSummary};

// Infrastructure re-exports
pub use infrastructure::exchange::PaperExchange;
pub use infrastructure::oracle::HttpDecisionOracle;
pub use infrastructure::persistence::{InMemoryPositionStore, JsonFilePositionStore};

pub use error::BotError;
