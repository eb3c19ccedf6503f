//! Application Use Cases
//!
//! The decision cycle and the strategy it runs under.

mod run_cycle;
mod strategy;

pub use run_cycle::{
    CycleError, CycleOutcome, CycleReport, Orchestrator, OrchestratorConfig, SkipReason,
};
pub use strategy::{SizingConfig, StrategyConfig};
