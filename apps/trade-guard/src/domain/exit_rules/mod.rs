//! Hard Exit Rules Bounded Context
//!
//! Deterministic exit conditions with final authority over the oracle:
//! take profit, stop loss, maximum hold, minimum-hold suppression and trend
//! reversal, evaluated in that order with the first match winning.
//!
//! Sentiment and macro signals never reach this engine; they only inform the
//! oracle.

mod config;
mod engine;
mod trend;

pub use config::ExitRulesConfig;
pub use engine::{ExitDecision, ExitRule, HardExitRuleEngine, RuleEngineOverride};
pub use trend::{TrendConfig, TrendDetector, TrendSignal};
