//! Application Layer
//!
//! Orchestrates the domain through ports:
//!
//! - **Ports**: exchange account, decision oracle, position store
//! - **Services**: market cache, position book, execution gateway
//! - **Use Cases**: the decision cycle
//! - **Runner**: the periodic driver of one bot

pub mod ports;
pub mod runner;
pub mod services;
pub mod use_cases;

pub use runner::{BotRunner, RunSummary};
