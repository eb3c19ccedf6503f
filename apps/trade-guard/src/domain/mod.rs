//! Domain Layer
//!
//! Business rules with no I/O. Everything here is deterministic and
//! testable without a runtime.
//!
//! # Bounded Contexts
//!
//! - [`market`]: Markets discovered from an exchange and immutable snapshots
//! - [`decision`]: Oracle proposals, the parsing boundary and the validator
//! - [`position`]: Position aggregate, lifecycle table, trade journal entries
//! - [`exit_rules`]: Hard exit rules and the trend detector

pub mod decision;
pub mod exit_rules;
pub mod market;
pub mod position;
pub mod shared;
