//! Decision Bounded Context
//!
//! Oracle proposals as a tagged type, the parsing boundary that turns raw
//! oracle JSON into proposals, and the validator that cross-checks proposals
//! against the market snapshot and the position book.

mod action;
mod parsing;
mod validation;

pub use action::{Action, Decision};
pub use parsing::{DecisionParseError, MalformedDecision, ParsedDecisions, parse_decisions};
pub use validation::{
    DecisionValidator, RejectionReason, ValidatedAction, ValidationRejection, ValidationReport,
};
