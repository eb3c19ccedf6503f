//! Decision types proposed by the oracle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::position::PositionSide;
use crate::domain::shared::Symbol;

/// Trading action proposed for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Open a long position.
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    /// Open a short position.
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
    /// Close the open position.
    #[serde(alias = "close", alias = "Close")]
    Close,
    /// Do nothing.
    #[serde(alias = "hold", alias = "Hold")]
    Hold,
}

impl Action {
    /// Side of the position an opening action creates.
    #[must_use]
    pub const fn opening_side(self) -> Option<PositionSide> {
        match self {
            Self::Buy => Some(PositionSide::Long),
            Self::Sell => Some(PositionSide::Short),
            Self::Close | Self::Hold => None,
        }
    }

    /// Whether the action opens a position.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Close => write!(f, "CLOSE"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// One oracle proposal. All fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Symbol the proposal refers to. Not yet checked against any market set.
    pub symbol: Symbol,
    /// Proposed action.
    pub action: Action,
    /// Self-reported confidence, expected in `[0, 1]`.
    pub confidence: f64,
    /// Free-text justification.
    pub rationale: String,
}

impl Decision {
    /// Convenience constructor.
    #[must_use]
    pub fn new(symbol: impl AsRef<str>, action: Action, confidence: f64) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            action,
            confidence,
            rationale: String::new(),
        }
    }

    /// Attach a rationale.
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_side_maps_buy_and_sell() {
        assert_eq!(Action::Buy.opening_side(), Some(PositionSide::Long));
        assert_eq!(Action::Sell.opening_side(), Some(PositionSide::Short));
        assert_eq!(Action::Close.opening_side(), None);
        assert!(!Action::Hold.is_open());
    }

    #[test]
    fn action_accepts_lowercase_alias() {
        let action: Action = serde_json::from_str("\"close\"").unwrap();
        assert_eq!(action, Action::Close);
    }

    #[test]
    fn action_rejects_unknown_verb() {
        assert!(serde_json::from_str::<Action>("\"LIQUIDATE\"").is_err());
    }
}
