//! Symbol value object.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// Display label of a perpetual market (e.g. "BTC", "SOL").
///
/// Normalized to trimmed uppercase so that oracle output such as `" sol"`
/// compares equal to the exchange-derived `"SOL"`. A symbol is a label, not an
/// identity: the exchange market id is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol, normalizing to uppercase.
    ///
    /// Use [`Symbol::parse`] for untrusted input.
    #[must_use]
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_uppercase())
    }

    /// Parse an untrusted symbol, rejecting empty or whitespace-only input.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let symbol = Self::new(value);
        if symbol.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if symbol.0.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("'{value}' contains whitespace"),
            });
        }
        Ok(symbol)
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("sol", "SOL" ; "lowercase")]
    #[test_case(" eth ", "ETH" ; "padded")]
    #[test_case("kPEPE", "KPEPE" ; "mixed case")]
    fn symbol_normalizes(input: &str, expected: &str) {
        assert_eq!(Symbol::parse(input).unwrap().as_str(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("BT C" ; "inner whitespace")]
    fn symbol_rejects_garbage(input: &str) {
        assert!(Symbol::parse(input).is_err());
    }

    #[test]
    fn deserialize_rejects_empty_symbol() {
        let result: Result<Symbol, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
