//! Strongly-typed identifiers.
//!
//! Exchange-side identifiers (`ExchangeMarketId`, `OrderId`) are opaque and
//! only ever come from the exchange. Internal identifiers are UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Mint a fresh UUID v4 identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(PositionId, "Internal identifier of a tracked position.");
define_id!(
    ExchangeId,
    "Name of the exchange account a bot is attached to (e.g. `hyperliquid-main`)."
);
define_id!(
    ExchangeMarketId,
    "Exchange-assigned market identifier. Only ever learned from market discovery."
);
define_id!(OrderId, "Exchange-assigned order identifier.");
define_id!(
    ClientOrderId,
    "Client-side order identifier, reused across retries so the exchange can deduplicate."
);
define_id!(CycleId, "Identifier of one orchestrator cycle.");
define_id!(TradeRecordId, "Identifier of a journaled trade record.");
