//! Market cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Market discovery refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCacheSettings {
    /// Age after which the snapshot is refreshed (seconds).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Upper bound on one discovery call (seconds).
    #[serde(default = "default_discover_timeout")]
    pub discover_timeout_secs: u64,
}

impl Default for MarketCacheSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            discover_timeout_secs: default_discover_timeout(),
        }
    }
}

impl MarketCacheSettings {
    /// Refresh interval as a `Duration`.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Discovery timeout as a `Duration`.
    #[must_use]
    pub const fn discover_timeout(&self) -> Duration {
        Duration::from_secs(self.discover_timeout_secs)
    }
}

const fn default_refresh_interval() -> u64 {
    3600
}

const fn default_discover_timeout() -> u64 {
    30
}
