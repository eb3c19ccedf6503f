//! Bot loop configuration.

use serde::{Deserialize, Serialize};

/// Cycle cadence and read timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSettings {
    /// Seconds between cycle starts.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Timeout for read-only exchange calls (milliseconds).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

const fn default_cycle_interval() -> u64 {
    300
}

const fn default_read_timeout_ms() -> u64 {
    10_000
}
