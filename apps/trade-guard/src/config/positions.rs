//! Position lifecycle configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pending timeouts and reconciliation cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSettings {
    /// Age after which a pending open or close is resolved (seconds).
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout_secs: u64,
    /// Seconds between reconciliations against exchange positions.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl Default for PositionSettings {
    fn default() -> Self {
        Self {
            pending_timeout_secs: default_pending_timeout(),
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

impl PositionSettings {
    /// Pending timeout as a `Duration`.
    #[must_use]
    pub const fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }
}

const fn default_pending_timeout() -> u64 {
    120
}

const fn default_reconcile_interval() -> u64 {
    300
}
