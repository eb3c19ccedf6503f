//! Decision oracle endpoint configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::oracle::HttpOracleConfig;

/// Oracle endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleSettings {
    /// URL decisions are requested from.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token. Empty means none.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl OracleSettings {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Convert to the HTTP client config.
    #[must_use]
    pub fn to_http_config(&self) -> HttpOracleConfig {
        HttpOracleConfig {
            endpoint: self.endpoint.clone(),
            api_key: (!self.api_key.is_empty()).then(|| self.api_key.clone()),
            timeout: self.timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080/decide".to_string()
}

const fn default_timeout() -> u64 {
    60
}
