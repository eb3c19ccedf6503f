//! Observability configuration: logging and Prometheus export.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::observability::{LoggingConfig, MetricsConfig};

/// Observability settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Level for this crate's log targets.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// One JSON object per log line.
    #[serde(default)]
    pub json_logs: bool,
    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics: MetricsSettings::default(),
        }
    }
}

impl ObservabilitySettings {
    /// Logging setup for `init_tracing`.
    #[must_use]
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json: self.json_logs,
        }
    }

    /// Exporter setup, when enabled.
    #[must_use]
    pub fn to_metrics_config(&self) -> Option<MetricsConfig> {
        self.metrics.enabled.then_some(MetricsConfig {
            listen_addr: self.metrics.listen_addr,
        })
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Start the `/metrics` listener.
    #[serde(default)]
    pub enabled: bool,
    /// Listener address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}
