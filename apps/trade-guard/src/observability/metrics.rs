//! Prometheus metrics for the bot.
//!
//! Recording functions are free functions over the `metrics` facade, so
//! callers never hold a handle. Without an installed recorder they are
//! no-ops.
//!
//! # Example
//!
//! ```ignore
//! use trade_guard::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! trade_guard::observability::record_cycle("completed");
//! ```

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::domain::shared::ExchangeId;
use crate::resilience::CircuitBreakerState;

/// Metrics exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Address of the `/metrics` HTTP listener.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to install the exporter (address in use, recorder already set).
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Start the Prometheus exporter and install it as the global recorder.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "Prometheus metrics exporter started");
    Ok(())
}

// ============================================================================
// Cycle Metrics
// ============================================================================

/// Count a finished cycle by outcome (`completed`, `skipped`, `failed`).
pub fn record_cycle(outcome: &str) {
    counter!("trade_guard_cycles_total", "outcome" => outcome.to_string()).increment(1);
}

/// Count oracle entries rejected at the parsing boundary.
pub fn record_oracle_malformed(count: usize) {
    if count > 0 {
        counter!("trade_guard_oracle_malformed_total").increment(count as u64);
    }
}

/// Count an oracle call that failed or timed out.
pub fn record_oracle_failure() {
    counter!("trade_guard_oracle_failures_total").increment(1);
}

/// Count a validator rejection by reason.
pub fn record_validator_rejection(reason: &str) {
    counter!(
        "trade_guard_validator_rejections_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Count a hard-rule override by rule.
pub fn record_rule_override(rule: &str) {
    counter!("trade_guard_rule_overrides_total", "rule" => rule.to_string()).increment(1);
}

// ============================================================================
// Execution Metrics
// ============================================================================

/// Count a dispatched order by outcome (`filled` or a gateway error kind).
pub fn record_order(outcome: &str) {
    counter!("trade_guard_orders_total", "outcome" => outcome.to_string()).increment(1);
}

/// Set the active position gauge for an exchange account.
pub fn set_open_positions(exchange: &ExchangeId, count: usize) {
    gauge!(
        "trade_guard_open_positions",
        "exchange" => exchange.as_str().to_string()
    )
    .set(count as f64);
}

/// Set the breaker state gauge (0 closed, 1 half-open, 2 open).
pub fn record_circuit_breaker_state(name: &str, state: CircuitBreakerState) {
    gauge!(
        "trade_guard_circuit_breaker_state",
        "breaker" => name.to_string()
    )
    .set(state.as_gauge());
}

// ============================================================================
// Market Data Metrics
// ============================================================================

/// Count a market discovery refresh by result (`success`, `failure`).
pub fn record_market_refresh(result: &str) {
    counter!(
        "trade_guard_market_refreshes_total",
        "result" => result.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_cycle("completed");
        record_order("filled");
        set_open_positions(&ExchangeId::new("paper"), 2);
        record_circuit_breaker_state("paper", CircuitBreakerState::Open);
    }

    #[test]
    fn metrics_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_validator_rejection("symbol_not_found");
            record_validator_rejection("symbol_not_found");
            record_rule_override("stop_loss");
            record_oracle_malformed(0);
            set_open_positions(&ExchangeId::new("paper"), 3);
        });

        let rendered = handle.render();
        assert!(rendered.contains(
            "trade_guard_validator_rejections_total{reason=\"symbol_not_found\"} 2"
        ));
        assert!(rendered.contains("trade_guard_rule_overrides_total{rule=\"stop_loss\"} 1"));
        assert!(rendered.contains("trade_guard_open_positions{exchange=\"paper\"} 3"));
        assert!(!rendered.contains("trade_guard_oracle_malformed_total"));
    }
}
