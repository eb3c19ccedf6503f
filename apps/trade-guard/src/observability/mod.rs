//! Observability: structured logging and Prometheus metrics.

mod logging;
mod metrics;

pub use logging::{LoggingConfig, LoggingError, build_filter, init_tracing};
pub use self::metrics::{
    MetricsConfig, MetricsError, init_metrics, record_circuit_breaker_state, record_cycle,
    record_market_refresh, record_oracle_failure, record_oracle_malformed, record_order,
    record_rule_override, record_validator_rejection, set_open_positions,
};
