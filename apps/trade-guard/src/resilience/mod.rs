//! Resilience patterns for exchange calls.
//!
//! A consecutive-failure circuit breaker and the single retry policy shared
//! by every exchange-mutating call.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerState,
};
pub use retry::{ExponentialBackoff, RetryClass, RetryPolicy, Retryable};
