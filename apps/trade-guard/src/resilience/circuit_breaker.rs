//! Circuit breaker for exchange calls.
//!
//! Stops hammering an exchange that keeps failing. While open, the
//! orchestrator skips the bot's cycle instead of queuing work.
//!
//! # State Machine
//!
//! ```text
//! CLOSED → OPEN (N consecutive failures)
//! OPEN → HALF_OPEN (cooldown elapsed)
//! HALF_OPEN → CLOSED (trial calls succeed)
//! HALF_OPEN → OPEN (any trial call fails)
//! ```
//!
//! # Configuration
//!
//! - `failure_threshold`: Consecutive failures before opening (default: 5)
//! - `cooldown`: Time to stay open (default: 60s)
//! - `permitted_calls_in_half_open`: Trial calls allowed (default: 1)

use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected.
    Open,
    /// A limited number of trial calls are allowed.
    HalfOpen,
}

impl CircuitBreakerState {
    /// Numeric encoding for gauges (0 closed, 1 half-open, 2 open).
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Duration to stay in `OPEN` state.
    pub cooldown: Duration,
    /// Trial calls permitted in `HALF_OPEN` state.
    pub permitted_calls_in_half_open: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            permitted_calls_in_half_open: 1,
        }
    }
}

/// Consecutive-failure circuit breaker for one exchange account.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Exchange name for logging.
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitBreakerState>,
    /// When the circuit last opened.
    opened_at: RwLock<Option<Instant>>,
    consecutive_failures: AtomicU32,
    half_open_calls: AtomicU32,
    half_open_successes: AtomicU32,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    state_transitions: AtomicU64,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(CircuitBreakerState::Closed),
            opened_at: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            half_open_calls: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
        }
    }

    /// Exchange name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, after applying any elapsed cooldown.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        self.check_cooldown();
        *self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Time left before an open circuit starts probing.
    #[must_use]
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        if self.state() != CircuitBreakerState::Open {
            return None;
        }
        let opened = (*self
            .opened_at
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner))?;
        Some(self.config.cooldown.saturating_sub(opened.elapsed()))
    }

    /// Check if a call is permitted. In `HALF_OPEN` this reserves a trial slot.
    #[must_use]
    pub fn is_call_permitted(&self) -> bool {
        match self.state() {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::Open => false,
            CircuitBreakerState::HalfOpen => {
                self.half_open_calls.fetch_add(1, Ordering::Relaxed)
                    < self.config.permitted_calls_in_half_open
            }
        }
    }

    /// Whether the next cycle should be skipped. Does not reserve a trial slot.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitBreakerState::Open
    }

    /// Record a healthy response (including business rejections).
    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state() == CircuitBreakerState::HalfOpen {
            let successes = self.half_open_successes.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.config.permitted_calls_in_half_open {
                self.transition_to_closed();
            }
        }
    }

    /// Record a transport-level failure.
    pub fn record_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        match self.state() {
            CircuitBreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to_open();
                }
            }
            CircuitBreakerState::HalfOpen => self.transition_to_open(),
            CircuitBreakerState::Open => {
                tracing::warn!(name = %self.name, "Call recorded while circuit is OPEN");
            }
        }
    }

    fn check_cooldown(&self) {
        let state = *self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if state == CircuitBreakerState::Open
            && let Some(opened) = *self
                .opened_at
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
            && opened.elapsed() >= self.config.cooldown
        {
            self.transition_to_half_open();
        }
    }

    fn transition_to_open(&self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = *state;
        if previous == CircuitBreakerState::Open {
            return;
        }
        *state = CircuitBreakerState::Open;
        drop(state);

        *self
            .opened_at
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Instant::now());
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
        crate::observability::record_circuit_breaker_state(&self.name, CircuitBreakerState::Open);

        tracing::warn!(
            name = %self.name,
            from = %previous,
            to = "OPEN",
            consecutive_failures = self.consecutive_failures.load(Ordering::Relaxed),
            cooldown_secs = self.config.cooldown.as_secs(),
            "Circuit breaker opened"
        );
    }

    fn transition_to_half_open(&self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *state != CircuitBreakerState::Open {
            return;
        }
        *state = CircuitBreakerState::HalfOpen;
        drop(state);

        self.half_open_calls.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
        crate::observability::record_circuit_breaker_state(
            &self.name,
            CircuitBreakerState::HalfOpen,
        );

        tracing::info!(name = %self.name, from = "OPEN", to = "HALF_OPEN", "Circuit breaker probing");
    }

    fn transition_to_closed(&self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = *state;
        if previous == CircuitBreakerState::Closed {
            return;
        }
        *state = CircuitBreakerState::Closed;
        drop(state);

        *self
            .opened_at
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
        crate::observability::record_circuit_breaker_state(&self.name, CircuitBreakerState::Closed);

        tracing::info!(name = %self.name, from = %previous, to = "CLOSED", "Circuit breaker closed");
    }

    /// Snapshot of counters.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
        }
    }

    /// Force the circuit open (operator kill switch, tests).
    pub fn force_open(&self) {
        self.transition_to_open();
    }

    /// Force the circuit closed (operator recovery, tests).
    pub fn force_close(&self) {
        self.transition_to_closed();
    }
}

/// Counters for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Exchange name.
    pub name: String,
    /// Current state.
    pub state: CircuitBreakerState,
    /// Current run of failures.
    pub consecutive_failures: u32,
    /// Total recorded calls.
    pub total_calls: u64,
    /// Total recorded failures.
    pub total_failures: u64,
    /// Number of state transitions.
    pub state_transitions: u64,
}
