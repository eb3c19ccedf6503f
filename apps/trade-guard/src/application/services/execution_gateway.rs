//! Execution Gateway
//!
//! The only path from the bot to exchange-mutating calls. Wraps the market
//! adapter with a per-call timeout, the shared retry policy and a circuit
//! breaker. Transient errors never escape this module as themselves: callers
//! see a fill, a definite rejection, an open circuit or exhausted retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{AdapterError, MarketAdapter, OrderRequest, OrderResult};
use crate::domain::shared::{ExchangeId, OrderId};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, ExponentialBackoff, RetryPolicy, Retryable,
};

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Timeout applied to every single adapter call.
    pub call_timeout: Duration,
    /// Retry policy for transient errors.
    pub retry: RetryPolicy,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// A filled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFill {
    /// Exchange order id.
    pub order_id: OrderId,
    /// Average fill price.
    pub fill_price: Decimal,
    /// Filled size.
    pub fill_size: Decimal,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Gateway error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The breaker refused the call.
    #[error("Circuit open for {exchange} (after {attempts} attempts)")]
    CircuitOpen {
        /// Exchange account.
        exchange: ExchangeId,
        /// Attempts already sent before the breaker refused.
        attempts: u32,
    },

    /// The exchange definitely refused the order.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Exchange-provided reason.
        reason: String,
    },

    /// Transient failures on every allowed attempt.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts sent.
        attempts: u32,
        /// Final transient error.
        last_error: AdapterError,
    },

    /// Non-retryable error of unknown effect.
    #[error("Exchange call failed: {0}")]
    Failed(AdapterError),
}

impl GatewayError {
    /// Whether the exchange certainly did not act on the request.
    ///
    /// Callers revert pending state only on definite outcomes; anything else
    /// is resolved by reconciliation or the pending timeout.
    #[must_use]
    pub const fn is_definite(&self) -> bool {
        match self {
            Self::OrderRejected { .. } => true,
            Self::CircuitOpen { attempts, .. } => *attempts == 0,
            Self::RetriesExhausted { .. } | Self::Failed(_) => false,
        }
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::OrderRejected { .. } => "rejected",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Failed(_) => "failed",
        }
    }
}

/// Resilient order dispatch for one exchange account.
pub struct ExecutionGateway {
    adapter: Arc<dyn MarketAdapter>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl std::fmt::Debug for ExecutionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGateway")
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl ExecutionGateway {
    /// Create a gateway with its own breaker.
    #[must_use]
    pub fn new(adapter: Arc<dyn MarketAdapter>, config: GatewayConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            adapter.exchange().as_str(),
            config.circuit_breaker,
        ));
        Self {
            adapter,
            breaker,
            retry: config.retry,
            call_timeout: config.call_timeout,
        }
    }

    /// The breaker guarding this exchange account.
    #[must_use]
    pub const fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Whether new work should be skipped.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Place a market order. Every attempt carries the same client order id.
    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderFill, GatewayError> {
        let client_order_id = request.client_order_id.clone();
        let (result, attempts) = self
            .execute("place_order", || self.adapter.place_order(request.clone()))
            .await?;

        match result {
            OrderResult::Accepted {
                order_id,
                fill_price,
                fill_size,
            } => Ok(OrderFill {
                order_id,
                fill_price,
                fill_size,
                attempts,
            }),
            OrderResult::Rejected { reason } => {
                tracing::warn!(
                    client_order_id = %client_order_id,
                    symbol = %request.symbol,
                    reason = %reason,
                    "Order rejected by exchange"
                );
                Err(GatewayError::OrderRejected { reason })
            }
        }
    }

    /// Cancel an order. `Ok(false)` when nothing was open.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<bool, GatewayError> {
        self.execute("cancel_order", || self.adapter.cancel_order(order_id))
            .await
            .map(|(cancelled, _)| cancelled)
    }

    /// Run `call` under timeout, retry and breaker. Returns the value and the
    /// attempts used.
    async fn execute<T, F, Fut>(&self, operation: &str, call: F) -> Result<(T, u32), GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let mut backoff = ExponentialBackoff::new(&self.retry);
        let mut attempts = 0u32;

        loop {
            if !self.breaker.is_call_permitted() {
                return Err(GatewayError::CircuitOpen {
                    exchange: self.adapter.exchange(),
                    attempts,
                });
            }
            attempts += 1;

            let error = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    return Ok((value, attempts));
                }
                Ok(Err(e)) => e,
                Err(_) => AdapterError::Timeout {
                    elapsed: self.call_timeout,
                },
            };

            if error.is_rejection() {
                self.breaker.record_success();
                return Err(GatewayError::OrderRejected {
                    reason: error.to_string(),
                });
            }
            self.breaker.record_failure();

            if !error.is_retryable() {
                return Err(GatewayError::Failed(error));
            }
            let Some(delay) = self.retry.delay_for(error.retry_class(), &mut backoff) else {
                tracing::warn!(
                    operation,
                    attempts,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(GatewayError::RetriesExhausted {
                    attempts,
                    last_error: error,
                });
            };
            tracing::warn!(
                operation,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Transient exchange error, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Market;
    use crate::domain::position::{ExchangePosition, OrderSide};
    use crate::domain::shared::{ClientOrderId, ExchangeMarketId, Symbol};
    use crate::resilience::CircuitBreakerState;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Step {
        Fill,
        Reject,
        Fail(AdapterError),
        Hang,
    }

    struct ScriptedExchange {
        script: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<ClientOrderId>>,
        cancels: Mutex<Vec<OrderId>>,
    }

    impl ScriptedExchange {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                seen: Mutex::new(Vec::new()),
                cancels: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MarketAdapter for ScriptedExchange {
        fn exchange(&self) -> ExchangeId {
            ExchangeId::new("scripted")
        }

        async fn discover_markets(&self) -> Result<Vec<Market>, AdapterError> {
            Ok(Vec::new())
        }

        async fn get_positions(&self) -> Result<Vec<ExchangePosition>, AdapterError> {
            Ok(Vec::new())
        }

        async fn get_account_balance(&self) -> Result<Decimal, AdapterError> {
            Ok(Decimal::ZERO)
        }

        async fn get_mark_price(&self, _symbol: &Symbol) -> Result<Decimal, AdapterError> {
            Ok(Decimal::ONE)
        }

        async fn get_recent_closes(
            &self,
            _symbol: &Symbol,
            _limit: usize,
        ) -> Result<Vec<Decimal>, AdapterError> {
            Ok(Vec::new())
        }

        async fn place_order(&self, request: OrderRequest) -> Result<OrderResult, AdapterError> {
            self.seen.lock().unwrap().push(request.client_order_id);
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Fill);
            match step {
                Step::Fill => Ok(OrderResult::Accepted {
                    order_id: OrderId::new("ex-1"),
                    fill_price: dec!(100),
                    fill_size: request.size,
                }),
                Step::Reject => Ok(OrderResult::Rejected {
                    reason: "reduce only violated".to_string(),
                }),
                Step::Fail(e) => Err(e),
                Step::Hang => std::future::pending().await,
            }
        }

        async fn cancel_order(&self, order_id: &OrderId) -> Result<bool, AdapterError> {
            self.cancels.lock().unwrap().push(order_id.clone());
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Fill);
            match step {
                Step::Fill => Ok(true),
                Step::Reject => Ok(false),
                Step::Fail(e) => Err(e),
                Step::Hang => std::future::pending().await,
            }
        }
    }

    fn config(threshold: u32) -> GatewayConfig {
        GatewayConfig {
            call_timeout: Duration::from_secs(2),
            retry: RetryPolicy {
                jitter_factor: 0.0,
                ..RetryPolicy::default()
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(60),
                permitted_calls_in_half_open: 1,
            },
        }
    }

    fn request() -> OrderRequest {
        OrderRequest::open(
            ClientOrderId::new("cl-42"),
            Symbol::new("SOL"),
            ExchangeMarketId::new("5"),
            OrderSide::Buy,
            dec!(1.5),
        )
    }

    fn connection() -> AdapterError {
        AdapterError::Connection {
            message: "reset".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_with_same_client_order_id() {
        let exchange = ScriptedExchange::new(vec![Step::Fail(connection()), Step::Fill]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(5));

        let fill = gateway.place_order(request()).await.unwrap();

        assert_eq!(fill.attempts, 2);
        assert_eq!(fill.fill_size, dec!(1.5));
        let seen = exchange.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![ClientOrderId::new("cl-42"); 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn business_rejection_is_not_retried_and_keeps_breaker_closed() {
        let exchange = ScriptedExchange::new(vec![Step::Reject]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(1));

        let err = gateway.place_order(request()).await.unwrap_err();

        assert!(matches!(err, GatewayError::OrderRejected { .. }));
        assert!(err.is_definite());
        assert_eq!(exchange.calls(), 1);
        assert_eq!(gateway.breaker().state(), CircuitBreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn insufficient_balance_is_a_definite_rejection() {
        let exchange = ScriptedExchange::new(vec![Step::Fail(AdapterError::InsufficientBalance {
            required: dec!(500),
            available: dec!(20),
        })]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(3));

        let err = gateway.place_order(request()).await.unwrap_err();

        assert!(matches!(err, GatewayError::OrderRejected { .. }));
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_ambiguous() {
        let exchange = ScriptedExchange::new(vec![
            Step::Fail(connection()),
            Step::Fail(connection()),
            Step::Fail(connection()),
        ]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(10));

        let err = gateway.place_order(request()).await.unwrap_err();

        let GatewayError::RetriesExhausted { attempts, .. } = &err else {
            panic!("expected RetriesExhausted, got {err:?}");
        };
        assert_eq!(*attempts, 3);
        assert!(!err.is_definite());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out_and_counts_as_transient() {
        let exchange = ScriptedExchange::new(vec![Step::Hang, Step::Fill]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(5));

        let fill = gateway.place_order(request()).await.unwrap();

        assert_eq!(fill.attempts, 2);
        assert_eq!(gateway.breaker().metrics().total_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_opens_and_fails_fast() {
        let exchange = ScriptedExchange::new(vec![Step::Fail(connection()), Step::Fail(connection())]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(2));

        let err = gateway.place_order(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen { attempts: 2, .. }));
        assert!(!err.is_definite());
        assert!(gateway.is_circuit_open());

        let err = gateway.place_order(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen { attempts: 0, .. }));
        assert!(err.is_definite());
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_retries_transient_errors_for_the_same_order() {
        let exchange = ScriptedExchange::new(vec![
            Step::Fail(connection()),
            Step::Hang,
            Step::Fill,
        ]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(5));

        let cancelled = gateway.cancel_order(&OrderId::new("ex-9")).await.unwrap();

        assert!(cancelled);
        let cancels = exchange.cancels.lock().unwrap().clone();
        assert_eq!(cancels, vec![OrderId::new("ex-9"); 3]);
        assert_eq!(gateway.breaker().metrics().total_failures, 2);
        assert_eq!(gateway.breaker().state(), CircuitBreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_of_unknown_order_is_not_an_error() {
        let exchange = ScriptedExchange::new(vec![Step::Reject]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(1));

        let cancelled = gateway.cancel_order(&OrderId::new("gone")).await.unwrap();

        assert!(!cancelled);
        assert_eq!(exchange.cancels.lock().unwrap().len(), 1);
        assert!(!gateway.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_failures_open_breaker_which_then_refuses() {
        let exchange = ScriptedExchange::new(vec![Step::Fail(connection()), Step::Fail(connection())]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(2));

        let err = gateway.cancel_order(&OrderId::new("ex-9")).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen { attempts: 2, .. }));
        assert!(gateway.is_circuit_open());

        let err = gateway.cancel_order(&OrderId::new("ex-9")).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen { attempts: 0, .. }));
        assert_eq!(exchange.cancels.lock().unwrap().len(), 2);
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_gives_up_when_retries_run_out() {
        let exchange = ScriptedExchange::new(vec![
            Step::Fail(connection()),
            Step::Fail(connection()),
            Step::Fail(connection()),
        ]);
        let gateway = ExecutionGateway::new(exchange.clone(), config(10));

        let err = gateway.cancel_order(&OrderId::new("ex-9")).await.unwrap_err();

        assert!(matches!(err, GatewayError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(exchange.cancels.lock().unwrap().len(), 3);
    }
}
