//! Market Adapter Port (Driven Port)
//!
//! Uniform interface over one perpetual-futures exchange account. Adapters
//! are thin: no retries, no caching, no rule logic. Those live in the
//! execution gateway and the market cache.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::Market;
use crate::domain::position::{ExchangePosition, OrderSide};
use crate::domain::shared::{ClientOrderId, ExchangeId, ExchangeMarketId, OrderId, Symbol};
use crate::resilience::{RetryClass, Retryable};

/// Market order sent to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Idempotency key, reused across retries of the same order.
    pub client_order_id: ClientOrderId,
    /// Display symbol.
    pub symbol: Symbol,
    /// Exchange market id the symbol resolved to.
    pub exchange_market_id: ExchangeMarketId,
    /// Order side.
    pub side: OrderSide,
    /// Absolute size, already rounded to the market step.
    pub size: Decimal,
    /// Only reduce an existing position.
    pub reduce_only: bool,
}

impl OrderRequest {
    /// Entry order.
    #[must_use]
    pub const fn open(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        exchange_market_id: ExchangeMarketId,
        side: OrderSide,
        size: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            exchange_market_id,
            side,
            size,
            reduce_only: false,
        }
    }

    /// Reduce-only exit order.
    #[must_use]
    pub const fn close(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        exchange_market_id: ExchangeMarketId,
        side: OrderSide,
        size: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            exchange_market_id,
            side,
            size,
            reduce_only: true,
        }
    }
}

/// Definite outcome of an order the exchange processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderResult {
    /// Filled.
    Accepted {
        /// Exchange order id.
        order_id: OrderId,
        /// Average fill price.
        fill_price: Decimal,
        /// Filled size.
        fill_size: Decimal,
    },
    /// Refused by the exchange's business rules.
    Rejected {
        /// Exchange-provided reason.
        reason: String,
    },
}

/// Market adapter error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// Network failure (reset, DNS, 5xx).
    #[error("Exchange connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// The exchange did not answer in time.
    #[error("Exchange call timed out after {elapsed:?}")]
    Timeout {
        /// Time waited.
        elapsed: Duration,
    },

    /// Rate limited.
    #[error("Rate limited by exchange")]
    RateLimited {
        /// Server-suggested delay.
        retry_after: Option<Duration>,
    },

    /// Authentication hiccup (expired nonce, clock skew).
    #[error("Exchange authentication failed: {message}")]
    Authentication {
        /// Error details.
        message: String,
    },

    /// Not enough margin for the order.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Margin the order needs.
        required: Decimal,
        /// Margin free on the account.
        available: Decimal,
    },

    /// Size, price or market refused.
    #[error("Invalid order: {reason}")]
    InvalidOrder {
        /// Rejection reason.
        reason: String,
    },

    /// Unknown error.
    #[error("Exchange error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl AdapterError {
    /// Whether the error belongs to the rejection class.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } | Self::InvalidOrder { .. }
        )
    }
}

impl Retryable for AdapterError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } | Self::Authentication { .. } => {
                RetryClass::Retryable
            }
            Self::RateLimited { retry_after } => RetryClass::RateLimited {
                retry_after: *retry_after,
            },
            Self::InsufficientBalance { .. } | Self::InvalidOrder { .. } | Self::Unknown { .. } => {
                RetryClass::NonRetryable
            }
        }
    }
}

/// Port for one exchange account.
#[async_trait]
pub trait MarketAdapter: Send + Sync {
    /// Exchange account this adapter talks to.
    fn exchange(&self) -> ExchangeId;

    /// Every perpetual market currently listed, with status and minimum size.
    async fn discover_markets(&self) -> Result<Vec<Market>, AdapterError>;

    /// Open positions as the exchange sees them.
    async fn get_positions(&self) -> Result<Vec<ExchangePosition>, AdapterError>;

    /// Free collateral in quote currency.
    async fn get_account_balance(&self) -> Result<Decimal, AdapterError>;

    /// Current mark price.
    async fn get_mark_price(&self, symbol: &Symbol) -> Result<Decimal, AdapterError>;

    /// Up to `limit` recent closes, oldest first.
    async fn get_recent_closes(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<Vec<Decimal>, AdapterError>;

    /// Place a market order.
    async fn place_order(&self, request: OrderRequest) -> Result<OrderResult, AdapterError>;

    /// Cancel an order. `Ok(false)` when there was nothing to cancel.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<bool, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(AdapterError::Connection { message: "reset".into() }, true ; "connection")]
    #[test_case(AdapterError::Timeout { elapsed: Duration::from_secs(5) }, true ; "timeout")]
    #[test_case(AdapterError::RateLimited { retry_after: None }, true ; "rate limited")]
    #[test_case(AdapterError::Authentication { message: "nonce".into() }, true ; "auth hiccup")]
    #[test_case(AdapterError::InvalidOrder { reason: "size".into() }, false ; "invalid order")]
    #[test_case(AdapterError::Unknown { message: "?".into() }, false ; "unknown")]
    fn retryability(error: AdapterError, expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[test]
    fn insufficient_balance_is_a_rejection() {
        let error = AdapterError::InsufficientBalance {
            required: Decimal::ONE_HUNDRED,
            available: Decimal::TEN,
        };
        assert!(error.is_rejection());
        assert!(!error.is_retryable());
    }

    #[test]
    fn close_orders_are_reduce_only() {
        let request = OrderRequest::close(
            ClientOrderId::new("cl-1"),
            Symbol::new("BTC"),
            ExchangeMarketId::new("1"),
            OrderSide::Sell,
            Decimal::ONE,
        );
        assert!(request.reduce_only);
    }
}
