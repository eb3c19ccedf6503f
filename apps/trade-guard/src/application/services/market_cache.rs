//! Market Cache
//!
//! Read-through cache of the exchange's market set with
//! stale-while-revalidate semantics:
//!
//! - miss or forced refresh: discover synchronously and replace the snapshot
//! - within the interval: serve the cached `Arc` untouched
//! - past the interval: serve the cached `Arc` and start one background
//!   refresh (never more than one in flight)
//! - refresh failure: keep serving last-known-good; fail only when no
//!   refresh ever succeeded
//! - a discovery call that outlives the timeout counts as a failure

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::{AdapterError, MarketAdapter};
use crate::domain::market::MarketSnapshot;
use crate::domain::shared::Timestamp;

/// Default upper bound on one discovery call.
pub const DEFAULT_DISCOVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Market cache error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Discovery has never succeeded, so there is nothing to serve.
    #[error("Market discovery has never succeeded: {source}")]
    NeverRefreshed {
        /// Latest discovery failure.
        source: AdapterError,
    },
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<MarketSnapshot>>,
    refreshed_at: Option<Instant>,
    invalidated: bool,
    last_error: Option<AdapterError>,
}

struct Inner {
    adapter: Arc<dyn MarketAdapter>,
    refresh_interval: Duration,
    discover_timeout: Duration,
    state: RwLock<CacheState>,
    refresh_in_flight: AtomicBool,
}

impl Inner {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run one discovery and swap the snapshot on success.
    async fn refresh(&self) -> Result<Arc<MarketSnapshot>, AdapterError> {
        let exchange = self.adapter.exchange();
        let discovered = tokio::time::timeout(self.discover_timeout, self.adapter.discover_markets())
            .await
            .unwrap_or(Err(AdapterError::Timeout {
                elapsed: self.discover_timeout,
            }));
        match discovered {
            Ok(markets) => {
                let snapshot = Arc::new(MarketSnapshot::new(
                    exchange.clone(),
                    Timestamp::now(),
                    markets,
                ));
                let mut state = self.write();
                state.snapshot = Some(Arc::clone(&snapshot));
                state.refreshed_at = Some(Instant::now());
                state.invalidated = false;
                state.last_error = None;
                drop(state);

                crate::observability::record_market_refresh("success");
                tracing::debug!(
                    exchange = %exchange,
                    markets = snapshot.len(),
                    "Market snapshot refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.write().last_error = Some(e.clone());
                crate::observability::record_market_refresh("failure");
                tracing::warn!(
                    exchange = %exchange,
                    error = %e,
                    "Market refresh failed, keeping last-known-good snapshot"
                );
                Err(e)
            }
        }
    }
}

/// Cached market discovery for one exchange account.
#[derive(Clone)]
pub struct MarketCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MarketCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketCache")
            .field("exchange", &self.inner.adapter.exchange())
            .field("refresh_interval", &self.inner.refresh_interval)
            .field("discover_timeout", &self.inner.discover_timeout)
            .finish_non_exhaustive()
    }
}

impl MarketCache {
    /// Create an empty cache. Nothing is fetched until the first read.
    #[must_use]
    pub fn new(adapter: Arc<dyn MarketAdapter>, refresh_interval: Duration) -> Self {
        Self::with_discover_timeout(adapter, refresh_interval, DEFAULT_DISCOVER_TIMEOUT)
    }

    /// Create an empty cache whose discovery calls give up after `discover_timeout`.
    #[must_use]
    pub fn with_discover_timeout(
        adapter: Arc<dyn MarketAdapter>,
        refresh_interval: Duration,
        discover_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter,
                refresh_interval,
                discover_timeout,
                state: RwLock::new(CacheState::default()),
                refresh_in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Return the current market set.
    ///
    /// # Errors
    ///
    /// [`CacheError::NeverRefreshed`] when discovery fails and no snapshot
    /// was ever obtained.
    pub async fn get_markets(&self, force_refresh: bool) -> Result<Arc<MarketSnapshot>, CacheError> {
        let (cached, due) = {
            let state = self.inner.read();
            let due = state.invalidated
                || state
                    .refreshed_at
                    .is_none_or(|at| at.elapsed() >= self.inner.refresh_interval);
            (state.snapshot.clone(), due)
        };

        match cached {
            Some(snapshot) if !force_refresh => {
                if due {
                    self.spawn_background_refresh();
                }
                Ok(snapshot)
            }
            previous => match self.inner.refresh().await {
                Ok(snapshot) => Ok(snapshot),
                Err(source) => previous.ok_or(CacheError::NeverRefreshed { source }),
            },
        }
    }

    /// Mark the snapshot stale; the next read refreshes in the background.
    pub fn invalidate(&self) {
        self.inner.write().invalidated = true;
    }

    /// Latest refresh failure, cleared by the next success.
    #[must_use]
    pub fn last_refresh_error(&self) -> Option<AdapterError> {
        self.inner.read().last_error.clone()
    }

    /// Whether a background refresh is running.
    #[must_use]
    pub fn refresh_in_flight(&self) -> bool {
        self.inner.refresh_in_flight.load(Ordering::Acquire)
    }

    fn spawn_background_refresh(&self) {
        if self
            .inner
            .refresh_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // Failure is already logged and recorded by `refresh`.
            let _ = inner.refresh().await;
            inner.refresh_in_flight.store(false, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{OrderRequest, OrderResult};
    use crate::domain::market::{Market, MarketStatus};
    use crate::domain::position::ExchangePosition;
    use crate::domain::shared::{ExchangeId, ExchangeMarketId, OrderId, Symbol};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct DiscoveryStub {
        calls: AtomicUsize,
        failing: AtomicBool,
        hanging: AtomicBool,
        symbols: Mutex<Vec<&'static str>>,
    }

    impl DiscoveryStub {
        fn new(symbols: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                hanging: AtomicBool::new(false),
                symbols: Mutex::new(symbols),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketAdapter for DiscoveryStub {
        fn exchange(&self) -> ExchangeId {
            ExchangeId::new("stub")
        }

        async fn discover_markets(&self) -> Result<Vec<Market>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hanging.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(AdapterError::Connection {
                    message: "down".to_string(),
                });
            }
            let symbols = self.symbols.lock().unwrap().clone();
            Ok(symbols
                .into_iter()
                .enumerate()
                .map(|(i, s)| Market {
                    symbol: Symbol::new(s),
                    exchange_market_id: ExchangeMarketId::new(i.to_string()),
                    status: MarketStatus::Active,
                    min_order_size: Decimal::new(1, 2),
                    last_refreshed_at: Timestamp::now(),
                })
                .collect())
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

        async fn place_order(&self, _request: OrderRequest) -> Result<OrderResult, AdapterError> {
            unreachable!("cache never places orders")
        }

        async fn cancel_order(&self, _order_id: &OrderId) -> Result<bool, AdapterError> {
            Ok(false)
        }
    }

    async fn settle(cache: &MarketCache) {
        while cache.refresh_in_flight() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reads_within_interval_are_idempotent() {
        let stub = DiscoveryStub::new(vec!["BTC", "SOL"]);
        let cache = MarketCache::new(stub.clone(), Duration::from_secs(3600));

        let first = cache.get_markets(false).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        let second = cache.get_markets(false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_read_serves_old_snapshot_and_refreshes_once() {
        let stub = DiscoveryStub::new(vec!["BTC", "ETH"]);
        let cache = MarketCache::new(stub.clone(), Duration::from_secs(3600));
        let first = cache.get_markets(false).await.unwrap();

        *stub.symbols.lock().unwrap() = vec!["BTC"];
        tokio::time::advance(Duration::from_secs(3601)).await;

        let stale = cache.get_markets(false).await.unwrap();
        let again = cache.get_markets(false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &stale));
        assert!(Arc::ptr_eq(&first, &again));

        settle(&cache).await;
        assert_eq!(stub.calls(), 2);

        let fresh = cache.get_markets(false).await.unwrap();
        assert!(!fresh.contains(&Symbol::new("ETH")));
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_last_known_good() {
        let stub = DiscoveryStub::new(vec!["BTC"]);
        let cache = MarketCache::new(stub.clone(), Duration::from_secs(10));
        let first = cache.get_markets(false).await.unwrap();

        stub.failing.store(true, Ordering::SeqCst);
        let forced = cache.get_markets(true).await.unwrap();

        assert!(Arc::ptr_eq(&first, &forced));
        assert!(cache.last_refresh_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn never_refreshed_is_an_error() {
        let stub = DiscoveryStub::new(vec!["BTC"]);
        stub.failing.store(true, Ordering::SeqCst);
        let cache = MarketCache::new(stub, Duration::from_secs(10));

        let Err(CacheError::NeverRefreshed { source }) = cache.get_markets(false).await else {
            panic!("expected NeverRefreshed");
        };
        assert!(matches!(source, AdapterError::Connection { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_triggers_background_refresh() {
        let stub = DiscoveryStub::new(vec!["BTC"]);
        let cache = MarketCache::new(stub.clone(), Duration::from_secs(3600));
        cache.get_markets(false).await.unwrap();

        cache.invalidate();
        cache.get_markets(false).await.unwrap();
        settle(&cache).await;

        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_discovery_times_out_and_keeps_last_known_good() {
        let stub = DiscoveryStub::new(vec!["BTC"]);
        let cache = MarketCache::with_discover_timeout(
            stub.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        );
        let first = cache.get_markets(false).await.unwrap();

        stub.hanging.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let forced = cache.get_markets(true).await.unwrap();

        assert!(Arc::ptr_eq(&first, &forced));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(matches!(
            cache.last_refresh_error(),
            Some(AdapterError::Timeout { elapsed }) if elapsed == Duration::from_secs(5)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_first_discovery_is_an_error() {
        let stub = DiscoveryStub::new(vec!["BTC"]);
        stub.hanging.store(true, Ordering::SeqCst);
        let cache =
            MarketCache::with_discover_timeout(stub, Duration::from_secs(10), Duration::from_secs(2));

        let Err(CacheError::NeverRefreshed { source }) = cache.get_markets(false).await else {
            panic!("expected NeverRefreshed");
        };
        assert!(matches!(source, AdapterError::Timeout { .. }));
    }
}
