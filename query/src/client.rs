use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;
use switchyard_types::RpcResult;
use tracing::debug;

use crate::key::QueryKey;
use crate::state::{QueryState, QueryStatus, now_ms};

/// Default window during which fetched data is served without refetching.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

/// Decides which entries [`QueryClient::dehydrate`] ships.
pub type ShouldDehydrate = Arc<dyn Fn(&QueryKey, &QueryState) -> bool + Send + Sync>;

/// Library default: only successful entries are dehydrated.
#[must_use]
pub fn default_should_dehydrate_query(_key: &QueryKey, state: &QueryState) -> bool {
    state.status == QueryStatus::Success
}

/// Also ship entries still pending so the client can pick them up on hydrate.
#[must_use]
pub fn dehydrate_success_or_pending(key: &QueryKey, state: &QueryState) -> bool {
    default_should_dehydrate_query(key, state) || state.status == QueryStatus::Pending
}

#[derive(Clone)]
pub struct QueryClientConfig {
    pub stale_time: Duration,
    pub should_dehydrate_query: ShouldDehydrate,
}

impl Default for QueryClientConfig {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            should_dehydrate_query: Arc::new(dehydrate_success_or_pending),
        }
    }
}

impl QueryClientConfig {
    #[must_use]
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub fn with_should_dehydrate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&QueryKey, &QueryState) -> bool + Send + Sync + 'static,
    {
        self.should_dehydrate_query = Arc::new(predicate);
        self
    }
}

impl fmt::Debug for QueryClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClientConfig")
            .field("stale_time", &self.stale_time)
            .finish_non_exhaustive()
    }
}

/// Build a client with its own, empty cache.
#[must_use]
pub fn make_query_client(config: QueryClientConfig) -> QueryClient {
    QueryClient::new(config)
}

/// Keyed cache of procedure results.
///
/// Clones share one cache. Locks are never held across an await.
#[derive(Clone)]
pub struct QueryClient {
    config: Arc<QueryClientConfig>,
    cache: Arc<RwLock<HashMap<QueryKey, QueryState>>>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryClientConfig::default())
    }
}

impl QueryClient {
    #[must_use]
    pub fn new(config: QueryClientConfig) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueryClientConfig {
        &self.config
    }

    /// True when both handles point at the same cache.
    #[must_use]
    pub fn ptr_eq(&self, other: &QueryClient) -> bool {
        Arc::ptr_eq(&self.cache, &other.cache)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.read().get(key).and_then(|s| s.data.clone())
    }

    #[must_use]
    pub fn get_query_state(&self, key: &QueryKey) -> Option<QueryState> {
        self.read().get(key).cloned()
    }

    /// Write data directly. Last writer wins.
    pub fn set_query_data(&self, key: QueryKey, data: Value) {
        let now = now_ms();
        self.write()
            .entry(key)
            .or_insert_with(QueryState::pending)
            .record_success(data, now);
    }

    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.is_stale_at(key, now_ms())
    }

    /// Missing entries are stale.
    #[must_use]
    pub fn is_stale_at(&self, key: &QueryKey, now: u64) -> bool {
        self.read()
            .get(key)
            .is_none_or(|s| s.is_stale_at(self.config.stale_time, now))
    }

    /// Serve fresh cached data, otherwise run `fetcher` and store its outcome.
    ///
    /// On failure the error is recorded and returned; previously cached data
    /// stays readable.
    pub async fn fetch_query<F, Fut>(&self, key: QueryKey, fetcher: F) -> RpcResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RpcResult<Value>>,
    {
        {
            let mut cache = self.write();
            let state = cache.entry(key.clone()).or_insert_with(QueryState::pending);
            if !state.is_stale_at(self.config.stale_time, now_ms())
                && let Some(data) = &state.data
            {
                debug!(key = %key, "query cache hit");
                return Ok(data.clone());
            }
        }

        debug!(key = %key, "fetching query");
        let result = fetcher().await;
        let now = now_ms();
        let mut cache = self.write();
        let state = cache.entry(key).or_insert_with(QueryState::pending);
        match &result {
            Ok(data) => state.record_success(data.clone(), now),
            Err(err) => state.record_error(err.clone(), now),
        }
        result
    }

    /// Serve any cached data, even stale; fetch only when there is none.
    pub async fn ensure_query_data<F, Fut>(&self, key: QueryKey, fetcher: F) -> RpcResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RpcResult<Value>>,
    {
        if let Some(data) = self.get_query_data(&key) {
            return Ok(data);
        }
        self.fetch_query(key, fetcher).await
    }

    /// Warm the cache. Errors are recorded in the entry, not returned.
    pub async fn prefetch_query<F, Fut>(&self, key: QueryKey, fetcher: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RpcResult<Value>>,
    {
        if let Err(err) = self.fetch_query(key.clone(), fetcher).await {
            debug!(key = %key, error = %err, "prefetch failed");
        }
    }

    /// Mark matching entries stale. Returns how many were marked.
    pub fn invalidate_queries(&self, prefix: &str) -> usize {
        let mut cache = self.write();
        let mut count = 0;
        for (_, state) in cache.iter_mut().filter(|(k, _)| k.matches_prefix(prefix)) {
            state.is_invalidated = true;
            count += 1;
        }
        debug!(prefix, count, "invalidated queries");
        count
    }

    /// Drop matching entries. Returns how many were removed.
    pub fn remove_queries(&self, prefix: &str) -> usize {
        let mut cache = self.write();
        let before = cache.len();
        cache.retain(|k, _| !k.matches_prefix(prefix));
        before - cache.len()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, QueryState>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, QueryState>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
