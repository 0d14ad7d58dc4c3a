//! In-memory query cache with request dedup and explicit invalidation.

use crate::error::QueryError;
use crate::key::QueryKey;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedRequest = Shared<BoxFuture<'static, Result<CachedValue, QueryError>>>;

/// Cache tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a successful response is served without refetching.
    #[serde(default = "default_stale_time", with = "humantime_serde")]
    pub stale_time: Duration,

    /// Entries not read for this long are evicted.
    #[serde(default = "default_gc_time", with = "humantime_serde")]
    pub gc_time: Duration,

    /// How often the eviction sweep runs.
    #[serde(default = "default_gc_interval", with = "humantime_serde")]
    pub gc_interval: Duration,

    /// Capacity of the cache event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: default_stale_time(),
            gc_time: default_gc_time(),
            gc_interval: default_gc_interval(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_stale_time() -> Duration {
    Duration::from_secs(5)
}

fn default_gc_time() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_gc_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_event_capacity() -> usize {
    256
}

/// Change notification for subscribers (re-render triggers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(QueryKey),
    Failed(QueryKey),
    Invalidated(QueryKey),
    Removed(QueryKey),
}

/// What a view sees for one query.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    /// Last successful result, kept across later failures.
    pub data: Option<T>,
    /// Error from the most recent request, cleared by the next success.
    pub error: Option<QueryError>,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<T> QuerySnapshot<T> {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_stale: true,
            is_fetching: false,
            updated_at: None,
        }
    }

    /// Data if any was ever loaded, otherwise the error.
    pub fn into_result(self) -> Result<T, QueryError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(QueryError::message("query has no data")),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QuerySnapshot<U> {
        QuerySnapshot {
            data: self.data.map(f),
            error: self.error,
            is_stale: self.is_stale,
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

struct Entry {
    value: Option<CachedValue>,
    error: Option<QueryError>,
    updated_at: Option<Instant>,
    last_access: Instant,
    /// Sequence number of the request that produced `value`.
    data_seq: u64,
    /// Highest sequence number applied, success or failure.
    latest_seq: u64,
    /// Counter value at the last invalidation; data from requests issued at
    /// or before it is stale.
    invalidated_seq: u64,
    in_flight: Option<(u64, SharedRequest)>,
}

impl Entry {
    /// An entry that ignores every request numbered `floor` or lower, so
    /// requests issued for a removed predecessor cannot land in it.
    fn new(floor: u64) -> Self {
        Self {
            value: None,
            error: None,
            updated_at: None,
            last_access: Instant::now(),
            data_seq: 0,
            latest_seq: floor,
            invalidated_seq: floor,
            in_flight: None,
        }
    }

    fn is_stale(&self, stale_time: Duration) -> bool {
        match self.updated_at {
            None => true,
            Some(at) => {
                self.error.is_some()
                    || self.data_seq <= self.invalidated_seq
                    || at.elapsed() >= stale_time
            }
        }
    }

    fn snapshot<T: Clone + 'static>(&self, stale_time: Duration) -> QuerySnapshot<T> {
        QuerySnapshot {
            data: self
                .value
                .as_ref()
                .and_then(|v| (**v).downcast_ref::<T>().cloned()),
            error: self.error.clone(),
            is_stale: self.is_stale(stale_time),
            is_fetching: self.in_flight.is_some(),
            updated_at: self.updated_at,
        }
    }
}

struct Inner {
    entries: RwLock<HashMap<QueryKey, Entry>>,
    dependents: RwLock<HashMap<QueryKey, Vec<QueryKey>>>,
    seq: AtomicU64,
    events: broadcast::Sender<CacheEvent>,
    config: CacheConfig,
}

impl Inner {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Shared query cache.
///
/// A cheap handle: clones share the same entries. Views receive it
/// explicitly; there is no process-global instance.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    /// Create a cache. Inside a tokio runtime this also starts the eviction sweep,
    /// which ends once every handle is dropped.
    pub fn new(config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let gc_interval = config.gc_interval;

        let cache = Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                dependents: RwLock::new(HashMap::new()),
                seq: AtomicU64::new(0),
                events,
                config,
            }),
        };

        if tokio::runtime::Handle::try_current().is_ok() {
            let weak = Arc::downgrade(&cache.inner);
            tokio::spawn(cleanup_loop(weak, gc_interval));
        }

        info!(
            "Query cache initialized (stale_time={:?}, gc_time={:?})",
            cache.inner.config.stale_time, cache.inner.config.gc_time
        );

        cache
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Subscribe to cache change events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Serve fresh cached data, or fetch (joining any in-flight request).
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> QuerySnapshot<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        {
            let mut entries = self.inner.entries.write().await;
            if let Some(entry) = entries.get_mut(key) {
                entry.last_access = Instant::now();
                if !entry.is_stale(self.inner.config.stale_time) {
                    let snapshot = entry.snapshot::<T>(self.inner.config.stale_time);
                    if snapshot.data.is_some() {
                        debug!(key = %key, "Serving cached data");
                        return snapshot;
                    }
                }
            }
        }

        self.refetch(key, fetcher).await
    }

    /// Fetch regardless of freshness. Concurrent callers share one request.
    #[instrument(skip(self, fetcher), fields(key = %key))]
    pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> QuerySnapshot<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let (seq, request) = {
            let mut entries = self.inner.entries.write().await;
            let floor = self.inner.seq.load(Ordering::SeqCst);
            let entry = entries.entry(key.clone()).or_insert_with(|| Entry::new(floor));
            entry.last_access = Instant::now();

            match &entry.in_flight {
                Some((seq, request)) => {
                    debug!("Joining in-flight request #{}", seq);
                    (*seq, request.clone())
                }
                None => {
                    let seq = self.inner.next_seq();
                    let request = fetcher()
                        .map(|result| result.map(|value| Arc::new(value) as CachedValue))
                        .boxed()
                        .shared();
                    entry.in_flight = Some((seq, request.clone()));
                    (seq, request)
                }
            }
        };

        let result = request.await;
        self.complete(key, seq, result).await;
        self.snapshot(key).await
    }

    async fn complete(&self, key: &QueryKey, seq: u64, result: Result<CachedValue, QueryError>) {
        let mut entries = self.inner.entries.write().await;
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, "Dropping response for removed query");
            return;
        };

        if matches!(&entry.in_flight, Some((current, _)) if *current == seq) {
            entry.in_flight = None;
        }

        // Co-waiters of one request land here once each; only the first applies.
        // An older request finishing after a newer one is discarded.
        if seq <= entry.latest_seq {
            return;
        }
        entry.latest_seq = seq;

        match result {
            Ok(value) => {
                entry.value = Some(value);
                entry.error = None;
                entry.data_seq = seq;
                entry.updated_at = Some(Instant::now());
                self.inner.emit(CacheEvent::Updated(key.clone()));
            }
            Err(error) => {
                warn!(key = %key, "Query failed: {}", error);
                entry.error = Some(error);
                self.inner.emit(CacheEvent::Failed(key.clone()));
            }
        }
    }

    /// Current state of a query without fetching.
    pub async fn snapshot<T: Clone + 'static>(&self, key: &QueryKey) -> QuerySnapshot<T> {
        let entries = self.inner.entries.read().await;
        entries
            .get(key)
            .map(|entry| entry.snapshot(self.inner.config.stale_time))
            .unwrap_or_else(QuerySnapshot::empty)
    }

    /// Write data directly (e.g. the object returned by a mutation).
    pub async fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let seq = self.inner.next_seq();
        let mut entries = self.inner.entries.write().await;
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry::new(seq - 1));
        entry.value = Some(Arc::new(value));
        entry.error = None;
        entry.data_seq = seq;
        entry.latest_seq = seq;
        entry.updated_at = Some(Instant::now());
        entry.last_access = Instant::now();
        drop(entries);
        self.inner.emit(CacheEvent::Updated(key.clone()));
    }

    /// Declare that invalidating anything selected by `key` also invalidates
    /// `dependents`. Edges are followed transitively.
    pub async fn depends_on(&self, key: QueryKey, dependents: impl IntoIterator<Item = QueryKey>) {
        let mut graph = self.inner.dependents.write().await;
        let edges = graph.entry(key).or_default();
        for dependent in dependents {
            if !edges.contains(&dependent) {
                edges.push(dependent);
            }
        }
    }

    /// `key` followed by its dependents in breadth-first order.
    async fn with_dependents(&self, key: &QueryKey) -> Vec<QueryKey> {
        let graph = self.inner.dependents.read().await;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([key.clone()]);
        let mut ordered = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for (source, dependents) in graph.iter() {
                if source.matches(&current) {
                    queue.extend(dependents.iter().cloned());
                }
            }
            ordered.push(current);
        }

        ordered
    }

    /// Mark every entry selected by `key` (and its dependents) stale so the
    /// next read refetches. Returns the number of entries touched.
    pub async fn invalidate(&self, key: &QueryKey) -> usize {
        let targets = self.with_dependents(key).await;
        let marker = self.inner.seq.load(Ordering::SeqCst);
        let mut touched = Vec::new();

        {
            let mut entries = self.inner.entries.write().await;
            for target in &targets {
                let mut matched: Vec<&QueryKey> =
                    entries.keys().filter(|k| target.matches(k)).collect();
                matched.sort();
                let matched: Vec<QueryKey> = matched
                    .into_iter()
                    .filter(|k| !touched.contains(*k))
                    .cloned()
                    .collect();

                for cached_key in matched {
                    if let Some(entry) = entries.get_mut(&cached_key) {
                        entry.invalidated_seq = marker;
                        entry.in_flight = None;
                    }
                    touched.push(cached_key);
                }
            }
        }

        for cached_key in &touched {
            self.inner.emit(CacheEvent::Invalidated(cached_key.clone()));
        }
        debug!(key = %key, "Invalidated {} entries", touched.len());
        touched.len()
    }

    /// Drop every entry selected by `key`. Responses still in flight for
    /// them are discarded.
    pub async fn remove(&self, key: &QueryKey) -> usize {
        let removed: Vec<QueryKey> = {
            let mut entries = self.inner.entries.write().await;
            let mut keys: Vec<QueryKey> = entries.keys().filter(|k| key.matches(k)).cloned().collect();
            keys.sort();
            for k in &keys {
                entries.remove(k);
            }
            keys
        };

        for k in &removed {
            self.inner.emit(CacheEvent::Removed(k.clone()));
        }
        removed.len()
    }

    /// Run a mutation; on success invalidate `invalidates`, on failure leave
    /// the cache untouched.
    pub async fn mutate<T, E, Fut>(&self, request: Fut, invalidates: &[QueryKey]) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let value = request.await?;
        for key in invalidates {
            self.invalidate(key).await;
        }
        Ok(value)
    }

    /// Evict entries nobody has read within `gc_time`.
    pub async fn collect_garbage(&self) -> usize {
        let gc_time = self.inner.config.gc_time;
        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.in_flight.is_some() || entry.last_access.elapsed() < gc_time);
        before - entries.len()
    }

    /// Number of cached queries.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Background task that periodically evicts unused entries.
async fn cleanup_loop(inner: Weak<Inner>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let removed = QueryCache { inner }.collect_garbage().await;
        if removed > 0 {
            debug!("Evicted {} unused queries", removed);
        }
    }
}
