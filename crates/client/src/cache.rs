//! Key-addressed cache of server responses.
//!
//! Every screen asking for the same [`QueryKey`] shares one cache entry and,
//! while a fetch is running, one in-flight request. Entries stay valid until
//! they are invalidated (usually by a successful [`Mutation`](crate::Mutation))
//! or garbage-collected after sitting unobserved for `gc_time`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::ClientError;
use crate::query::QueryKey;
use crate::transport::Transport;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Extra attempts for retryable query failures. Mutations never retry.
    pub retry: u32,
    pub retry_delay: Duration,
    /// How long an unobserved entry is kept.
    pub gc_time: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retry: 1,
            retry_delay: Duration::from_millis(250),
            gc_time: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Fresh data was stored for the key.
    Updated(QueryKey),
    /// The entry is stale; observers should refetch.
    Invalidated(QueryKey),
    Removed(QueryKey),
}

impl CacheEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            CacheEvent::Updated(k) | CacheEvent::Invalidated(k) | CacheEvent::Removed(k) => k,
        }
    }
}

/// Which entries an invalidation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidate {
    Exact(QueryKey),
    /// Every key whose path is this path or lies below it.
    Prefix(String),
}

impl Invalidate {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Invalidate::Exact(k) => k == key,
            Invalidate::Prefix(prefix) => key.is_under(prefix),
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, ClientError>>>;

struct Entry {
    data: Option<Arc<Value>>,
    stale: bool,
    /// Drawn from a cache-wide counter on creation, invalidation and direct
    /// writes. A fetch only lands if the generation it started under is
    /// still current, which also holds across `clear`.
    generation: u64,
    in_flight: Option<SharedFetch>,
    observers: usize,
    idle_since: Instant,
}

impl Entry {
    fn new(generation: u64) -> Self {
        Self {
            data: None,
            stale: false,
            generation,
            in_flight: None,
            observers: 0,
            idle_since: Instant::now(),
        }
    }

    fn fresh(&self) -> Option<Arc<Value>> {
        if self.stale { None } else { self.data.clone() }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: CacheConfig,
    entries: Mutex<HashMap<QueryKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
    generations: AtomicU64,
    last_sweep: Mutex<Instant>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn entry<'a>(&self, entries: &'a mut HashMap<QueryKey, Entry>, key: &QueryKey) -> &'a mut Entry {
        entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(self.next_generation()))
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn complete(&self, key: &QueryKey, generation: u64, result: &Result<Arc<Value>, ClientError>) {
        let stored = {
            let mut entries = self.entries();
            match entries.get_mut(key) {
                Some(entry) if entry.generation == generation => {
                    entry.in_flight = None;
                    match result {
                        Ok(data) => {
                            entry.data = Some(data.clone());
                            entry.stale = false;
                            true
                        }
                        Err(_) => false,
                    }
                }
                _ => false,
            }
        };

        if stored {
            self.emit(CacheEvent::Updated(key.clone()));
        }
    }
}

/// Shared handle to the cache; clones refer to the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(transport: Arc<dyn Transport>, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                entries: Mutex::new(HashMap::new()),
                events,
                generations: AtomicU64::new(0),
                last_sweep: Mutex::new(Instant::now()),
            }),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Cached data when fresh; otherwise join the running fetch or start one.
    pub async fn query(&self, key: &QueryKey) -> Result<Arc<Value>, ClientError> {
        self.sweep();
        let fetch = {
            let mut entries = self.inner.entries();
            let entry = self.inner.entry(&mut entries, key);
            if entry.observers == 0 {
                entry.idle_since = Instant::now();
            }

            if let Some(data) = entry.fresh() {
                tracing::trace!(key = %key, "query cache hit");
                return Ok(data);
            }

            match &entry.in_flight {
                Some(fetch) => fetch.clone(),
                None => {
                    let fetch = self.start_fetch(key.clone(), entry.generation);
                    entry.in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    fn start_fetch(&self, key: QueryKey, generation: u64) -> SharedFetch {
        let inner = self.inner.clone();
        async move {
            let result = fetch_with_retry(inner.transport.as_ref(), &key, &inner.config)
                .await
                .map(Arc::new);
            inner.complete(&key, generation, &result);
            result
        }
        .boxed()
        .shared()
    }

    /// Mark matching entries stale and detach their in-flight fetches, so the
    /// next read goes back to the server. Returns how many entries matched.
    pub fn invalidate(&self, target: &Invalidate) -> usize {
        let keys = {
            let mut entries = self.inner.entries();
            let mut keys = Vec::new();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| target.matches(k)) {
                entry.stale = true;
                entry.generation = self.inner.next_generation();
                entry.in_flight = None;
                keys.push(key.clone());
            }
            keys
        };

        tracing::debug!(invalidation = ?target, matched = keys.len(), "invalidated queries");
        let matched = keys.len();
        for key in keys {
            self.inner.emit(CacheEvent::Invalidated(key));
        }
        matched
    }

    /// Register interest in a key. The entry is kept alive while any
    /// observer exists.
    pub fn observe(&self, key: QueryKey) -> QueryObserver {
        self.inner.entry(&mut self.inner.entries(), &key).observers += 1;

        QueryObserver {
            cache: self.clone(),
            events: self.inner.events.subscribe(),
            key,
        }
    }

    fn release(&self, key: &QueryKey) {
        if let Some(entry) = self.inner.entries().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.idle_since = Instant::now();
            }
        }
        self.sweep();
    }

    /// Collect expired entries, at most once per quarter of `gc_time`.
    fn sweep(&self) {
        let now = Instant::now();
        {
            let mut last = self.inner.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if now.duration_since(*last) < self.inner.config.gc_time / 4 {
                return;
            }
            *last = now;
        }
        let removed = self.collect_garbage_at(now);
        if removed > 0 {
            tracing::debug!(removed, "swept idle queries");
        }
    }

    /// Drop entries that have no observers, no running fetch and have been
    /// idle for at least `gc_time` as of `now`.
    pub fn collect_garbage_at(&self, now: Instant) -> usize {
        let gc_time = self.inner.config.gc_time;
        let removed = {
            let mut entries = self.inner.entries();
            let expired = entries
                .iter()
                .filter(|(_, e)| {
                    e.observers == 0 && e.in_flight.is_none() && now.duration_since(e.idle_since) >= gc_time
                })
                .map(|(k, _)| k.clone())
                .collect::<Vec<_>>();
            for key in &expired {
                entries.remove(key);
            }
            expired
        };

        let count = removed.len();
        for key in removed {
            self.inner.emit(CacheEvent::Removed(key));
        }
        count
    }

    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Instant::now())
    }

    /// Last known data for a key, fresh or stale, without fetching.
    pub fn peek(&self, key: &QueryKey) -> Option<Arc<Value>> {
        self.inner.entries().get(key).and_then(|e| e.data.clone())
    }

    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.inner.entries().get(key).map(|e| e.stale || e.data.is_none())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries().contains_key(key)
    }

    /// Store data for a key as fresh, replacing any running fetch.
    pub fn set_query_data(&self, key: &QueryKey, value: Value) {
        {
            let mut entries = self.inner.entries();
            let generation = self.inner.next_generation();
            let entry = self.inner.entry(&mut entries, key);
            entry.data = Some(Arc::new(value));
            entry.stale = false;
            entry.generation = generation;
            entry.in_flight = None;
        }
        self.inner.emit(CacheEvent::Updated(key.clone()));
    }

    /// Drop every entry, e.g. on sign-out. Fetches still running land
    /// nowhere.
    pub fn clear(&self) {
        let keys = self.inner.entries().drain().map(|(k, _)| k).collect::<Vec<_>>();
        for key in keys {
            self.inner.emit(CacheEvent::Removed(key));
        }
    }

    /// Events for all keys.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }
}

async fn fetch_with_retry(
    transport: &dyn Transport,
    key: &QueryKey,
    config: &CacheConfig,
) -> Result<Value, ClientError> {
    let mut attempt = 0;
    loop {
        match transport.send(key.to_request()).await {
            Err(e) if e.is_retryable() && attempt < config.retry => {
                attempt += 1;
                tracing::warn!(key = %key, attempt, error = %e, "query failed, retrying");
                tokio::time::sleep(config.retry_delay * attempt).await;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "query failed");
                return Err(e);
            }
            Ok(value) => return Ok(value),
        }
    }
}

/// A mounted view's interest in one key. Dropping it unmounts the view.
pub struct QueryObserver {
    cache: QueryCache,
    events: broadcast::Receiver<CacheEvent>,
    key: QueryKey,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn query(&self) -> Result<Arc<Value>, ClientError> {
        self.cache.query(&self.key).await
    }

    /// Wait for the next event concerning this key. `None` once the cache
    /// is gone.
    pub async fn changed(&mut self) -> Option<CacheEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.key() == &self.key => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(key = %self.key, skipped, "observer lagged behind cache events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stream of events for this key, independent of [`changed`](Self::changed).
    pub fn changes(&self) -> impl Stream<Item = CacheEvent> + Send + 'static {
        let key = self.key.clone();
        BroadcastStream::new(self.cache.subscribe())
            .filter_map(|event| event.ok())
            .filter(move |event| event.key() == &key)
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
