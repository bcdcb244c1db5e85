/// In-memory expiring cache with background refresh
///
/// Each entry carries its own TTL and an optional refresh producer.
/// Readers never trigger a refresh; the scheduler in `jobs` calls
/// [`ExpiringCache::refresh_all`] and [`ExpiringCache::sweep`] on a timer.
///
/// Entries are replaced whole under the write lock, and values are expected
/// to be cheap `Arc` clones, so a reader sees either the old or the new value.
pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use crate::{error::GateResult, metrics};
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Fraction of the TTL after which an entry is refreshed proactively
pub const NEAR_EXPIRY_RATIO: f64 = 0.8;

/// Future returned by a refresh producer
pub type RefreshFuture<V> = BoxFuture<'static, GateResult<V>>;

/// Zero-argument producer of a fresh value for one key
pub type RefreshFn<V> = Arc<dyn Fn() -> RefreshFuture<V> + Send + Sync>;

/// A cached value with its bookkeeping
#[derive(Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: Instant,
    pub ttl: Duration,
    refresh: Option<RefreshFn<V>>,
    generation: u64,
}

impl<V> CacheEntry<V> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// `now - timestamp > ttl`
    pub fn is_expired(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }

    /// `now - timestamp > 0.8 * ttl`
    pub fn is_near_expiry(&self, now: Instant) -> bool {
        self.age(now) > self.ttl.mul_f64(NEAR_EXPIRY_RATIO)
    }

    pub fn has_refresh(&self) -> bool {
        self.refresh.is_some()
    }
}

/// Outcome of one refresh pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
    /// Entry was replaced or deleted while its refresh was in flight
    pub superseded: usize,
}

/// Generic key/value cache with per-entry TTL
pub struct ExpiringCache<V> {
    name: &'static str,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    generations: AtomicU64,
}

impl<V> ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache on the wall clock
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self::with_clock(name, default_ttl, Arc::new(SystemClock))
    }

    /// Create a cache on an injected clock
    pub fn with_clock(name: &'static str, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            clock,
            generations: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    /// Store a value, overwriting any existing entry for `key`
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        self.insert(key, value, ttl, None).await;
    }

    /// Store a value together with the producer used to refresh it
    pub async fn set_with_refresh(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        refresh: RefreshFn<V>,
    ) {
        self.insert(key, value, ttl, Some(refresh)).await;
    }

    async fn insert(&self, key: &str, value: V, ttl: Option<Duration>, refresh: Option<RefreshFn<V>>) {
        let entry = CacheEntry {
            value,
            timestamp: self.clock.now(),
            ttl: ttl.unwrap_or(self.default_ttl),
            refresh,
            generation: self.next_generation(),
        };

        debug!("Cache SET: {}:{} (TTL: {:?})", self.name, key, entry.ttl);
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Look up a live value. Expired entries are evicted and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        let expired_generation = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => {
                    metrics::record_cache_access(self.name, false);
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    metrics::record_cache_access(self.name, true);
                    return Some(entry.value.clone());
                }
                Some(entry) => entry.generation,
            }
        };

        self.evict_if_unchanged(key, expired_generation).await;
        metrics::record_cache_access(self.name, false);
        None
    }

    /// Same expiry semantics as [`get`](Self::get) without cloning the value
    pub async fn has(&self, key: &str) -> bool {
        let now = self.clock.now();

        let expired_generation = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return false,
                Some(entry) if !entry.is_expired(now) => return true,
                Some(entry) => entry.generation,
            }
        };

        self.evict_if_unchanged(key, expired_generation).await;
        false
    }

    async fn evict_if_unchanged(&self, key: &str, generation: u64) {
        let mut entries = self.entries.write().await;
        if entries.get(key).map(|e| e.generation) == Some(generation) {
            entries.remove(key);
            debug!("Cache EXPIRED: {}:{}", self.name, key);
        }
    }

    pub async fn delete(&self, key: &str) {
        debug!("Cache DELETE: {}:{}", self.name, key);
        self.entries.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        metrics::set_cache_size(self.name, 0);
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Evict every expired entry. Returns the number evicted.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - entries.len();

        metrics::set_cache_size(self.name, entries.len());
        if evicted > 0 {
            info!("Cache {} swept {} expired entries", self.name, evicted);
        }
        evicted
    }

    /// Refresh every near-expiry or expired entry that has a producer.
    ///
    /// Producers run concurrently outside the lock and all of them are awaited.
    /// A failure keeps the stale entry. A result is discarded if the entry was
    /// overwritten or deleted while the producer ran.
    pub async fn refresh_all(&self) -> RefreshReport {
        let now = self.clock.now();

        let candidates: Vec<(String, u64, RefreshFn<V>)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|(_, entry)| entry.is_near_expiry(now) || entry.is_expired(now))
                .filter_map(|(key, entry)| {
                    entry
                        .refresh
                        .as_ref()
                        .map(|refresh| (key.clone(), entry.generation, Arc::clone(refresh)))
                })
                .collect()
        };

        if candidates.is_empty() {
            return RefreshReport::default();
        }

        let results = join_all(candidates.into_iter().map(|(key, generation, refresh)| async move {
            let result = refresh().await;
            (key, generation, result)
        }))
        .await;

        let mut report = RefreshReport::default();
        for (key, generation, result) in results {
            match result {
                Ok(value) => {
                    let mut entries = self.entries.write().await;
                    let current = entries
                        .get(&key)
                        .filter(|e| e.generation == generation)
                        .map(|e| (e.ttl, e.refresh.clone()));
                    match current {
                        Some((ttl, refresh)) => {
                            let replacement = CacheEntry {
                                value,
                                timestamp: self.clock.now(),
                                ttl,
                                refresh,
                                generation: self.next_generation(),
                            };
                            entries.insert(key.clone(), replacement);
                            report.refreshed += 1;
                            metrics::record_cache_refresh(self.name, "success");
                            debug!("Cache refreshed for key: {}:{}", self.name, key);
                        }
                        None => {
                            report.superseded += 1;
                            debug!("Cache refresh superseded for key: {}:{}", self.name, key);
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::record_cache_refresh(self.name, "failure");
                    warn!(cache = self.name, key = %key, error = %e, "Failed to refresh cache entry, keeping stale value");
                }
            }
        }

        report
    }

    /// Snapshot of one raw entry, expired or not
    pub async fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.read().await.get(key).cloned()
    }
}

/// Type-erased maintenance hooks so the scheduler can drive caches of any value type
#[async_trait]
pub trait CacheMaintenance: Send + Sync {
    fn cache_name(&self) -> &'static str;

    async fn sweep_expired(&self) -> usize;

    async fn refresh_entries(&self) -> RefreshReport;

    async fn entry_count(&self) -> usize;
}

#[async_trait]
impl<V> CacheMaintenance for ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn cache_name(&self) -> &'static str {
        self.name
    }

    async fn sweep_expired(&self) -> usize {
        self.sweep().await
    }

    async fn refresh_entries(&self) -> RefreshReport {
        self.refresh_all().await
    }

    async fn entry_count(&self) -> usize {
        self.len().await
    }
}
