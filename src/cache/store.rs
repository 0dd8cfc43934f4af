//! Shared cache storage.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::cache::entry::{CacheEntry, CacheOptions};
use crate::cache::error::CacheError;
use crate::cache::fetcher::Fetcher;
use crate::config::CacheConfig;
use crate::events::{EventBus, FrameworkEvent};

/// A thread-safe, cheaply cloneable cache handle.
#[derive(Clone)]
pub struct DataCache {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) entries: DashMap<String, CacheEntry>,
    pub(super) fetchers: DashMap<String, Arc<dyn Fetcher>>,
    pub(super) revalidating: AtomicBool,
    pub(super) pending: Mutex<BTreeSet<String>>,
    pub(super) timer: Mutex<Option<JoinHandle<()>>>,
    pub(super) debounce: Duration,
    pub(super) stale_ratio: f64,
    pub(super) events: EventBus,
}

impl DataCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_events(config, EventBus::new())
    }

    pub fn with_events(config: &CacheConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                fetchers: DashMap::new(),
                revalidating: AtomicBool::new(false),
                pending: Mutex::new(BTreeSet::new()),
                timer: Mutex::new(None),
                debounce: Duration::from_millis(config.debounce_ms),
                stale_ratio: config.stale_ratio.clamp(0.0, 1.0),
                events,
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Look up `key`.
    ///
    /// Expired entries are evicted and reported absent. Stale entries are
    /// returned with `stale` set and queued for background revalidation.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let lookup = match self.inner.entries.get_mut(key) {
            None => Lookup::Missing,
            Some(mut entry) => {
                if entry.is_expired(now) {
                    Lookup::Expired
                } else {
                    if entry.is_stale(now, self.inner.stale_ratio) {
                        entry.stale = true;
                    }
                    Lookup::Hit(entry.clone())
                }
            }
        };

        // The shard lock is released here; eviction takes it again.
        if matches!(lookup, Lookup::Expired) {
            self.evict(key, now);
        }

        match lookup {
            Lookup::Hit(entry) => {
                self.inner.events.emit(FrameworkEvent::CacheHit {
                    key: key.to_string(),
                    stale: entry.stale,
                });
                if entry.stale {
                    self.schedule_revalidation(key);
                }
                Some(entry)
            }
            Lookup::Missing | Lookup::Expired => {
                self.inner.events.emit(FrameworkEvent::CacheMiss { key: key.to_string() });
                None
            }
        }
    }

    /// Unconditionally store `entry` under `key`.
    pub fn set(&self, key: impl Into<String>, entry: CacheEntry) {
        self.inner.entries.insert(key.into(), entry);
    }

    /// Store `data` as a fresh entry.
    pub fn insert(&self, key: impl Into<String>, data: Value, options: CacheOptions) {
        self.set(key, CacheEntry::new(data, options));
    }

    /// Replace the data of `key`, keeping its ttl and tags, and reset its age.
    ///
    /// Missing keys are inserted with default options.
    pub fn mutate(&self, key: &str, data: Value) {
        let options = self
            .inner
            .entries
            .get(key)
            .map(|entry| entry.options())
            .unwrap_or_default();
        self.insert(key, data, options);
    }

    /// Remove `key` together with its fetcher.
    pub fn delete(&self, key: &str) -> Option<CacheEntry> {
        self.inner.fetchers.remove(key);
        self.inner.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Drop every entry, fetcher and pending revalidation.
    pub fn clear(&self) {
        self.inner.entries.clear();
        self.inner.fetchers.clear();
        self.inner.pending.lock().expect("pending set mutex poisoned").clear();
        if let Some(timer) = self.inner.timer.lock().expect("timer mutex poisoned").take() {
            timer.abort();
        }
    }

    /// Remove every entry carrying `tag`. Returns how many were removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut dropped = Vec::new();
        self.inner.entries.retain(|key, entry| {
            let keep = !entry.tags.contains(tag);
            if !keep {
                dropped.push(key.clone());
            }
            keep
        });
        for key in &dropped {
            self.inner.fetchers.remove(key);
        }
        let removed = dropped.len();
        tracing::debug!(tag = %tag, removed, "invalidated cache tag");
        removed
    }

    /// Associate `key` with the fetcher used to revalidate it.
    pub fn register_fetcher(&self, key: impl Into<String>, fetcher: Arc<dyn Fetcher>) {
        self.inner.fetchers.insert(key.into(), fetcher);
    }

    pub fn has_fetcher(&self, key: &str) -> bool {
        self.inner.fetchers.contains_key(key)
    }

    /// Read through the cache.
    ///
    /// Fresh and stale hits are served from the cache. A miss calls `fetcher`
    /// and stores the result. Whenever an entry is served `fetcher` becomes
    /// the key's revalidation fetcher; a failed fetch registers nothing.
    pub async fn fetch(
        &self,
        key: &str,
        options: CacheOptions,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<CacheEntry, CacheError> {
        // Registered after the lookup: an expired hit evicts the old fetcher.
        if let Some(entry) = self.get(key) {
            self.register_fetcher(key, fetcher);
            return Ok(entry);
        }

        let data = fetcher.fetch(key).await.map_err(|source| CacheError::FetchFailed {
            key: key.to_string(),
            source,
        })?;

        let entry = CacheEntry::new(data, options);
        self.set(key, entry.clone());
        self.register_fetcher(key, fetcher);
        Ok(entry)
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .inner
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        expired.iter().filter(|key| self.evict(key, now)).count()
    }

    /// Periodically prune expired entries until `shutdown` fires.
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "cache sweeper starting");
            let mut ticker = time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.prune_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "pruned expired cache entries");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("cache sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn evict(&self, key: &str, now: Instant) -> bool {
        let removed = self
            .inner
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some();
        if removed {
            self.inner.fetchers.remove(key);
            tracing::trace!(key = %key, "evicted expired cache entry");
            self.inner.events.emit(FrameworkEvent::CacheEvicted { key: key.to_string() });
        }
        removed
    }
}

enum Lookup {
    Missing,
    Expired,
    Hit(CacheEntry),
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl fmt::Debug for DataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCache")
            .field("entries", &self.inner.entries.len())
            .field("fetchers", &self.inner.fetchers.len())
            .field("debounce", &self.inner.debounce)
            .field("stale_ratio", &self.inner.stale_ratio)
            .finish()
    }
}
