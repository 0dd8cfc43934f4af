//! Background revalidation.
//!
//! # Responsibilities
//! - Coalesce staleness signals into one debounced pass
//! - Allow at most one revalidation pass in flight
//! - Refetch each selected key exactly once per pass, collecting failures
//!
//! # Design Decisions
//! - The in-flight guard is a flag, not a lock: overlapping calls return a
//!   skipped report immediately instead of queueing
//! - The debounce timer only sleeps; the pass runs on its own task so that
//!   resetting the timer never aborts a running pass

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::time::{self, Instant};

use crate::cache::error::CacheError;
use crate::cache::fetcher::Fetcher;
use crate::cache::store::DataCache;
use crate::events::FrameworkEvent;

/// Outcome of one `revalidate` call.
#[derive(Debug, Default)]
pub struct RevalidationReport {
    /// Another pass was already in flight; nothing was done.
    pub skipped: bool,
    pub refreshed: Vec<String>,
    /// Selected keys with no registered fetcher.
    pub unfetchable: Vec<String>,
    pub failures: Vec<CacheError>,
}

impl RevalidationReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Holds the in-flight flag for the duration of a pass.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl DataCache {
    /// Refetch every entry, or only those carrying any of `tags`.
    ///
    /// A call made while another pass is in flight is a no-op and returns a
    /// report with `skipped` set.
    pub async fn revalidate(&self, tags: Option<&[&str]>) -> RevalidationReport {
        let keys: Vec<String> = self
            .inner
            .entries
            .iter()
            .filter(|entry| tags.is_none_or(|tags| entry.value().has_any_tag(tags)))
            .map(|entry| entry.key().clone())
            .collect();

        self.revalidate_keys(keys).await
    }

    /// Whether a revalidation pass is currently running.
    pub fn is_revalidating(&self) -> bool {
        self.inner.revalidating.load(Ordering::Acquire)
    }

    /// Keys waiting for the debounce timer.
    pub fn pending_revalidations(&self) -> Vec<String> {
        self.inner
            .pending
            .lock()
            .expect("pending set mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) async fn revalidate_keys(&self, keys: Vec<String>) -> RevalidationReport {
        let Some(_guard) = PassGuard::acquire(&self.inner.revalidating) else {
            tracing::debug!(keys = keys.len(), "revalidation already in flight, skipping");
            return RevalidationReport::skipped();
        };

        let started = Instant::now();
        let mut report = RevalidationReport::default();
        let mut jobs: Vec<(String, Arc<dyn Fetcher>)> = Vec::with_capacity(keys.len());
        for key in keys {
            let fetcher = self.inner.fetchers.get(&key).map(|f| Arc::clone(f.value()));
            match fetcher {
                Some(fetcher) => jobs.push((key, fetcher)),
                None => report.unfetchable.push(key),
            }
        }

        let results = join_all(jobs.into_iter().map(|(key, fetcher)| async move {
            let result = fetcher.fetch(&key).await;
            (key, result)
        }))
        .await;

        for (key, result) in results {
            match result {
                Ok(data) => {
                    self.refresh(&key, data);
                    report.refreshed.push(key);
                }
                Err(source) => {
                    tracing::warn!(key = %key, error = %source, "revalidation failed, keeping stale entry");
                    self.inner.events.emit(FrameworkEvent::RevalidationFailed {
                        key: key.clone(),
                        error: source.to_string(),
                    });
                    report.failures.push(CacheError::CacheRevalidationFailed { key, source });
                }
            }
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            refreshed = report.refreshed.len(),
            failed = report.failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "revalidation pass finished"
        );
        self.inner.events.emit(FrameworkEvent::RevalidationFinished {
            refreshed: report.refreshed.len(),
            failed: report.failures.len(),
            elapsed,
        });

        report
    }

    /// Queue `key` and restart the debounce timer.
    pub(crate) fn schedule_revalidation(&self, key: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(key = %key, "no runtime available, revalidation not scheduled");
            return;
        };

        let newly_queued = self
            .inner
            .pending
            .lock()
            .expect("pending set mutex poisoned")
            .insert(key.to_string());
        if newly_queued {
            self.inner.events.emit(FrameworkEvent::RevalidationScheduled { key: key.to_string() });
        }

        let cache = self.clone();
        let delay: Duration = self.inner.debounce;
        let mut timer = self.inner.timer.lock().expect("timer mutex poisoned");
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(runtime.spawn(async move {
            time::sleep(delay).await;
            cache.flush_pending();
        }));
    }

    /// Drain the pending set into a revalidation pass on its own task.
    fn flush_pending(&self) {
        let keys: Vec<String> = std::mem::take(
            &mut *self.inner.pending.lock().expect("pending set mutex poisoned"),
        )
        .into_iter()
        .collect();

        if keys.is_empty() {
            return;
        }

        let cache = self.clone();
        tokio::spawn(async move {
            let report = cache.revalidate_keys(keys).await;
            if report.skipped {
                tracing::debug!("debounced revalidation dropped, pass already in flight");
            }
        });
    }

    /// Replace the data of an existing entry and reset its age.
    ///
    /// Entries removed while their refetch was in flight stay removed.
    fn refresh(&self, key: &str, data: Value) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.data = data;
            entry.created_at = Instant::now();
            entry.stale = false;
        }
    }
}
