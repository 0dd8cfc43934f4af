//! Cache entries and their freshness rules.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

/// Time-to-live of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ttl {
    /// Expires after the duration. `Duration::ZERO` never expires but is
    /// always stale, so every read triggers a revalidation.
    Finite(Duration),
    /// Never expires by time; only explicit invalidation removes it.
    Infinite,
}

impl Ttl {
    pub fn from_millis(ms: u64) -> Self {
        Ttl::Finite(Duration::from_millis(ms))
    }

    pub const fn immediate() -> Self {
        Ttl::Finite(Duration::ZERO)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::Finite(Duration::from_secs(60))
    }
}

/// How a value should be cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Ttl,
    pub tags: BTreeSet<String>,
}

impl CacheOptions {
    pub fn new(ttl: Ttl) -> Self {
        Self {
            ttl,
            tags: BTreeSet::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// One cached value.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Value,
    pub created_at: Instant,
    pub ttl: Ttl,
    pub tags: BTreeSet<String>,
    pub stale: bool,
}

impl CacheEntry {
    /// A fresh entry created now.
    pub fn new(data: Value, options: CacheOptions) -> Self {
        Self {
            data,
            created_at: Instant::now(),
            ttl: options.ttl,
            tags: options.tags,
            stale: false,
        }
    }

    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.ttl,
            tags: self.tags.clone(),
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// `age > ttl` for a non-zero finite ttl.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Ttl::Finite(ttl) if !ttl.is_zero() => self.age(now) > ttl,
            _ => false,
        }
    }

    /// `age > ratio * ttl`; a zero ttl is always stale.
    pub fn is_stale(&self, now: Instant, ratio: f64) -> bool {
        match self.ttl {
            Ttl::Finite(ttl) if ttl.is_zero() => true,
            Ttl::Finite(ttl) => self.age(now) > ttl.mul_f64(ratio),
            Ttl::Infinite => false,
        }
    }

    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.contains(t.as_ref()))
    }
}
