//! Data cache and revalidation engine.
//!
//! # Data Flow
//! ```text
//! DataCache::fetch(key, options, fetcher)
//!     → get(key)
//!         expired → evict, miss
//!         stale   → serve, enqueue key → debounce timer (reset on every signal)
//!         fresh   → serve
//!     → miss: fetcher → set(key) → register fetcher for key
//!
//! Debounce timer fires:
//!     → drain pending keys
//!     → revalidation pass (at most one in flight, others are no-ops)
//!     → refetch each key once, concurrently; collect failures per key
//! ```
//!
//! # Design Decisions
//! - Cheap `Clone` handle over shared state; no global instance
//! - Stale entries stay readable while their revalidation fails
//! - Timestamps use `tokio::time::Instant` (monotonic, pausable in tests)

pub mod entry;
pub mod error;
pub mod fetcher;
pub mod revalidation;
pub mod store;

pub use entry::{CacheEntry, CacheOptions, Ttl};
pub use error::CacheError;
pub use fetcher::{fetcher_fn, Fetcher};
pub use revalidation::RevalidationReport;
pub use store::DataCache;
