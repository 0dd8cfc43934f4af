//! Cache error definitions.

use thiserror::Error;

use crate::middleware::BoxError;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A read-through fetch failed; nothing was stored.
    #[error("fetch for `{key}` failed: {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// Refetching a key during a revalidation pass failed. The previous entry is kept.
    #[error("revalidation of `{key}` failed: {source}")]
    CacheRevalidationFailed {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            CacheError::FetchFailed { key, .. } | CacheError::CacheRevalidationFailed { key, .. } => key,
        }
    }
}
