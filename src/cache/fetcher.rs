//! Data fetchers used for read-through and revalidation.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::middleware::BoxError;

/// Loads the current value for a cache key.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, key: &str) -> BoxFuture<'static, Result<Value, BoxError>>;
}

impl<F, Fut> Fetcher for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    fn fetch(&self, key: &str) -> BoxFuture<'static, Result<Value, BoxError>> {
        Box::pin(self(key.to_string()))
    }
}

/// Wrap a closure as a shareable fetcher.
pub fn fetcher_fn<F, Fut>(f: F) -> Arc<dyn Fetcher>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    Arc::new(f)
}
