//! Middleware error definitions.

use thiserror::Error;

/// Boxed error returned by middleware handlers and fetchers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A handler failed; carries the handler's name and the original cause.
#[derive(Debug, Error)]
#[error("middleware `{middleware}` failed: {source}")]
pub struct MiddlewareError {
    pub middleware: String,
    #[source]
    pub source: BoxError,
}

impl MiddlewareError {
    pub fn new(middleware: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            middleware: middleware.into(),
            source: source.into(),
        }
    }

    /// Attribute `error` to `middleware` unless an inner handler already claimed it.
    pub fn attribute(middleware: &str, error: BoxError) -> Self {
        match error.downcast::<MiddlewareError>() {
            Ok(inner) => *inner,
            Err(error) => Self::new(middleware, error),
        }
    }

    pub fn middleware(&self) -> &str {
        &self.middleware
    }
}
