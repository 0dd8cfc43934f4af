//! Routing error definitions.

use thiserror::Error;

use crate::cache::CacheError;
use crate::middleware::MiddlewareError;

/// Errors raised while parsing a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Bracketed name is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid segment name `{name}` in `{segment}`")]
    InvalidSegmentName { segment: String, name: String },

    /// A catch-all segment is followed by further segments.
    #[error("catch-all segment `{segment}` must be the last segment")]
    CatchAllNotLast { segment: String },
}

/// Errors raised while registering routes or executing a navigation.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The route pattern could not be parsed.
    #[error("invalid route `{path}`: {source}")]
    InvalidSegment {
        path: String,
        #[source]
        source: SegmentError,
    },

    /// A route with the same pattern is already registered.
    #[error("route `{path}` is already registered")]
    DuplicateRoute { path: String },

    /// Two parameter names compete for the same position in the tree.
    #[error("route `{path}` names parameter `{found}` where `{existing}` is already registered")]
    ConflictingParameter {
        path: String,
        existing: String,
        found: String,
    },

    /// Configuration referenced middleware that was never registered.
    #[error("route `{path}` references unknown middleware `{name}`")]
    UnknownMiddleware { path: String, name: String },

    /// No registered route matches the path.
    #[error("no route matches `{pathname}`")]
    RouteNotFound { pathname: String },

    /// The matched route has no page to render.
    #[error("route `{path}` has no page")]
    RouteHasNoPage { path: String },

    /// A middleware handler failed during navigation.
    #[error("navigation to `{pathname}` failed: {source}")]
    RouteExecutionFailed {
        pathname: String,
        #[source]
        source: MiddlewareError,
    },

    /// The navigation was cancelled before the chain completed.
    #[error("navigation to `{pathname}` was cancelled before `{at}`")]
    NavigationCancelled { pathname: String, at: String },

    /// A route data dependency could not be loaded.
    #[error("data prefetch for `{pathname}` failed: {source}")]
    PrefetchFailed {
        pathname: String,
        #[source]
        source: CacheError,
    },
}

/// Result alias for routing operations.
pub type RouteResult<T> = Result<T, RouteError>;
