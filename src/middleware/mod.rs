//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! RouteMatch (node-scoped middleware, root → leaf)
//!     + Router global middleware (built-ins first)
//!     → chain.rs (stable partition: Before, then After)
//!     → Next::run(ctx) → handler[0] → Next::run(ctx) → handler[1] → ...
//!     → ChainResult { context, outcome }
//! ```
//!
//! # Design Decisions
//! - Explicit continuation: a handler continues the chain by calling `next.run(ctx)`
//! - Returning without calling `next` is reported as `ChainOutcome::Halted`
//! - Errors are attributed to the failing handler and pass unchanged through wrappers
//! - Cancellation is checked at every handler boundary

pub mod builtin;
pub mod chain;
pub mod error;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::routing::RouteContext;

pub use chain::{ChainOutcome, ChainResult, MiddlewareChain, Next};
pub use error::{BoxError, MiddlewareError};

/// Gross ordering of a handler within the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Before,
    After,
}

/// A middleware handler.
///
/// Implemented for every `Fn(RouteContext, Next) -> impl Future<Output = Result<RouteContext, BoxError>>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RouteContext, next: Next) -> BoxFuture<'static, Result<RouteContext, BoxError>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RouteContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RouteContext, BoxError>> + Send + 'static,
{
    fn call(&self, ctx: RouteContext, next: Next) -> BoxFuture<'static, Result<RouteContext, BoxError>> {
        Box::pin(self(ctx, next))
    }
}

/// Result of a guard predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(String),
}

/// A named handler with its phase.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    phase: Phase,
    handler: Arc<dyn Handler>,
}

impl Middleware {
    /// Create a `Before`-phase middleware from a closure.
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RouteContext, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RouteContext, BoxError>> + Send + 'static,
    {
        Self::from_handler(name, Arc::new(handler))
    }

    /// Create a `Before`-phase middleware from a handler object.
    pub fn from_handler(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: Arc::from(name.into()),
            phase: Phase::Before,
            handler,
        }
    }

    /// Synchronous guard: `Flow::Continue` runs the rest of the chain,
    /// `Flow::Stop(reason)` halts it with an explicit reason.
    pub fn guard<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RouteContext) -> Flow + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Self::new(name, move |ctx: RouteContext, next: Next| {
            let predicate = Arc::clone(&predicate);
            async move {
                match predicate(&ctx) {
                    Flow::Continue => next.run(ctx).await,
                    Flow::Stop(reason) => {
                        next.halt(reason);
                        Ok(ctx)
                    }
                }
            }
        })
    }

    /// Move this middleware to the `After` phase.
    pub fn after(mut self) -> Self {
        self.phase = Phase::After;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether both values wrap the same handler instance.
    pub fn same_handler(&self, other: &Middleware) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }

    pub(crate) fn call(&self, ctx: RouteContext, next: Next) -> BoxFuture<'static, Result<RouteContext, BoxError>> {
        self.handler.call(ctx, next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
