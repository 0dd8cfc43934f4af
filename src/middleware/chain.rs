//! Ordered middleware execution.
//!
//! # Responsibilities
//! - Order handlers: every `Before` handler precedes every `After` handler,
//!   registration order within a phase
//! - Drive the chain through explicit `Next` continuations
//! - Report how the chain ended (completed, halted, cancelled)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::middleware::error::{BoxError, MiddlewareError};
use crate::middleware::{Middleware, Phase};
use crate::routing::RouteContext;

/// How a chain run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainOutcome {
    /// Every handler continued; the end of the chain was reached.
    Completed,
    /// A handler returned without calling `next`.
    Halted { by: String, reason: Option<String> },
    /// The context's cancellation token fired before the handler `at` ran.
    Cancelled { at: String },
}

impl ChainOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChainOutcome::Completed)
    }
}

/// Context handed back by the chain plus how the run ended.
#[derive(Debug)]
pub struct ChainResult {
    pub context: RouteContext,
    pub outcome: ChainOutcome,
}

/// Per-run bookkeeping shared by every `Next` of one execution.
#[derive(Debug, Default)]
struct ChainState {
    /// Highest handler index entered, plus one.
    entered: AtomicUsize,
    completed: AtomicBool,
    cancelled_at: Mutex<Option<usize>>,
    halt_reason: Mutex<Option<String>>,
}

/// Continuation handed to each handler.
pub struct Next {
    handlers: Arc<[Middleware]>,
    index: usize,
    state: Arc<ChainState>,
}

impl Next {
    /// Run the rest of the chain.
    pub async fn run(self, ctx: RouteContext) -> Result<RouteContext, BoxError> {
        if ctx.is_cancelled() {
            let mut cancelled = self.state.cancelled_at.lock().expect("chain state mutex poisoned");
            cancelled.get_or_insert(self.index);
            return Ok(ctx);
        }

        let Some(middleware) = self.handlers.get(self.index).cloned() else {
            self.state.completed.store(true, Ordering::SeqCst);
            return Ok(ctx);
        };

        self.state.entered.fetch_max(self.index + 1, Ordering::SeqCst);
        tracing::trace!(middleware = %middleware.name(), index = self.index, "entering middleware");

        let next = Next {
            handlers: Arc::clone(&self.handlers),
            index: self.index + 1,
            state: Arc::clone(&self.state),
        };

        middleware
            .call(ctx, next)
            .await
            .map_err(|err| Box::new(MiddlewareError::attribute(middleware.name(), err)) as BoxError)
    }

    /// Stop the chain here with an explicit reason.
    ///
    /// The calling handler returns its context afterwards instead of running `next`.
    pub fn halt(self, reason: impl Into<String>) {
        let mut slot = self.state.halt_reason.lock().expect("chain state mutex poisoned");
        *slot = Some(reason.into());
    }

    /// Name of the handler that runs next, if any.
    pub fn upcoming(&self) -> Option<&str> {
        self.handlers.get(self.index).map(Middleware::name)
    }
}

/// An ordered, two-phase sequence of handlers.
#[derive(Debug, Clone)]
pub struct MiddlewareChain {
    handlers: Arc<[Middleware]>,
}

impl MiddlewareChain {
    /// Build a chain. `Before` handlers keep their relative order ahead of
    /// `After` handlers.
    pub fn new(middleware: impl IntoIterator<Item = Middleware>) -> Self {
        let mut handlers: Vec<Middleware> = middleware.into_iter().collect();
        handlers.sort_by_key(Middleware::phase);
        Self {
            handlers: handlers.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(Middleware::name).collect()
    }

    pub fn phase_of(&self, name: &str) -> Option<Phase> {
        self.handlers.iter().find(|m| m.name() == name).map(Middleware::phase)
    }

    /// Run every handler against `ctx`.
    pub async fn execute(&self, ctx: RouteContext) -> Result<ChainResult, MiddlewareError> {
        let state = Arc::new(ChainState::default());
        let next = Next {
            handlers: Arc::clone(&self.handlers),
            index: 0,
            state: Arc::clone(&state),
        };

        let context = next
            .run(ctx)
            .await
            .map_err(|err| MiddlewareError::attribute("<chain>", err))?;

        let outcome = self.outcome(&state);
        if let ChainOutcome::Halted { by, reason } = &outcome {
            tracing::debug!(middleware = %by, reason = ?reason, "middleware chain halted");
        }

        Ok(ChainResult { context, outcome })
    }

    fn outcome(&self, state: &ChainState) -> ChainOutcome {
        if state.completed.load(Ordering::SeqCst) {
            return ChainOutcome::Completed;
        }

        let cancelled_at = *state.cancelled_at.lock().expect("chain state mutex poisoned");
        if let Some(index) = cancelled_at {
            let at = self
                .handlers
                .get(index)
                .map_or_else(|| "<end>".to_string(), |m| m.name().to_string());
            return ChainOutcome::Cancelled { at };
        }

        let entered = state.entered.load(Ordering::SeqCst);
        let by = entered
            .checked_sub(1)
            .and_then(|index| self.handlers.get(index))
            .map_or_else(|| "<chain>".to_string(), |m| m.name().to_string());
        let reason = state.halt_reason.lock().expect("chain state mutex poisoned").take();

        ChainOutcome::Halted { by, reason }
    }
}
