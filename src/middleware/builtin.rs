//! Built-in middleware installed at the front of every router's global chain.
//!
//! Both observe and re-raise; neither swallows errors.

use tokio::time::Instant;

use crate::middleware::{Middleware, Next};
use crate::routing::RouteContext;

pub const ERROR_OBSERVER: &str = "builtin:error-observer";
pub const TIMING: &str = "builtin:timing";

/// Logs any error raised further down the chain, then re-raises it.
pub fn error_observer() -> Middleware {
    Middleware::new(ERROR_OBSERVER, |ctx: RouteContext, next: Next| async move {
        let pathname = ctx.pathname().to_string();
        let navigation_id = ctx.navigation_id();

        next.run(ctx).await.inspect_err(|err| {
            tracing::error!(
                pathname = %pathname,
                navigation_id = %navigation_id,
                error = %err,
                "middleware chain failed"
            );
        })
    })
}

/// Measures wall-clock time spent in the rest of the chain.
///
/// Stores `duration_ms` in the context locals on success.
pub fn timing() -> Middleware {
    Middleware::new(TIMING, |ctx: RouteContext, next: Next| async move {
        let pathname = ctx.pathname().to_string();
        let started = Instant::now();

        let result = next.run(ctx).await;
        let elapsed = started.elapsed();

        tracing::debug!(
            pathname = %pathname,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            ok = result.is_ok(),
            "middleware chain timed"
        );

        result.map(|mut ctx| {
            ctx.insert_local("duration_ms", elapsed.as_secs_f64() * 1000.0);
            ctx
        })
    })
}

/// The built-in set, in installation order.
pub fn defaults() -> Vec<Middleware> {
    vec![error_observer(), timing()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;

    #[tokio::test]
    async fn test_builtins_re_raise_errors() {
        let mut handlers = defaults();
        handlers.push(Middleware::new("failing", |_ctx, _next| async { Err("kaboom".into()) }));
        let chain = MiddlewareChain::new(handlers);

        let err = chain.execute(RouteContext::new("/x")).await.unwrap_err();
        assert_eq!(err.middleware(), "failing");
    }

    #[tokio::test]
    async fn test_timing_records_duration() {
        let chain = MiddlewareChain::new(defaults());
        let result = chain.execute(RouteContext::new("/x")).await.unwrap();
        assert!(result.outcome.is_completed());
        assert!(result.context.local("duration_ms").is_some_and(|v| v.is_f64()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timing_follows_the_runtime_clock() {
        let mut handlers = vec![timing()];
        handlers.push(Middleware::new("slow", |ctx, next: Next| async move {
            tokio::time::sleep(std::time::Duration::from_millis(40)).await;
            next.run(ctx).await
        }));
        let chain = MiddlewareChain::new(handlers);

        let result = chain.execute(RouteContext::new("/x")).await.unwrap();
        let elapsed = result.context.local("duration_ms").and_then(|v| v.as_f64()).unwrap();
        assert!((40.0..41.0).contains(&elapsed), "elapsed {elapsed}");
    }
}
