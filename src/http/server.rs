//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the navigation handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Dispatch every GET to the framework router

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::response::navigation_response;
use crate::routing::{NavigateOptions, Router as AppRouter};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<AppRouter>,
}

/// HTTP front end for an `AppRouter`.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(app_router: Arc<AppRouter>, config: &AppConfig) -> Self {
        let state = AppState { router: app_router };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(navigate_handler))
            .route("/{*path}", get(navigate_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The Axum router, for embedding or in-process tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Runs one navigation per request.
///
/// The navigation is cancelled if the request future is dropped, e.g. when
/// the client disconnects or the timeout layer fires.
async fn navigate_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();

    tracing::debug!(
        request_id = request_id.as_deref().unwrap_or("unknown"),
        target = %target,
        "navigating"
    );

    let result = state
        .router
        .execute_with(
            &target,
            NavigateOptions {
                request_id,
                cancellation: Some(token),
            },
        )
        .await;

    navigation_response(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::cache::DataCache;
    use crate::config::RouterConfig;
    use crate::routing::RouteConfig;

    fn server() -> Router {
        let router = AppRouter::new(RouterConfig::default(), DataCache::default());
        router.add_route(RouteConfig::new("/").page("home")).unwrap();
        HttpServer::new(Arc::new(router), &AppConfig::default()).into_router()
    }

    #[tokio::test]
    async fn test_root_navigates_in_process() {
        let response = server()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = server()
            .oneshot(Request::builder().uri("/missing/page").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
