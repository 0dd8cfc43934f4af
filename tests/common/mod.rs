//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_router::cache::{fetcher_fn, Fetcher};
use app_router::config::{AppConfig, CacheConfig, RouterConfig};
use app_router::http::HttpServer;
use app_router::middleware::{Middleware, Next};
use app_router::routing::RouteContext;
use app_router::{DataCache, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Router with default configuration and its own cache.
pub fn router() -> Router {
    Router::new(RouterConfig::default(), DataCache::new(&CacheConfig::default()))
}

/// Shared log of handler names, in the order they ran.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn recorded(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Middleware that appends its name to `log` and continues.
pub fn recording(name: &str, log: &CallLog) -> Middleware {
    let log = Arc::clone(log);
    let label = name.to_string();
    Middleware::new(name, move |ctx: RouteContext, next: Next| {
        let log = Arc::clone(&log);
        let label = label.clone();
        async move {
            log.lock().unwrap().push(label);
            next.run(ctx).await
        }
    })
}

/// Fetcher returning `{"key": key, "version": n}`, counting its calls.
pub fn counting_fetcher(calls: &Arc<AtomicUsize>) -> Arc<dyn Fetcher> {
    let calls = Arc::clone(calls);
    fetcher_fn(move |key| {
        let calls = Arc::clone(&calls);
        async move {
            let version = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!({ "key": key, "version": version }))
        }
    })
}

/// Serve `router` on an ephemeral port. Cancel the token to stop it.
pub async fn start_server(router: Router, config: &AppConfig) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = HttpServer::new(Arc::new(router), config);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
