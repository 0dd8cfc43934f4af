//! Lifecycle events and plugins.
//!
//! # Data Flow
//! ```text
//! Router / DataCache
//!     → EventBus::emit(FrameworkEvent)
//!     → plugins (synchronous, registration order)
//!     → broadcast subscribers (async, lossy when lagging)
//! ```
//!
//! # Design Decisions
//! - Closed event set: every payload has a fixed shape and listeners match exhaustively
//! - Emitting never blocks and never fails, even with no listeners
//! - One bus per composition root, shared by the router and its cache

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::middleware::{ChainOutcome, Middleware};

const CHANNEL_CAPACITY: usize = 256;

/// Everything the core reports to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameworkEvent {
    RouteRegistered { path: String },
    PluginRegistered { name: String },
    NavigationStarted { pathname: String },
    RouteMatched { pathname: String, route: String, score: u32 },
    RouteNotFound { pathname: String },
    NavigationFinished { pathname: String, outcome: ChainOutcome, elapsed: Duration },
    NavigationFailed { pathname: String, error: String },
    CacheHit { key: String, stale: bool },
    CacheMiss { key: String },
    CacheEvicted { key: String },
    RevalidationScheduled { key: String },
    RevalidationFinished { refreshed: usize, failed: usize, elapsed: Duration },
    RevalidationFailed { key: String, error: String },
}

/// Extension point for packages that observe the core or contribute middleware.
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Global middleware installed when the plugin is registered.
    fn middleware(&self) -> Vec<Middleware> {
        Vec::new()
    }

    fn on_event(&self, _event: &FrameworkEvent) {}
}

/// Fan-out point for `FrameworkEvent`s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FrameworkEvent>,
    plugins: Arc<RwLock<Vec<Arc<dyn Plugin>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            plugins: Arc::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FrameworkEvent> {
        self.tx.subscribe()
    }

    pub fn attach(&self, plugin: Arc<dyn Plugin>) {
        self.plugins
            .write()
            .expect("event bus lock poisoned")
            .push(plugin);
    }

    /// Plugins registered from inside `on_event` see the next event, not this one.
    pub fn emit(&self, event: FrameworkEvent) {
        let plugins: Vec<Arc<dyn Plugin>> =
            self.plugins.read().expect("event bus lock poisoned").clone();
        for plugin in &plugins {
            plugin.on_event(&event);
        }
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugins = self.plugins.read().map(|p| p.len()).unwrap_or_default();
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .field("plugins", &plugins)
            .finish()
    }
}
