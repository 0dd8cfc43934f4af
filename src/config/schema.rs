//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the application.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::group::join_paths;
use crate::routing::DuplicatePolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration for the HTTP adapter.
    pub listener: ListenerConfig,

    /// Route registration behaviour.
    pub router: RouterConfig,

    /// Data cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Top-level route definitions.
    pub routes: Vec<RouteEntry>,

    /// Route groups sharing a prefix, layout and middleware.
    pub groups: Vec<GroupEntry>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,

    /// Request timeout in seconds, enforced at the HTTP edge only.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Router behaviour.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// What to do when the same path pattern is registered twice.
    pub on_duplicate: DuplicatePolicy,
}

/// Data cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Quiet period before queued revalidations run, in milliseconds.
    pub debounce_ms: u64,

    /// Fraction of the ttl after which an entry is stale.
    pub stale_ratio: f64,

    /// Interval of the expired-entry sweeper in seconds (0 disables it).
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            stale_ratio: 0.75,
            sweep_interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Record metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// A route as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Path pattern, e.g. `/users/[id]`.
    pub path: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Page handed to the renderer.
    #[serde(default)]
    pub page: Option<String>,

    #[serde(default)]
    pub layout: Option<String>,

    /// Names resolved against the middleware registry.
    #[serde(default)]
    pub middleware: Vec<String>,
}

/// A route group as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub layout: Option<String>,

    #[serde(default)]
    pub middleware: Vec<String>,

    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl AppConfig {
    /// Every route with its group prefix applied, for validation and listings.
    pub fn flattened_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.routes.iter().map(|r| r.path.clone()).collect();
        for group in &self.groups {
            let prefix = group.prefix.as_deref().unwrap_or("");
            paths.extend(group.routes.iter().map(|route| join_paths(prefix, &route.path)));
        }
        paths
    }
}
