//! Metrics collection.
//!
//! # Responsibilities
//! - Translate framework events into `metrics` facade calls
//! - Keep metric names and labels in one place
//!
//! # Metrics
//! - `router_navigations_total` (counter): navigations by outcome
//! - `router_navigation_duration_seconds` (histogram): navigation latency
//! - `router_routes_registered` (gauge): registered route count
//! - `cache_lookups_total` (counter): lookups by result (hit, stale, miss)
//! - `cache_evictions_total` (counter): expired entries removed
//! - `cache_revalidation_failures_total` (counter): failed refetches
//!
//! # Design Decisions
//! - No exporter is installed here; without a recorder every call is a no-op
//! - Labels are static strings to keep cardinality bounded

use std::time::Duration;

use crate::events::{FrameworkEvent, Plugin};
use crate::middleware::ChainOutcome;

pub fn record_navigation(outcome: &'static str, elapsed: Option<Duration>) {
    metrics::counter!("router_navigations_total", "outcome" => outcome).increment(1);
    if let Some(elapsed) = elapsed {
        metrics::histogram!("router_navigation_duration_seconds", "outcome" => outcome)
            .record(elapsed.as_secs_f64());
    }
}

pub fn record_route_registered() {
    metrics::gauge!("router_routes_registered").increment(1.0);
}

pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_eviction() {
    metrics::counter!("cache_evictions_total").increment(1);
}

pub fn record_revalidation_failure() {
    metrics::counter!("cache_revalidation_failures_total").increment(1);
}

fn outcome_label(outcome: &ChainOutcome) -> &'static str {
    match outcome {
        ChainOutcome::Completed => "completed",
        ChainOutcome::Halted { .. } => "halted",
        ChainOutcome::Cancelled { .. } => "cancelled",
    }
}

/// Plugin recording metrics for every framework event.
#[derive(Debug, Default)]
pub struct MetricsPlugin;

impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_event(&self, event: &FrameworkEvent) {
        match event {
            FrameworkEvent::RouteRegistered { .. } => record_route_registered(),
            FrameworkEvent::NavigationFinished { outcome, elapsed, .. } => {
                record_navigation(outcome_label(outcome), Some(*elapsed));
            }
            FrameworkEvent::RouteNotFound { .. } => record_navigation("not_found", None),
            FrameworkEvent::NavigationFailed { .. } => record_navigation("failed", None),
            FrameworkEvent::CacheHit { stale: false, .. } => record_cache_lookup("hit"),
            FrameworkEvent::CacheHit { stale: true, .. } => record_cache_lookup("stale"),
            FrameworkEvent::CacheMiss { .. } => record_cache_lookup("miss"),
            FrameworkEvent::CacheEvicted { .. } => record_cache_eviction(),
            FrameworkEvent::RevalidationFailed { .. } => record_revalidation_failure(),
            FrameworkEvent::PluginRegistered { .. }
            | FrameworkEvent::NavigationStarted { .. }
            | FrameworkEvent::RouteMatched { .. }
            | FrameworkEvent::RevalidationScheduled { .. }
            | FrameworkEvent::RevalidationFinished { .. } => {}
        }
    }
}
