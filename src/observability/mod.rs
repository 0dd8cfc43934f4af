//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing macros (structured log events)
//!         → logging.rs (subscriber: env filter + pretty/json fmt layer)
//!     → FrameworkEvent on the event bus
//!         → metrics.rs (MetricsPlugin → `metrics` facade)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Whatever recorder the host installs for the `metrics` facade
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Navigation and request IDs appear as log fields
//! - Metrics are derived from events, so the core never calls the facade directly

pub mod logging;
pub mod metrics;

pub use metrics::MetricsPlugin;
