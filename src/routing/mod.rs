//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration:
//!     RouteConfig (optionally via group())
//!     → segment.rs (parse pattern into typed segments)
//!     → tree.rs (insert into trie, reject conflicts before mutating)
//!
//! Navigation (router.rs):
//!     pathname
//!     → matcher.rs (score every consistent branch, best wins)
//!     → validate (route must name a page)
//!     → middleware chain (builtins → node-scoped → global)
//!     → data prefetch through the cache
//!     → Navigation { route, score, context, outcome }
//! ```
//!
//! # Design Decisions
//! - Static beats dynamic beats optional beats catch-all, decided by score
//! - Deterministic: same tree and input always match the same route
//! - Registration errors leave the tree untouched

pub mod context;
pub mod error;
pub mod group;
pub mod matcher;
pub mod route;
pub mod router;
pub mod segment;
pub mod tree;

pub use context::RouteContext;
pub use error::{RouteError, RouteResult, SegmentError};
pub use group::{group, GroupOptions};
pub use matcher::{match_route, validate_match, RouteMatch};
pub use route::{DataDependency, RouteConfig, RouteSummary};
pub use router::{MiddlewareRegistry, NavigateOptions, Navigation, NavigationView, Router};
pub use segment::{parse_path, Segment};
pub use tree::{DuplicatePolicy, RouteNode, RouteTree};
