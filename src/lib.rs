//! Application router core: path patterns, a scoring route trie, a two-phase
//! middleware chain and a revalidating data cache.

pub mod cache;
pub mod config;
pub mod events;
pub mod http;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use cache::DataCache;
pub use config::schema::AppConfig;
pub use events::{EventBus, FrameworkEvent, Plugin};
pub use http::HttpServer;
pub use middleware::Middleware;
pub use routing::{RouteConfig, Router};
