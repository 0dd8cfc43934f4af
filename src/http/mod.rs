//! HTTP adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, trace layers)
//!     → Router::execute_with (match, middleware, prefetch)
//!     → response.rs (Navigation or RouteError → status + JSON)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::HttpServer;
