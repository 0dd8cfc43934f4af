//! Response mapping.
//!
//! # Responsibilities
//! - Map navigation outcomes and routing errors to HTTP status codes
//! - Render navigations and errors as JSON bodies
//!
//! # Design Decisions
//! - Halted navigations are 403: a handler decided the request may not continue
//! - Cancelled navigations are 503, prefetch failures 502 (an upstream fetcher failed)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::middleware::ChainOutcome;
use crate::routing::{Navigation, RouteError, RouteResult};

pub fn status_for_outcome(outcome: &ChainOutcome) -> StatusCode {
    match outcome {
        ChainOutcome::Completed => StatusCode::OK,
        ChainOutcome::Halted { .. } => StatusCode::FORBIDDEN,
        ChainOutcome::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn status_for_error(error: &RouteError) -> StatusCode {
    match error {
        RouteError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        RouteError::NavigationCancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RouteError::PrefetchFailed { .. } => StatusCode::BAD_GATEWAY,
        RouteError::RouteHasNoPage { .. }
        | RouteError::RouteExecutionFailed { .. }
        | RouteError::InvalidSegment { .. }
        | RouteError::DuplicateRoute { .. }
        | RouteError::ConflictingParameter { .. }
        | RouteError::UnknownMiddleware { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Stable identifier for an error, used in JSON bodies.
pub fn error_kind(error: &RouteError) -> &'static str {
    match error {
        RouteError::InvalidSegment { .. } => "invalid_segment",
        RouteError::DuplicateRoute { .. } => "duplicate_route",
        RouteError::ConflictingParameter { .. } => "conflicting_parameter",
        RouteError::UnknownMiddleware { .. } => "unknown_middleware",
        RouteError::RouteNotFound { .. } => "route_not_found",
        RouteError::RouteHasNoPage { .. } => "route_has_no_page",
        RouteError::RouteExecutionFailed { .. } => "route_execution_failed",
        RouteError::NavigationCancelled { .. } => "navigation_cancelled",
        RouteError::PrefetchFailed { .. } => "prefetch_failed",
    }
}

/// Render the result of one navigation.
pub fn navigation_response(result: &RouteResult<Navigation>) -> Response {
    match result {
        Ok(navigation) => {
            let status = status_for_outcome(&navigation.outcome);
            (status, Json(navigation.view())).into_response()
        }
        Err(error) => {
            let body = json!({
                "error": {
                    "kind": error_kind(error),
                    "message": error.to_string(),
                }
            });
            (status_for_error(error), Json(body)).into_response()
        }
    }
}
