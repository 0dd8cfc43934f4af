//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every route pattern parses and names a page
//! - Validate value ranges (stale ratio, bind address)
//! - Detect duplicate routes when duplicates are rejected
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::routing::segment::parse_path;
use crate::routing::{DuplicatePolicy, SegmentError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),

    #[error("stale_ratio must be within (0, 1], got {0}")]
    StaleRatio(f64),

    #[error("route `{path}`: {source}")]
    Pattern { path: String, source: SegmentError },

    #[error("route `{0}` has no page")]
    MissingPage(String),

    #[error("route `{0}` is defined more than once")]
    DuplicateRoute(String),
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let ratio = config.cache.stale_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        errors.push(ValidationError::StaleRatio(ratio));
    }

    let grouped = config.groups.iter().flat_map(|g| g.routes.iter());
    for route in config.routes.iter().chain(grouped) {
        if route.page.is_none() {
            errors.push(ValidationError::MissingPage(route.path.clone()));
        }
    }

    let mut seen = HashSet::new();
    for path in config.flattened_paths() {
        let segments = match parse_path(&path) {
            Ok(segments) => segments,
            Err(source) => {
                errors.push(ValidationError::Pattern { path, source });
                continue;
            }
        };

        let canonical: Vec<String> = segments.iter().map(ToString::to_string).collect();
        if !seen.insert(canonical) && config.router.on_duplicate == DuplicatePolicy::Reject {
            errors.push(ValidationError::DuplicateRoute(path));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
