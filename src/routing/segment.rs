//! Path pattern parsing.
//!
//! # Responsibilities
//! - Split a route pattern into `/`-delimited components
//! - Classify each component as static, dynamic, optional or catch-all
//! - Reject malformed parameter names at registration time
//!
//! # Design Decisions
//! - Empty components are dropped (`//a/` == `/a`)
//! - Classification precedence: `[[...name]]` → `[[name]]` → `[name]` → literal
//! - Pure function: no state, same input always yields the same segments

use std::fmt;

use crate::routing::error::SegmentError;

/// One typed component of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Literal component, matched exactly.
    Static(String),
    /// `[name]`: exactly one component.
    Dynamic(String),
    /// `[[name]]`: zero or one component.
    Optional(String),
    /// `[[...name]]`: every remaining component, joined with `/`.
    CatchAll(String),
}

impl Segment {
    /// Parameter name for the bracketed kinds.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Dynamic(name) | Segment::Optional(name) | Segment::CatchAll(name) => {
                Some(name)
            }
        }
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self, Segment::CatchAll(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(value) => write!(f, "{value}"),
            Segment::Dynamic(name) => write!(f, "[{name}]"),
            Segment::Optional(name) => write!(f, "[[{name}]]"),
            Segment::CatchAll(name) => write!(f, "[[...{name}]]"),
        }
    }
}

/// Parse a route pattern into its ordered segments.
pub fn parse_path(pattern: &str) -> Result<Vec<Segment>, SegmentError> {
    let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    let mut segments = Vec::with_capacity(components.len());

    for (index, component) in components.iter().enumerate() {
        let segment = parse_segment(component)?;
        if segment.is_catch_all() && index + 1 != components.len() {
            return Err(SegmentError::CatchAllNotLast {
                segment: (*component).to_string(),
            });
        }
        segments.push(segment);
    }

    Ok(segments)
}

fn parse_segment(component: &str) -> Result<Segment, SegmentError> {
    if let Some(name) = component
        .strip_prefix("[[...")
        .and_then(|rest| rest.strip_suffix("]]"))
    {
        return checked_name(component, name).map(Segment::CatchAll);
    }

    if let Some(name) = component
        .strip_prefix("[[")
        .and_then(|rest| rest.strip_suffix("]]"))
    {
        return checked_name(component, name).map(Segment::Optional);
    }

    if let Some(name) = component
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return checked_name(component, name).map(Segment::Dynamic);
    }

    Ok(Segment::Static(component.to_string()))
}

fn checked_name(component: &str, name: &str) -> Result<String, SegmentError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(name.to_string())
    } else {
        Err(SegmentError::InvalidSegmentName {
            segment: component.to_string(),
            name: name.to_string(),
        })
    }
}
