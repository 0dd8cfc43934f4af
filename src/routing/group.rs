//! Route groups.
//!
//! A group is a pure transform over route definitions: it joins a path
//! prefix, prepends the group's middleware and fills in a default layout.
//! It never touches the tree; the router registers the resulting routes.

use crate::middleware::Middleware;
use crate::routing::route::RouteConfig;

/// Settings shared by every route in a group.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    pub prefix: Option<String>,
    pub layout: Option<String>,
    pub middleware: Vec<Middleware>,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// Fan group settings into each child route.
pub fn group(options: &GroupOptions, routes: Vec<RouteConfig>) -> Vec<RouteConfig> {
    routes
        .into_iter()
        .map(|mut route| {
            if let Some(prefix) = &options.prefix {
                route.path = join_paths(prefix, &route.path);
            }
            if route.layout.is_none() {
                route.layout.clone_from(&options.layout);
            }
            let mut middleware = options.middleware.clone();
            middleware.append(&mut route.middleware);
            route.middleware = middleware;
            route
        })
        .collect()
}

pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{path}"),
    }
}
