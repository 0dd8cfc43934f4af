//! Route definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheOptions, Fetcher};
use crate::middleware::Middleware;

/// A registrable route: a path pattern plus what the renderer needs for it.
#[derive(Debug, Clone, Default)]
pub struct RouteConfig {
    /// Path pattern, e.g. `/users/[id]`.
    pub path: String,

    /// Route identifier for logging and reverse lookups.
    pub name: Option<String>,

    /// Page/view handed to the rendering collaborator.
    pub page: Option<String>,

    /// Layout wrapping the page.
    pub layout: Option<String>,

    /// Middleware scoped to this route and its descendants.
    pub middleware: Vec<Middleware>,

    /// Data loaded through the cache once the middleware chain completes.
    pub data: Vec<DataDependency>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
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

    pub fn data(mut self, dependency: DataDependency) -> Self {
        self.data.push(dependency);
        self
    }

    /// Serializable view without handlers.
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            path: self.path.clone(),
            name: self.name.clone(),
            page: self.page.clone(),
            layout: self.layout.clone(),
            middleware: self.middleware.iter().map(|m| m.name().to_string()).collect(),
            data: self.data.iter().map(|d| d.name.clone()).collect(),
        }
    }
}

/// A cache-backed value a route needs before render.
#[derive(Clone)]
pub struct DataDependency {
    /// Key under which the value appears in `RouteContext::data`.
    pub name: String,

    /// Cache key template; `{param}` is replaced by the matched parameter.
    pub key: String,

    pub options: CacheOptions,

    pub fetcher: Arc<dyn Fetcher>,
}

impl DataDependency {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        options: CacheOptions,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            options,
            fetcher,
        }
    }

    /// Render the cache key for a set of matched parameters.
    ///
    /// Single pass over the template: substituted values are never scanned
    /// again. Unknown or unterminated placeholders are left in place.
    pub fn cache_key(&self, params: &BTreeMap<String, String>) -> String {
        let mut key = String::with_capacity(self.key.len());
        let mut rest = self.key.as_str();

        while let Some(open) = rest.find('{') {
            key.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                rest = &rest[open..];
                break;
            };

            let name = &after[..close];
            match params.get(name) {
                Some(value) => key.push_str(value),
                None => {
                    key.push('{');
                    key.push_str(name);
                    key.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        key.push_str(rest);
        key
    }
}

impl fmt::Debug for DataDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataDependency")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// What a route looks like from the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub path: String,
    pub name: Option<String>,
    pub page: Option<String>,
    pub layout: Option<String>,
    pub middleware: Vec<String>,
    pub data: Vec<String>,
}
