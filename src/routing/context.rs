//! Per-navigation context passed through the middleware chain.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::DataCache;

/// Everything a handler or the renderer knows about one navigation.
#[derive(Debug, Clone, Serialize)]
pub struct RouteContext {
    navigation_id: Uuid,
    request_id: Option<String>,
    pathname: String,
    route: Option<String>,
    params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    data: Map<String, Value>,
    locals: Map<String, Value>,
    #[serde(skip)]
    cache: DataCache,
    #[serde(skip)]
    cancellation: CancellationToken,
}

impl RouteContext {
    /// Build a context from a request target such as `/users/7?tab=posts#top`.
    ///
    /// The context gets a detached cache and a fresh cancellation token.
    pub fn new(target: &str) -> Self {
        let (pathname, query) = split_target(target);
        Self {
            navigation_id: Uuid::new_v4(),
            request_id: None,
            pathname: pathname.to_string(),
            route: None,
            params: BTreeMap::new(),
            query: parse_query(query),
            data: Map::new(),
            locals: Map::new(),
            cache: DataCache::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_cache(mut self, cache: DataCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn navigation_id(&self) -> Uuid {
        self.navigation_id
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// Pattern of the matched route.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Route data loaded through the cache.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn insert_data(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    /// Scratch values written by middleware.
    pub fn locals(&self) -> &Map<String, Value> {
        &self.locals
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn insert_local(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.locals.insert(name.into(), value.into());
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Split a request target into pathname and raw query, dropping any fragment.
pub fn split_target(target: &str) -> (&str, &str) {
    let without_fragment = target.split_once('#').map_or(target, |(before, _)| before);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_fragment, ""),
    }
}

/// Decode a query string. Repeated keys keep the last value.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
