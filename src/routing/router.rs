//! Route registration and navigation.
//!
//! # Responsibilities
//! - Own the route tree, the global middleware and the shared cache handle
//! - Drive one navigation: match, validate, run middleware, prefetch data
//! - Report every step on the event bus
//!
//! # Design Decisions
//! - Registration takes `&self`; the tree sits behind a lock that is never
//!   held across an await, so `Arc<Router>` serves concurrent navigations
//! - Built-in middleware always runs first, then node-scoped, then global;
//!   a handler instance runs at most once per navigation
//! - A halted chain is a successful navigation with a `Halted` outcome;
//!   a cancelled one is an error

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheError, DataCache};
use crate::config::{AppConfig, RouteEntry, RouterConfig};
use crate::events::{EventBus, FrameworkEvent, Plugin};
use crate::middleware::{builtin, ChainOutcome, Middleware, MiddlewareChain};
use crate::routing::context::{split_target, RouteContext};
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::group::{group, GroupOptions};
use crate::routing::matcher::{match_route, validate_match, RouteMatch};
use crate::routing::route::{RouteConfig, RouteSummary};
use crate::routing::tree::RouteTree;

/// Per-navigation options.
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// Correlation id from the caller, e.g. the `x-request-id` header.
    pub request_id: Option<String>,
    /// Cancels the navigation at the next middleware boundary.
    pub cancellation: Option<CancellationToken>,
}

/// Result of one successful `execute` call.
#[derive(Debug)]
pub struct Navigation {
    pub route: Arc<RouteConfig>,
    pub score: u32,
    pub context: RouteContext,
    pub outcome: ChainOutcome,
}

/// Serializable form of a `Navigation`.
#[derive(Debug, Serialize)]
pub struct NavigationView<'a> {
    pub route: RouteSummary,
    pub score: u32,
    pub context: &'a RouteContext,
    pub outcome: &'a ChainOutcome,
}

impl Navigation {
    pub fn view(&self) -> NavigationView<'_> {
        NavigationView {
            route: self.route.summary(),
            score: self.score,
            context: &self.context,
            outcome: &self.outcome,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.is_completed()
    }
}

/// Named middleware that configuration files can refer to.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Middleware>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `middleware` under its own name, replacing an earlier entry.
    pub fn register(&mut self, middleware: Middleware) -> &mut Self {
        self.entries.insert(middleware.name().to_string(), middleware);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Middleware> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn resolve(&self, path: &str, names: &[String]) -> RouteResult<Vec<Middleware>> {
        names
            .iter()
            .map(|name| {
                self.get(name).cloned().ok_or_else(|| RouteError::UnknownMiddleware {
                    path: path.to_string(),
                    name: name.clone(),
                })
            })
            .collect()
    }

    fn route(&self, entry: &RouteEntry) -> RouteResult<RouteConfig> {
        Ok(RouteConfig {
            path: entry.path.clone(),
            name: entry.name.clone(),
            page: entry.page.clone(),
            layout: entry.layout.clone(),
            middleware: self.resolve(&entry.path, &entry.middleware)?,
            data: Vec::new(),
        })
    }
}

/// The framework core: route tree, global middleware and data cache.
pub struct Router {
    config: RouterConfig,
    tree: RwLock<RouteTree>,
    builtins: Vec<Middleware>,
    global: RwLock<Vec<Middleware>>,
    cache: DataCache,
    events: EventBus,
}

impl Router {
    /// Create an empty router sharing `cache` and its event bus.
    pub fn new(config: RouterConfig, cache: DataCache) -> Self {
        let events = cache.events().clone();
        Self {
            config,
            tree: RwLock::new(RouteTree::new()),
            builtins: builtin::defaults(),
            global: RwLock::new(Vec::new()),
            cache,
            events,
        }
    }

    /// Build a router from configuration, resolving middleware by name.
    pub fn from_config(
        config: &AppConfig,
        cache: DataCache,
        registry: &MiddlewareRegistry,
    ) -> RouteResult<Self> {
        let router = Self::new(config.router.clone(), cache);

        for entry in &config.routes {
            router.add_route(registry.route(entry)?)?;
        }

        for entry in &config.groups {
            let prefix = entry.prefix.as_deref().unwrap_or("/");
            let options = GroupOptions {
                prefix: entry.prefix.clone(),
                layout: entry.layout.clone(),
                middleware: registry.resolve(prefix, &entry.middleware)?,
            };
            let routes = entry
                .routes
                .iter()
                .map(|route| registry.route(route))
                .collect::<RouteResult<Vec<_>>>()?;
            router.add_group(&options, routes)?;
        }

        tracing::info!(routes = router.len(), "router built from configuration");
        Ok(router)
    }

    pub fn add_route(&self, route: RouteConfig) -> RouteResult<()> {
        let path = route.path.clone();
        self.tree
            .write()
            .expect("route tree lock poisoned")
            .add_route(route, self.config.on_duplicate)?;

        tracing::debug!(path = %path, "route registered");
        self.events.emit(FrameworkEvent::RouteRegistered { path });
        Ok(())
    }

    /// Register every route of a group. Stops at the first failing route;
    /// routes registered before it stay registered.
    pub fn add_group(&self, options: &GroupOptions, routes: Vec<RouteConfig>) -> RouteResult<()> {
        for route in group(options, routes) {
            self.add_route(route)?;
        }
        Ok(())
    }

    /// Append middleware to the global chain.
    pub fn use_middleware(&self, middleware: Middleware) {
        tracing::debug!(middleware = %middleware.name(), "global middleware installed");
        self.global
            .write()
            .expect("global middleware lock poisoned")
            .push(middleware);
    }

    /// Install a plugin's middleware and subscribe it to framework events.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) {
        for middleware in plugin.middleware() {
            self.use_middleware(middleware);
        }

        let name = plugin.name().to_string();
        self.events.attach(plugin);
        tracing::info!(plugin = %name, "plugin registered");
        self.events.emit(FrameworkEvent::PluginRegistered { name });
    }

    pub fn routes(&self) -> Vec<Arc<RouteConfig>> {
        self.tree.read().expect("route tree lock poisoned").routes()
    }

    pub fn len(&self) -> usize {
        self.tree.read().expect("route tree lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `pathname` without running any middleware.
    pub fn resolve(&self, pathname: &str) -> Option<RouteMatch> {
        match_route(pathname, &self.tree.read().expect("route tree lock poisoned"))
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub async fn execute(&self, target: &str) -> RouteResult<Navigation> {
        self.execute_with(target, NavigateOptions::default()).await
    }

    /// Navigate to `target` (a path with optional query and fragment).
    pub async fn execute_with(
        &self,
        target: &str,
        options: NavigateOptions,
    ) -> RouteResult<Navigation> {
        let started = Instant::now();
        let pathname = split_target(target).0.to_string();
        self.events.emit(FrameworkEvent::NavigationStarted {
            pathname: pathname.clone(),
        });

        let result = self.navigate(target, &pathname, options).await;
        match &result {
            Ok(navigation) => {
                let elapsed = started.elapsed();
                tracing::info!(
                    pathname = %pathname,
                    route = %navigation.route.path,
                    outcome = ?navigation.outcome,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "navigation finished"
                );
                self.events.emit(FrameworkEvent::NavigationFinished {
                    pathname,
                    outcome: navigation.outcome.clone(),
                    elapsed,
                });
            }
            Err(RouteError::RouteNotFound { .. }) => {}
            Err(err) => {
                tracing::warn!(pathname = %pathname, error = %err, "navigation failed");
                self.events.emit(FrameworkEvent::NavigationFailed {
                    pathname,
                    error: err.to_string(),
                });
            }
        }
        result
    }

    async fn navigate(
        &self,
        target: &str,
        pathname: &str,
        options: NavigateOptions,
    ) -> RouteResult<Navigation> {
        let Some(matched) = self.resolve(pathname) else {
            tracing::debug!(pathname = %pathname, "no route matched");
            self.events.emit(FrameworkEvent::RouteNotFound {
                pathname: pathname.to_string(),
            });
            return Err(RouteError::RouteNotFound {
                pathname: pathname.to_string(),
            });
        };

        self.events.emit(FrameworkEvent::RouteMatched {
            pathname: pathname.to_string(),
            route: matched.route.path.clone(),
            score: matched.score,
        });
        validate_match(&matched)?;

        let RouteMatch {
            route,
            params,
            score,
            middleware,
        } = matched;

        let context = RouteContext::new(target)
            .with_params(params)
            .with_route(route.path.clone())
            .with_cache(self.cache.clone())
            .with_request_id(options.request_id)
            .with_cancellation(options.cancellation.unwrap_or_default());

        let chain = self.chain(middleware);
        let result = chain
            .execute(context)
            .await
            .map_err(|source| RouteError::RouteExecutionFailed {
                pathname: pathname.to_string(),
                source,
            })?;

        let mut context = result.context;
        match &result.outcome {
            ChainOutcome::Completed => {
                self.prefetch(&route, &mut context, pathname).await?;
            }
            ChainOutcome::Cancelled { at } => {
                return Err(RouteError::NavigationCancelled {
                    pathname: pathname.to_string(),
                    at: at.clone(),
                });
            }
            ChainOutcome::Halted { .. } => {}
        }

        Ok(Navigation {
            route,
            score,
            context,
            outcome: result.outcome,
        })
    }

    fn chain(&self, scoped: Vec<Middleware>) -> MiddlewareChain {
        let global = self
            .global
            .read()
            .expect("global middleware lock poisoned")
            .clone();

        // A group's middleware sits on every route of the group, so an
        // ancestor and its descendant can carry the same handler.
        let mut composed: Vec<Middleware> =
            Vec::with_capacity(self.builtins.len() + scoped.len() + global.len());
        for middleware in self.builtins.iter().cloned().chain(scoped).chain(global) {
            if !composed.iter().any(|seen| seen.same_handler(&middleware)) {
                composed.push(middleware);
            }
        }

        MiddlewareChain::new(composed)
    }

    /// Load the route's data dependencies into `context.data`.
    async fn prefetch(
        &self,
        route: &RouteConfig,
        context: &mut RouteContext,
        pathname: &str,
    ) -> RouteResult<()> {
        if route.data.is_empty() {
            return Ok(());
        }

        let params: BTreeMap<String, String> = context.params().clone();
        let loads = route.data.iter().map(|dependency| {
            let key = dependency.cache_key(&params);
            let cache = self.cache.clone();
            async move {
                let entry = cache
                    .fetch(&key, dependency.options.clone(), Arc::clone(&dependency.fetcher))
                    .await?;
                Ok::<_, CacheError>((dependency.name.clone(), entry.data))
            }
        });

        for loaded in join_all(loads).await {
            let (name, data) = loaded.map_err(|source| RouteError::PrefetchFailed {
                pathname: pathname.to_string(),
                source,
            })?;
            context.insert_data(name, data);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &self.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{fetcher_fn, CacheOptions};
    use crate::config::GroupEntry;
    use crate::middleware::{BoxError, Flow, Next};
    use crate::routing::route::DataDependency;
    use crate::routing::DuplicatePolicy;
    use serde_json::json;
    use std::sync::Mutex;

    fn router() -> Router {
        Router::new(RouterConfig::default(), DataCache::default())
    }

    fn tagging(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Middleware {
        let log = Arc::clone(log);
        let label = name.to_string();
        Middleware::new(name, move |ctx: RouteContext, next: Next| {
            let log = Arc::clone(&log);
            let label = label.clone();
            async move {
                log.lock().unwrap().push(label);
                next.run(ctx).await
            }
        })
    }

    #[tokio::test]
    async fn test_execute_resolves_params_and_query() {
        let router = router();
        router.add_route(RouteConfig::new("/users/[id]").page("user")).unwrap();

        let nav = router.execute("/users/42?tab=posts#top").await.unwrap();
        assert!(nav.is_completed());
        assert_eq!(nav.score, 150);
        assert_eq!(nav.context.param("id"), Some("42"));
        assert_eq!(nav.context.query().get("tab").map(String::as_str), Some("posts"));
        assert_eq!(nav.context.route(), Some("/users/[id]"));
        assert!(nav.context.local("duration_ms").is_some());
    }

    #[tokio::test]
    async fn test_not_found_and_missing_page() {
        let router = router();
        router.add_route(RouteConfig::new("/blank")).unwrap();

        assert!(matches!(
            router.execute("/nowhere").await.unwrap_err(),
            RouteError::RouteNotFound { .. }
        ));
        assert!(matches!(
            router.execute("/blank").await.unwrap_err(),
            RouteError::RouteHasNoPage { .. }
        ));
    }

    #[tokio::test]
    async fn test_chain_order_is_builtins_scoped_then_global() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router();
        router.use_middleware(tagging("global", &log));
        router.use_middleware(tagging("global-after", &log).after());
        router
            .add_route(RouteConfig::new("/a").page("a").middleware(tagging("parent", &log)))
            .unwrap();
        router
            .add_route(RouteConfig::new("/a/b").page("b").middleware(tagging("child", &log)))
            .unwrap();

        router.execute("/a/b").await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["parent", "child", "global", "global-after"]
        );
    }

    #[tokio::test]
    async fn test_halted_navigation_keeps_the_route() {
        let router = router();
        router.use_middleware(Middleware::guard("auth", |ctx| {
            if ctx.query().contains_key("token") {
                Flow::Continue
            } else {
                Flow::Stop("missing token".into())
            }
        }));
        router.add_route(RouteConfig::new("/secret").page("secret")).unwrap();

        let nav = router.execute("/secret").await.unwrap();
        assert_eq!(
            nav.outcome,
            ChainOutcome::Halted {
                by: "auth".into(),
                reason: Some("missing token".into())
            }
        );
        assert!(router.execute("/secret?token=1").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_middleware_failure_is_attributed() {
        let router = router();
        router.use_middleware(Middleware::new("explode", |_ctx, _next| async {
            Err::<RouteContext, BoxError>("boom".into())
        }));
        router.add_route(RouteConfig::new("/").page("home")).unwrap();

        match router.execute("/").await.unwrap_err() {
            RouteError::RouteExecutionFailed { source, .. } => {
                assert_eq!(source.middleware(), "explode");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_navigation() {
        let router = router();
        router.add_route(RouteConfig::new("/").page("home")).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = router
            .execute_with(
                "/",
                NavigateOptions {
                    request_id: Some("req-1".into()),
                    cancellation: Some(token),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::NavigationCancelled { ref at, .. } if at == builtin::ERROR_OBSERVER));
    }

    #[tokio::test]
    async fn test_data_dependencies_are_prefetched() {
        let router = router();
        router
            .add_route(RouteConfig::new("/users/[id]").page("user").data(DataDependency::new(
                "user",
                "user:{id}",
                CacheOptions::default(),
                fetcher_fn(|key| async move { Ok(json!({ "key": key })) }),
            )))
            .unwrap();

        let nav = router.execute("/users/7").await.unwrap();
        assert_eq!(nav.context.data().get("user"), Some(&json!({ "key": "user:7" })));
        assert!(router.cache().contains_key("user:7"));
        assert!(router.cache().has_fetcher("user:7"));
    }

    #[tokio::test]
    async fn test_prefetch_failure_is_reported() {
        let router = router();
        router
            .add_route(RouteConfig::new("/feed").page("feed").data(DataDependency::new(
                "feed",
                "feed",
                CacheOptions::default(),
                fetcher_fn(|_key| async { Err("upstream down".into()) }),
            )))
            .unwrap();

        assert!(matches!(
            router.execute("/feed").await.unwrap_err(),
            RouteError::PrefetchFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_events_follow_the_navigation() {
        let router = router();
        let mut events = router.events().subscribe();
        router.add_route(RouteConfig::new("/").page("home")).unwrap();
        router.execute("/").await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen[0], FrameworkEvent::RouteRegistered { .. }));
        assert!(matches!(seen[1], FrameworkEvent::NavigationStarted { .. }));
        assert!(matches!(seen[2], FrameworkEvent::RouteMatched { score: 0, .. }));
        assert!(matches!(
            seen[3],
            FrameworkEvent::NavigationFinished { outcome: ChainOutcome::Completed, .. }
        ));
    }

    #[tokio::test]
    async fn test_plugin_middleware_joins_global_chain() {
        struct Stamp;

        impl Plugin for Stamp {
            fn name(&self) -> &str {
                "stamp"
            }

            fn middleware(&self) -> Vec<Middleware> {
                vec![Middleware::new("stamp", |mut ctx: RouteContext, next: Next| async move {
                    ctx.insert_local("stamped", true);
                    next.run(ctx).await
                })]
            }
        }

        let router = router();
        router.register_plugin(Arc::new(Stamp));
        router.add_route(RouteConfig::new("/").page("home")).unwrap();

        let nav = router.execute("/").await.unwrap();
        assert_eq!(nav.context.local("stamped"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_from_config_resolves_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = MiddlewareRegistry::new();
        registry.register(tagging("auth", &log));

        let mut config = AppConfig::default();
        config.router.on_duplicate = DuplicatePolicy::Reject;
        config.routes.push(RouteEntry {
            path: "/".into(),
            name: Some("home".into()),
            page: Some("home".into()),
            layout: None,
            middleware: Vec::new(),
        });
        config.groups.push(GroupEntry {
            prefix: Some("/admin".into()),
            layout: Some("admin".into()),
            middleware: vec!["auth".into()],
            routes: vec![RouteEntry {
                path: "/users".into(),
                name: None,
                page: Some("admin/users".into()),
                layout: None,
                middleware: Vec::new(),
            }],
        });

        let router = Router::from_config(&config, DataCache::default(), &registry).unwrap();
        assert_eq!(router.len(), 2);

        let nav = router.execute("/admin/users").await.unwrap();
        assert_eq!(nav.route.layout.as_deref(), Some("admin"));
        assert_eq!(*log.lock().unwrap(), vec!["auth"]);

        config.routes[0].middleware.push("missing".into());
        let err = Router::from_config(&config, DataCache::default(), &registry).unwrap_err();
        assert!(matches!(err, RouteError::UnknownMiddleware { ref name, .. } if name == "missing"));
    }
}
