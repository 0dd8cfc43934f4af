//! Route trie.
//!
//! # Responsibilities
//! - Store registered routes keyed segment by segment
//! - Keep node-scoped middleware next to the node that owns it
//! - Reject ambiguous registrations before touching the tree
//!
//! # Design Decisions
//! - Children keyed by discriminator: the literal for static segments, the kind
//!   for parameterised ones, so at most one dynamic, one optional and one
//!   catch-all child per node
//! - `BTreeMap` children keep iteration (and therefore listings) deterministic
//! - Nodes are never removed

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::middleware::Middleware;
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::route::RouteConfig;
use crate::routing::segment::{parse_path, Segment};

/// What happens when a path pattern is registered twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with `RouteError::DuplicateRoute`.
    #[default]
    Reject,
    /// Replace the earlier registration (last write wins).
    Overwrite,
}

/// Child discriminator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum NodeKey {
    Static(String),
    Dynamic,
    Optional,
    CatchAll,
}

impl From<&Segment> for NodeKey {
    fn from(segment: &Segment) -> Self {
        match segment {
            Segment::Static(value) => NodeKey::Static(value.clone()),
            Segment::Dynamic(_) => NodeKey::Dynamic,
            Segment::Optional(_) => NodeKey::Optional,
            Segment::CatchAll(_) => NodeKey::CatchAll,
        }
    }
}

/// One trie node.
#[derive(Debug, Default)]
pub struct RouteNode {
    pub(crate) segment: Option<Segment>,
    pub(crate) route: Option<Arc<RouteConfig>>,
    pub(crate) children: BTreeMap<NodeKey, RouteNode>,
    pub(crate) middleware: Vec<Middleware>,
}

impl RouteNode {
    fn new(segment: Segment) -> Self {
        Self {
            segment: Some(segment),
            ..Self::default()
        }
    }

    pub fn segment(&self) -> Option<&Segment> {
        self.segment.as_ref()
    }

    pub fn route(&self) -> Option<&Arc<RouteConfig>> {
        self.route.as_ref()
    }

    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    pub(crate) fn child(&self, key: &NodeKey) -> Option<&RouteNode> {
        self.children.get(key)
    }
}

/// Trie of registered routes.
#[derive(Debug, Default)]
pub struct RouteTree {
    root: RouteNode,
    len: usize,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &RouteNode {
        &self.root
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register a route.
    ///
    /// Fails without modifying the tree when the pattern is invalid, conflicts
    /// with an existing parameter name, or duplicates a path under
    /// `DuplicatePolicy::Reject`.
    pub fn add_route(&mut self, config: RouteConfig, policy: DuplicatePolicy) -> RouteResult<()> {
        let segments = parse_path(&config.path).map_err(|source| RouteError::InvalidSegment {
            path: config.path.clone(),
            source,
        })?;

        let exists = self.check(&config.path, &segments)?;
        if exists && policy == DuplicatePolicy::Reject {
            return Err(RouteError::DuplicateRoute { path: config.path });
        }

        let mut node = &mut self.root;
        for segment in &segments {
            node = node
                .children
                .entry(NodeKey::from(segment))
                .or_insert_with(|| RouteNode::new(segment.clone()));
        }

        if exists {
            tracing::warn!(path = %config.path, "overwriting registered route");
            node.middleware.clear();
        } else {
            self.len += 1;
        }

        node.middleware.extend(config.middleware.iter().cloned());
        node.route = Some(Arc::new(config));
        Ok(())
    }

    /// Walk the existing nodes for `segments` without creating any.
    ///
    /// Returns whether a route is already attached at the terminal node.
    fn check(&self, path: &str, segments: &[Segment]) -> RouteResult<bool> {
        let mut node = &self.root;
        for segment in segments {
            let Some(child) = node.child(&NodeKey::from(segment)) else {
                return Ok(false);
            };

            let existing = child.segment.as_ref().and_then(Segment::param_name);
            if let (Some(existing), Some(found)) = (existing, segment.param_name()) {
                if existing != found {
                    return Err(RouteError::ConflictingParameter {
                        path: path.to_string(),
                        existing: existing.to_string(),
                        found: found.to_string(),
                    });
                }
            }
            node = child;
        }
        Ok(node.route.is_some())
    }

    /// Every registered route, depth first in key order.
    pub fn routes(&self) -> Vec<Arc<RouteConfig>> {
        fn collect(node: &RouteNode, out: &mut Vec<Arc<RouteConfig>>) {
            if let Some(route) = &node.route {
                out.push(Arc::clone(route));
            }
            for child in node.children.values() {
                collect(child, out);
            }
        }

        let mut out = Vec::with_capacity(self.len);
        collect(&self.root, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(tree: &RouteTree) -> Vec<String> {
        tree.routes().iter().map(|r| r.path.clone()).collect()
    }

    #[test]
    fn test_builds_shared_prefixes() {
        let mut tree = RouteTree::new();
        tree.add_route(RouteConfig::new("/users").page("users"), DuplicatePolicy::Reject).unwrap();
        tree.add_route(RouteConfig::new("/users/[id]").page("user"), DuplicatePolicy::Reject).unwrap();
        tree.add_route(RouteConfig::new("/users/me").page("me"), DuplicatePolicy::Reject).unwrap();

        assert_eq!(tree.len(), 3);
        let users = tree.root().child(&NodeKey::Static("users".into())).unwrap();
        assert_eq!(users.children.len(), 2);
        assert_eq!(paths(&tree), vec!["/users", "/users/me", "/users/[id]"]);
    }

    #[test]
    fn test_rejects_duplicates_by_default() {
        let mut tree = RouteTree::new();
        tree.add_route(RouteConfig::new("/a").page("one"), DuplicatePolicy::Reject).unwrap();
        let err = tree
            .add_route(RouteConfig::new("a/").page("two"), DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
        assert_eq!(tree.routes()[0].page.as_deref(), Some("one"));
    }

    #[test]
    fn test_overwrite_replaces_config_and_middleware() {
        let mut tree = RouteTree::new();
        let noop = |name: &str| Middleware::new(name, |ctx, next| async move { next.run(ctx).await });

        tree.add_route(RouteConfig::new("/a").page("one").middleware(noop("m1")), DuplicatePolicy::Reject)
            .unwrap();
        tree.add_route(RouteConfig::new("/a").page("two").middleware(noop("m2")), DuplicatePolicy::Overwrite)
            .unwrap();

        assert_eq!(tree.len(), 1);
        let node = tree.root().child(&NodeKey::Static("a".into())).unwrap();
        assert_eq!(node.route().unwrap().page.as_deref(), Some("two"));
        let names: Vec<&str> = node.middleware().iter().map(Middleware::name).collect();
        assert_eq!(names, vec!["m2"]);
    }

    #[test]
    fn test_conflicting_parameter_names_leave_tree_untouched() {
        let mut tree = RouteTree::new();
        tree.add_route(RouteConfig::new("/users/[id]").page("user"), DuplicatePolicy::Reject).unwrap();

        let err = tree
            .add_route(RouteConfig::new("/users/[uid]/posts").page("posts"), DuplicatePolicy::Overwrite)
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::ConflictingParameter { ref existing, ref found, .. } if existing == "id" && found == "uid"
        ));

        let dynamic = tree
            .root()
            .child(&NodeKey::Static("users".into()))
            .and_then(|n| n.child(&NodeKey::Dynamic))
            .unwrap();
        assert!(dynamic.children.is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_is_reported_with_path() {
        let mut tree = RouteTree::new();
        let err = tree
            .add_route(RouteConfig::new("/x/[bad name]"), DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidSegment { ref path, .. } if path == "/x/[bad name]"));
        assert!(tree.is_empty());
        assert!(tree.root().children.is_empty());
    }

    #[test]
    fn test_root_route_lives_on_root_node() {
        let mut tree = RouteTree::new();
        tree.add_route(RouteConfig::new("/").page("home"), DuplicatePolicy::Reject).unwrap();
        assert!(tree.root().route().is_some());
    }
}
