//! Route matching logic.
//!
//! # Responsibilities
//! - Explore every branch of the tree consistent with the request path
//! - Score branches so static beats dynamic beats catch-all
//! - Resolve path parameters for the winning branch
//!
//! # Design Decisions
//! - Depth-first, additive scoring; the highest cumulative score wins
//! - Ties keep the first candidate found (node itself, static, dynamic,
//!   optional present, optional absent, catch-all)
//! - Matching is case-sensitive and does not percent-decode components
//! - Query string and fragment are ignored

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::routing::context::split_target;
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::route::RouteConfig;
use crate::routing::tree::{NodeKey, RouteNode, RouteTree};

pub const STATIC_SCORE: u32 = 100;
pub const DYNAMIC_SCORE: u32 = 50;
pub const OPTIONAL_SCORE: u32 = 40;
pub const CATCH_ALL_SCORE: u32 = 10;

/// A resolved route for one navigation.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteConfig>,
    pub params: BTreeMap<String, String>,
    pub score: u32,
    /// Node-scoped middleware along the matched branch, root first.
    pub middleware: Vec<Middleware>,
}

/// Find the best route for `pathname`.
pub fn match_route(pathname: &str, tree: &RouteTree) -> Option<RouteMatch> {
    let (path, _) = split_target(pathname);
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();

    let mut walk = Walk {
        components: &components,
        params: Vec::new(),
        middleware: Vec::new(),
        best: None,
    };
    walk.visit(tree.root(), 0, 0);

    if walk.best.is_none() {
        tracing::trace!(pathname = %pathname, "no route matched");
    }
    walk.best
}

/// Reject matches whose route has nothing to render.
pub fn validate_match(matched: &RouteMatch) -> RouteResult<()> {
    if matched.route.page.is_none() {
        return Err(RouteError::RouteHasNoPage {
            path: matched.route.path.clone(),
        });
    }
    Ok(())
}

struct Walk<'t, 'p> {
    components: &'p [&'p str],
    params: Vec<(String, String)>,
    middleware: Vec<&'t Middleware>,
    best: Option<RouteMatch>,
}

impl<'t> Walk<'t, '_> {
    fn visit(&mut self, node: &'t RouteNode, index: usize, score: u32) {
        let scoped = node.middleware.len();
        self.middleware.extend(node.middleware.iter());

        if index == self.components.len() {
            if let Some(route) = &node.route {
                self.offer(route, score);
            }
        }

        if let Some(component) = self.components.get(index).copied() {
            if let Some(child) = node.child(&NodeKey::Static(component.to_string())) {
                self.visit(child, index + 1, score + STATIC_SCORE);
            }

            if let Some(child) = node.child(&NodeKey::Dynamic) {
                self.bound(child, component.to_string(), index + 1, score + DYNAMIC_SCORE);
            }

            if let Some(child) = node.child(&NodeKey::Optional) {
                self.bound(child, component.to_string(), index + 1, score + OPTIONAL_SCORE);
            }
        }

        if let Some(child) = node.child(&NodeKey::Optional) {
            self.visit(child, index, score);
        }

        if index < self.components.len() {
            if let Some(child) = node.child(&NodeKey::CatchAll) {
                let rest = self.components[index..].join("/");
                let scoped = child.middleware.len();
                self.middleware.extend(child.middleware.iter());
                if let Some(route) = &child.route {
                    self.params.push((param_name(child), rest));
                    self.offer(route, score + CATCH_ALL_SCORE);
                    self.params.pop();
                }
                self.truncate_middleware(scoped);
            }
        }

        self.truncate_middleware(scoped);
    }

    /// Visit `child` with its parameter bound to `value`.
    fn bound(&mut self, child: &'t RouteNode, value: String, index: usize, score: u32) {
        self.params.push((param_name(child), value));
        self.visit(child, index, score);
        self.params.pop();
    }

    fn offer(&mut self, route: &Arc<RouteConfig>, score: u32) {
        let better = self.best.as_ref().is_none_or(|best| score > best.score);
        if better {
            self.best = Some(RouteMatch {
                route: Arc::clone(route),
                params: self.params.iter().cloned().collect(),
                score,
                middleware: self.middleware.iter().map(|m| (*m).clone()).collect(),
            });
        }
    }

    fn truncate_middleware(&mut self, count: usize) {
        let len = self.middleware.len() - count;
        self.middleware.truncate(len);
    }
}

fn param_name(node: &RouteNode) -> String {
    node.segment()
        .and_then(|s| s.param_name())
        .unwrap_or_default()
        .to_string()
}
