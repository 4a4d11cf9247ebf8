//! Binding target handed to services for the HTTP gateway transport.

use std::sync::Arc;

use axum::routing::MethodRouter;
use axum::Router;
use thiserror::Error;

use crate::gateway::headers::HeaderMatcher;

/// A gateway route that could not be bound.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("gateway path {path:?} conflicts with {existing:?}")]
    Conflict { path: String, existing: String },

    #[error("gateway path {path:?} is not valid: {reason}")]
    Invalid { path: String, reason: &'static str },
}

/// Collects gateway routes before the gateway transport starts.
///
/// Every path is owned by one `route` call (combine methods with
/// `get(..).post(..)`), and every prefix by one `nest` call. Paths are
/// compared by shape, so `/v1/{id}` and `/v1/{name}` are the same path.
/// Conflicts are returned as [`RouteError`] and leave the mux unchanged.
#[derive(Debug)]
pub struct GatewayMux {
    router: Router,
    matcher: Arc<HeaderMatcher>,
    paths: Vec<Bound>,
    prefixes: Vec<Bound>,
}

#[derive(Debug, Clone)]
struct Bound {
    path: String,
    shape: Vec<String>,
}

impl Bound {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            shape: shape(path),
        }
    }
}

impl GatewayMux {
    pub fn new(matcher: HeaderMatcher) -> Self {
        Self {
            router: Router::new(),
            matcher: Arc::new(matcher),
            paths: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    pub fn route(
        &mut self,
        path: &str,
        method_router: MethodRouter,
    ) -> Result<&mut Self, RouteError> {
        validate(path)?;
        let bound = Bound::new(path);
        self.check_path(&bound)?;

        self.router = std::mem::take(&mut self.router).route(path, method_router);
        self.paths.push(bound);
        Ok(self)
    }

    /// Serve a service's own router (routes and their layers) under `prefix`.
    pub fn nest(&mut self, prefix: &str, other: Router) -> Result<&mut Self, RouteError> {
        validate(prefix)?;
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return Err(RouteError::Invalid {
                path: "/".to_string(),
                reason: "nesting at the root; use `route` or `merge`",
            });
        }
        if prefix.contains('*') {
            return Err(RouteError::Invalid {
                path: prefix.to_string(),
                reason: "nest prefixes cannot contain wildcards",
            });
        }
        let bound = Bound::new(prefix);
        self.check_prefix(&bound)?;

        self.router = std::mem::take(&mut self.router).nest(prefix, other);
        self.prefixes.push(bound);
        Ok(self)
    }

    /// Add every route of `other`, a mux built by the same binder.
    pub fn merge(&mut self, other: GatewayMux) -> Result<&mut Self, RouteError> {
        for bound in &other.paths {
            self.check_path(bound)?;
        }
        for bound in &other.prefixes {
            self.check_prefix(bound)?;
        }

        self.router = std::mem::take(&mut self.router).merge(other.router);
        self.paths.extend(other.paths);
        self.prefixes.extend(other.prefixes);
        Ok(self)
    }

    /// Shared header matcher; handlers use it to build RPC requests.
    pub fn header_matcher(&self) -> Arc<HeaderMatcher> {
        Arc::clone(&self.matcher)
    }

    pub(crate) fn into_router(self) -> Router {
        self.router
    }

    fn check_path(&self, bound: &Bound) -> Result<(), RouteError> {
        let existing = self
            .paths
            .iter()
            .find(|p| overlaps(&p.shape, &bound.shape))
            .or_else(|| self.prefixes.iter().find(|p| is_under(&bound.shape, &p.shape)));
        match existing {
            Some(existing) => Err(conflict(bound, existing)),
            None => Ok(()),
        }
    }

    fn check_prefix(&self, bound: &Bound) -> Result<(), RouteError> {
        let existing = self
            .prefixes
            .iter()
            .find(|p| is_under(&bound.shape, &p.shape) || is_under(&p.shape, &bound.shape))
            .or_else(|| self.paths.iter().find(|p| is_under(&p.shape, &bound.shape)));
        match existing {
            Some(existing) => Err(conflict(bound, existing)),
            None => Ok(()),
        }
    }
}

impl Default for GatewayMux {
    fn default() -> Self {
        Self::new(HeaderMatcher::default())
    }
}

fn conflict(bound: &Bound, existing: &Bound) -> RouteError {
    RouteError::Conflict {
        path: bound.path.clone(),
        existing: existing.path.clone(),
    }
}

fn validate(path: &str) -> Result<(), RouteError> {
    if !path.starts_with('/') {
        return Err(RouteError::Invalid {
            path: path.to_string(),
            reason: "paths must start with `/`",
        });
    }
    Ok(())
}

/// Path segments with parameter names erased: `{id}` → `{}`, `{*rest}` → `{*}`.
fn shape(path: &str) -> Vec<String> {
    path.split('/').skip(1).map(erase_params).collect()
}

fn erase_params(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        match rest[open..].find('}') {
            Some(close) => {
                out.push_str(if rest[open + 1..].starts_with('*') { "{*}" } else { "{}" });
                rest = &rest[open + close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_dynamic(segment: &str) -> bool {
    segment.contains('{')
}

/// Two routes the router could not tell apart.
fn overlaps(a: &[String], b: &[String]) -> bool {
    for (x, y) in a.iter().zip(b) {
        if (x == "{*}" || y == "{*}") && is_dynamic(x) && is_dynamic(y) {
            return true;
        }
        if x != y {
            return false;
        }
    }
    a.len() == b.len()
}

/// `path` is `prefix` or lies below it.
fn is_under(path: &[String], prefix: &[String]) -> bool {
    path.len() >= prefix.len() && path.iter().zip(prefix).all(|(x, y)| x == y)
}
