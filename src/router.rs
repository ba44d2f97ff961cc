//! Method-indexed request router.
//!
//! Routes are kept in registration order. Lookups for one method scan only
//! that method's routes, newest first, so a later registration shadows an
//! earlier one with an overlapping template. The per-method index is built on
//! the first lookup for that method and kept for the router's lifetime.

use std::sync::OnceLock;

use crate::method::{Method, RouteMethod};
use crate::route::Route;

/// Values captured from a path template, in template order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PathArgs(Vec<(String, String)>);

impl PathArgs {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub(crate) fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }

    /// The value captured for `name`. A name repeated in the template
    /// resolves to its last capture.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// A resolved route plus the arguments captured from the path.
#[derive(Debug)]
pub struct RouteMatch<'r, H> {
    pub route: &'r Route<H>,
    pub args: PathArgs,
}

/// The routing table.
pub struct Router<H> {
    routes: Vec<Route<H>>,
    by_method: [OnceLock<Vec<usize>>; RouteMethod::COUNT],
}

impl<H> Router<H> {
    pub fn new(routes: Vec<Route<H>>) -> Self {
        Self {
            routes,
            by_method: Default::default(),
        }
    }

    /// All routes, in registration order.
    pub fn routes(&self) -> &[Route<H>] {
        &self.routes
    }

    /// Resolves `method` + `path` to the most recently registered matching route.
    pub fn find(&self, method: RouteMethod, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes_for(method)
            .iter()
            .rev()
            .map(|&i| &self.routes[i])
            .find_map(|route| {
                let args = route.matcher().ok()?.captures(path)?;
                Some(RouteMatch { route, args })
            })
    }

    /// Every method `path` answers to, sorted and deduplicated.
    ///
    /// `HEAD` is listed wherever `GET` is, and `OPTIONS` is always listed.
    /// Returns `None` when no route matches `path` at all.
    pub fn list_methods_for_path(&self, path: &str) -> Option<Vec<Method>> {
        let mut methods = Vec::new();
        for route in self.routes.iter().filter(|r| r.matches_path(path)) {
            methods.push(route.method().as_method());
            if route.method() == RouteMethod::Get {
                methods.push(Method::Head);
            }
        }

        if methods.is_empty() {
            return None;
        }

        methods.push(Method::Options);
        methods.sort();
        methods.dedup();
        Some(methods)
    }

    /// Indices of `method`'s routes in registration order. Built once per method.
    fn routes_for(&self, method: RouteMethod) -> &[usize] {
        self.by_method[method.index()].get_or_init(|| {
            self.routes
                .iter()
                .enumerate()
                .filter(|(_, r)| r.method() == method)
                .map(|(i, _)| i)
                .collect()
        })
    }
}

/// Joins methods for an `Allow` header: `GET, HEAD, OPTIONS`.
pub(crate) fn allow_header(methods: &[Method]) -> String {
    methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
}
