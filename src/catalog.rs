//! [`Catalog`], the append-only collection of routes, and [`GroupOptions`]
//! for applying an inherited prefix/host/scheme/method/default/assert/
//! middleware context to every route added within a scope.

use crate::compiler::CompiledRoute;
use crate::error::RouterError;
use crate::route::{Assert, GroupOptionsInner, Route, RouteSpec};
use http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A route plus its compiled regex artifact, as stored in a [`Catalog`].
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub route: Arc<Route>,
    pub compiled: Arc<CompiledRoute>,
}

/// The ordered collection of routes a caller builds up before handing it to
/// [`crate::matcher::Matcher::warm_up`]. Each route is parsed and compiled
/// as soon as it's added; compilation is not deferred to warm-up.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    names: HashMap<String, usize>,
    group_stack: Vec<GroupOptions>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route, applying every group context currently open (in
    /// outermost-first order), then parses and compiles it.
    ///
    /// # Errors
    /// Returns [`RouterError::MalformedPattern`] if the pattern fails to
    /// parse or compile, [`RouterError::EmptyMethodSet`] if a non-resource
    /// route has no methods, and [`RouterError::DuplicateRoute`] if its
    /// name collides with a route already in the catalog.
    pub fn add(&mut self, mut spec: RouteSpec) -> Result<&Route, RouterError> {
        for group in &self.group_stack {
            spec.apply_prefix(&group.prefix);
            spec.apply_group(&group.inner);
        }
        tracing::debug!(pattern = spec.pattern(), "compiling route");

        let (route, compiled) = spec.build()?;

        if let Some(name) = &route.name {
            if self.names.contains_key(name) {
                return Err(RouterError::DuplicateRoute(name.clone()));
            }
        }

        let idx = self.entries.len();
        if let Some(name) = &route.name {
            self.names.insert(name.clone(), idx);
        }
        self.entries.push(CatalogEntry {
            route: Arc::new(route),
            compiled: Arc::new(compiled),
        });
        Ok(&self.entries[idx].route)
    }

    /// Opens a group scope: every route added inside `body` (directly, or
    /// via a further-nested `group` call) inherits `opts`. Nested groups
    /// compose outermost-first, since the stack is walked from the bottom
    /// on every `add`.
    pub fn group(&mut self, opts: GroupOptions, body: impl FnOnce(&mut Catalog)) {
        self.group_stack.push(opts);
        body(self);
        self.group_stack.pop();
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.names.get(name).map(|&idx| &self.entries[idx])
    }

    /// Rebuilds a [`Catalog`] directly from already-compiled entries, e.g.
    /// ones restored by [`crate::cache::CacheArtifact::load_into`]. No
    /// parsing or compilation happens here, only the name index is
    /// rebuilt; duplicate names are a cache-corruption bug, not a normal
    /// runtime condition, since [`Catalog::add`] would have already
    /// rejected them the first time the catalog was built.
    pub(crate) fn from_entries(entries: Vec<CatalogEntry>) -> Catalog {
        let mut names = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if let Some(name) = &entry.route.name {
                names.insert(name.clone(), idx);
            }
        }
        Catalog {
            entries,
            names,
            group_stack: Vec::new(),
        }
    }
}

/// The inherited context a [`Catalog::group`] scope applies to every route
/// added within it: a path prefix, additional hosts/schemes/methods, and
/// extra defaults/asserts/middleware names.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    pub(crate) prefix: String,
    pub(crate) inner: GroupOptionsInner,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.inner.hosts.push(host.into());
        self
    }

    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.inner.schemes.insert(scheme.into().to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.inner.methods.insert(method);
        self
    }

    #[must_use]
    pub fn default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inner.defaults.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn assert(mut self, name: impl Into<String>, assert: Assert) -> Self {
        self.inner.asserts.insert(name.into(), assert);
        self
    }

    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.inner.middleware_names.push(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_names() {
        let mut catalog = Catalog::new();
        catalog
            .add(RouteSpec::new("/a").method(Method::GET).name("home"))
            .expect("first add");
        let err = catalog
            .add(RouteSpec::new("/b").method(Method::GET).name("home"))
            .unwrap_err();
        assert!(matches!(err, RouterError::DuplicateRoute(name) if name == "home"));
    }

    #[test]
    fn group_prefix_and_method_apply_to_nested_routes() {
        let mut catalog = Catalog::new();
        catalog.group(
            GroupOptions::new().prefix("/api").method(Method::GET),
            |cat| {
                cat.add(RouteSpec::new("/users").name("list_users"))
                    .expect("add");
            },
        );
        let entry = catalog.get_by_name("list_users").expect("route exists");
        assert_eq!(entry.route.path, "/api/users");
        assert!(entry.route.methods.contains(&Method::GET));
    }

    #[test]
    fn nested_groups_compose_outermost_first() {
        let mut catalog = Catalog::new();
        catalog.group(GroupOptions::new().prefix("/api"), |cat| {
            cat.group(GroupOptions::new().prefix("/v1"), |cat| {
                cat.add(RouteSpec::new("/users").method(Method::GET).name("users"))
                    .expect("add");
            });
        });
        let entry = catalog.get_by_name("users").expect("route exists");
        assert_eq!(entry.route.path, "/api/v1/users");
    }
}
