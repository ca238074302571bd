//! [`CacheArtifact`]: a deterministic, serializable snapshot of a compiled
//! [`Catalog`] that lets a caller skip recompiling patterns across process
//! restarts. "Skips compilation" means skipping the pattern parser and
//! assertion/preset resolution, since the artifact stores each route's
//! already-resolved regex source strings, so loading only pays for
//! `Regex::new`.
//!
//! Staleness is detected with a SHA-256 content hash over a deterministic
//! encoding of every route's build inputs, not the regex sources
//! themselves, so a route whose *pattern* is unchanged but whose group
//! context (defaults/asserts/hosts) moved still invalidates correctly.

use crate::catalog::{Catalog, CatalogEntry};
use crate::compiler::{self, VariableSlot};
use crate::error::RouterError;
use crate::matcher::{partition_entries, Matcher};
use crate::pattern::Token;
use crate::route::{Assert, HandlerToken, Route};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const SCHEMA_VERSION: u32 = 1;

/// A serializable mirror of one [`CatalogEntry`]: the frozen [`Route`]'s
/// fields (with `http::Method` written as its uppercase string, since the
/// `http` crate carries no `serde` support) plus its [`crate::compiler::
/// CompiledRoute`]'s already-resolved regex sources and variable tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RouteRecord {
    path: String,
    methods: Vec<String>,
    handler: Option<HandlerToken>,
    name: Option<String>,
    schemes: Vec<String>,
    hosts: Vec<String>,
    asserts: BTreeMap<String, Assert>,
    defaults: BTreeMap<String, Value>,
    middleware_names: Vec<String>,
    resource: bool,
    path_regex_source: String,
    host_regex_sources: Vec<String>,
    path_variables: Vec<VariableSlot>,
    host_variables: Vec<VariableSlot>,
    path_tokens: Vec<Token>,
    host_token_sets: Vec<Vec<Token>>,
    template: String,
}

impl RouteRecord {
    fn from_entry(entry: &CatalogEntry) -> RouteRecord {
        let mut methods: Vec<String> = entry
            .route
            .methods
            .iter()
            .map(|m| m.as_str().to_string())
            .collect();
        methods.sort();
        let mut schemes: Vec<String> = entry.route.schemes.iter().cloned().collect();
        schemes.sort();

        RouteRecord {
            path: entry.route.path.clone(),
            methods,
            handler: entry.route.handler.clone(),
            name: entry.route.name.clone(),
            schemes,
            hosts: entry.route.hosts.clone(),
            asserts: entry.route.asserts.clone().into_iter().collect(),
            defaults: entry.route.defaults.clone().into_iter().collect(),
            middleware_names: entry.route.middleware_names.clone(),
            resource: entry.route.resource,
            path_regex_source: entry.compiled.path_regex_source.clone(),
            host_regex_sources: entry.compiled.host_regex_sources.clone(),
            path_variables: entry.compiled.path_variables.clone(),
            host_variables: entry.compiled.host_variables.clone(),
            path_tokens: entry.compiled.path_tokens.clone(),
            host_token_sets: entry.compiled.host_token_sets.clone(),
            template: entry.compiled.template.clone(),
        }
    }

    fn into_entry(self) -> Result<CatalogEntry, RouterError> {
        let methods = self
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.as_bytes()).map_err(|e| RouterError::MalformedPattern {
                    pattern: self.path.clone(),
                    reason: format!("invalid cached method '{m}': {e}"),
                })
            })
            .collect::<Result<HashSet<Method>, _>>()?;
        let schemes: HashSet<String> = self.schemes.into_iter().collect();

        let route = Route {
            path: self.path,
            methods,
            handler: self.handler,
            name: self.name,
            schemes,
            hosts: self.hosts,
            asserts: self.asserts.into_iter().collect(),
            defaults: self.defaults.into_iter().collect(),
            middleware_names: self.middleware_names,
            resource: self.resource,
        };

        let compiled = compiler::from_cached_sources(
            self.path_regex_source,
            self.host_regex_sources,
            self.path_variables,
            self.host_variables,
            self.path_tokens,
            self.host_token_sets,
            self.template,
        )?;

        Ok(CatalogEntry {
            route: Arc::new(route),
            compiled: Arc::new(compiled),
        })
    }
}

/// The serialized cache document: a schema version, a content hash over
/// every route's build inputs, and the route records themselves in
/// catalog (insertion) order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheArtifact {
    schema_version: u32,
    content_hash: String,
    routes: Vec<RouteRecord>,
}

impl CacheArtifact {
    /// Builds an artifact from every route in `catalog`, in catalog order.
    pub fn build(catalog: &Catalog) -> CacheArtifact {
        CacheArtifact {
            schema_version: SCHEMA_VERSION,
            content_hash: content_hash(catalog.entries()),
            routes: catalog.entries().iter().map(RouteRecord::from_entry).collect(),
        }
    }

    /// The content hash this artifact was built from, for a caller that
    /// wants to compare hashes without calling [`Self::is_fresh_for`].
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Serializes this artifact to its stable JSON form (deterministic key
    /// ordering via [`BTreeMap`], per the cache-artifact requirement that
    /// its byte format round-trip losslessly).
    ///
    /// # Errors
    /// Propagates any `serde_json` encoding failure (infallible in
    /// practice for this artifact's shape, but `serde_json::Error` isn't
    /// `Clone`/`Eq`, so it's wrapped in [`RouterError::MalformedPattern`]
    /// rather than given its own variant).
    pub fn to_json(&self) -> Result<String, RouterError> {
        serde_json::to_string_pretty(self).map_err(|e| RouterError::MalformedPattern {
            pattern: "<cache artifact>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Restores an artifact from JSON produced by [`Self::to_json`].
    ///
    /// # Errors
    /// [`RouterError::MalformedPattern`] if `json` isn't a valid artifact
    /// document of a schema version this crate understands.
    pub fn from_json(json: &str) -> Result<CacheArtifact, RouterError> {
        let artifact: CacheArtifact =
            serde_json::from_str(json).map_err(|e| RouterError::MalformedPattern {
                pattern: "<cache artifact>".to_string(),
                reason: e.to_string(),
            })?;
        if artifact.schema_version != SCHEMA_VERSION {
            return Err(RouterError::MalformedPattern {
                pattern: "<cache artifact>".to_string(),
                reason: format!(
                    "unsupported cache schema version {} (expected {SCHEMA_VERSION})",
                    artifact.schema_version
                ),
            });
        }
        Ok(artifact)
    }

    /// True when `catalog`'s route build inputs hash to the same content
    /// hash this artifact was built from, meaning it's safe to load this
    /// artifact instead of recompiling `catalog` from scratch.
    pub fn is_fresh_for(&self, catalog: &Catalog) -> bool {
        self.content_hash == content_hash(catalog.entries())
    }

    /// Reconstructs every cached route's [`CatalogEntry`] (re-running
    /// `Regex::new` on each stored source, but never the pattern parser or
    /// assertion resolution), installs the resulting partition into
    /// `matcher`, and returns the rebuilt [`Catalog`] so name-based lookups
    /// (e.g. [`crate::generator::generate`]) keep working against the
    /// loaded state.
    ///
    /// # Errors
    /// [`RouterError::MalformedPattern`] if a stored regex source or method
    /// token fails to parse (this indicates a corrupted or hand-edited
    /// artifact, not a normal runtime condition).
    pub fn load_into(&self, matcher: &Matcher) -> Result<Catalog, RouterError> {
        let entries = self
            .routes
            .iter()
            .cloned()
            .map(RouteRecord::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let (static_groups, dynamic_groups) = partition_entries(&entries);
        matcher.load_artifact(static_groups, dynamic_groups);

        tracing::info!(routes = entries.len(), "matcher loaded from cache artifact");

        Ok(Catalog::from_entries(entries))
    }
}

/// Hashes a deterministic encoding of every route's build inputs (path,
/// methods, schemes, hosts, asserts, defaults, middleware names), in
/// catalog order. Doesn't hash the compiled regex sources themselves:
/// those are a pure function of the build inputs, so hashing the inputs is
/// enough to detect staleness and is cheaper to compute from a live
/// [`Catalog`] that hasn't gone through the compiler's output again.
fn content_hash(entries: &[CatalogEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        let route = &entry.route;
        hasher.update(route.path.as_bytes());
        hasher.update([0u8]);

        let mut methods: Vec<&str> = route.methods.iter().map(Method::as_str).collect();
        methods.sort_unstable();
        for m in methods {
            hasher.update(m.as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);

        let mut schemes: Vec<&String> = route.schemes.iter().collect();
        schemes.sort_unstable();
        for s in schemes {
            hasher.update(s.as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);

        for h in &route.hosts {
            hasher.update(h.as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);

        let mut asserts: Vec<(&String, &Assert)> = route.asserts.iter().collect();
        asserts.sort_unstable_by_key(|(k, _)| k.as_str());
        for (k, v) in asserts {
            hasher.update(k.as_bytes());
            hasher.update([b'=']);
            hasher.update(v.as_regex_fragment().as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);

        let mut defaults: Vec<(&String, &Value)> = route.defaults.iter().collect();
        defaults.sort_unstable_by_key(|(k, _)| k.as_str());
        for (k, v) in defaults {
            hasher.update(k.as_bytes());
            hasher.update([b'=']);
            hasher.update(v.to_string().as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);

        for m in &route.middleware_names {
            hasher.update(m.as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}
