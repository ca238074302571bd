//! [`Matcher`], the compiled, hot-swappable matching artifact, and
//! [`match_request`]'s partition-then-probe algorithm: a static path table
//! for variable-free, host-agnostic routes, and a [`regex::RegexSet`] over
//! every other route's anchored path regex for everything else.
//!
//! Rust's `regex` crate has no PCRE-style `MARK`/branch-reset alternation,
//! so the grouped dynamic-route mega-regex this design is descended from is
//! replaced here with a `RegexSet`: it reports every pattern index that
//! matched in one O(path length) pass, standing in for `MARK`, and the
//! lowest matching index (catalog insertion order) is re-run through its
//! own anchored `Regex` to recover named captures.

use crate::catalog::{Catalog, CatalogEntry};
use crate::compiler::CompiledRoute;
use crate::error::MatchError;
use crate::route::Route;
use arc_swap::ArcSwapOption;
use http::Method;
use regex::RegexSet;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Maximum number of named captures kept inline before a regex's own capture
/// set would spill to the heap. Most routes bind a handful of path/host
/// variables, so this covers the common case without allocating.
const MAX_INLINE_CAPTURES: usize = 8;

/// Stack-allocated scratch space for one regex's named captures, built while
/// walking `Captures` and converted into the caller's lookup structure once
/// complete.
type CaptureScratch = SmallVec<[(String, String); MAX_INLINE_CAPTURES]>;

/// The primitive values a caller extracts from an HTTP request before
/// calling [`Matcher::match_request`]. Request/response modeling itself is
/// the caller's concern.
#[derive(Debug, Clone)]
pub struct MatchRequest<'a> {
    pub method: Method,
    pub scheme: Option<&'a str>,
    pub host: Option<&'a str>,
    pub path: &'a str,
    /// A server-supplied script-name prefix to strip before matching, e.g.
    /// `/api` when the app is mounted under that path.
    pub base_path: Option<&'a str>,
}

impl<'a> MatchRequest<'a> {
    pub fn new(method: Method, path: &'a str) -> Self {
        MatchRequest {
            method,
            scheme: None,
            host: None,
            path,
            base_path: None,
        }
    }

    #[must_use]
    pub fn scheme(mut self, scheme: &'a str) -> Self {
        self.scheme = Some(scheme);
        self
    }

    #[must_use]
    pub fn host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }

    #[must_use]
    pub fn base_path(mut self, base_path: &'a str) -> Self {
        self.base_path = Some(base_path);
        self
    }
}

/// A successful match: the route plus every variable's bound value
/// (captured, defaulted, or null), owned independently of any other
/// concurrent match so cross-request interference is impossible.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub route: Arc<Route>,
    pub arguments: HashMap<String, Value>,
}

/// Routes that share an identical compiled path regex (typically the same
/// literal path text under different methods, or under differing
/// host/scheme constraints). Grouping lets `MethodNotAllowed` aggregate the
/// allowed-method set across every variant instead of reporting only the
/// first one tried.
#[derive(Debug, Clone)]
pub(crate) struct PathGroup {
    pub(crate) variants: Vec<CatalogEntry>,
    /// Shared by every variant (identical path_regex_source implies
    /// identical capture layout); used once for the whole group.
    pub(crate) path_regex_source: String,
}

impl PathGroup {
    fn is_static(&self) -> bool {
        self.variants.iter().all(|v| v.compiled.is_static())
    }
}

/// Groups `entries` by their compiled path regex source, preserving
/// first-seen (catalog insertion) order, then splits the groups into the
/// static and dynamic buckets per `spec.md` §4.4's classification rule: a
/// group is static-eligible only if every variant in it is. Shared by
/// [`Matcher::warm_up`] and [`crate::cache::CacheArtifact::load_into`] so
/// both paths to a warmed-up matcher agree on exactly one partitioning
/// algorithm.
pub(crate) fn partition_entries(
    entries: &[CatalogEntry],
) -> (HashMap<String, PathGroup>, Vec<PathGroup>) {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, PathGroup> = HashMap::new();

    for entry in entries {
        let key = entry.compiled.path_regex_source.clone();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key.clone());
                PathGroup {
                    variants: Vec::new(),
                    path_regex_source: key,
                }
            })
            .variants
            .push(entry.clone());
    }

    let mut static_groups = HashMap::new();
    let mut dynamic_groups = Vec::new();

    for key in order {
        let group = groups.remove(&key).expect("group key was just inserted");
        if group.is_static() {
            let canonical = canonicalize_static_path(&group.variants[0].route.path);
            static_groups.insert(canonical, group);
        } else {
            dynamic_groups.push(group);
        }
    }

    (static_groups, dynamic_groups)
}

/// The compiled, immutable state a [`Matcher`] matches against. Built once
/// by [`Matcher::warm_up`] or restored from a [`crate::cache::CacheArtifact`].
struct MatchArtifact {
    static_groups: HashMap<String, PathGroup>,
    dynamic_set: RegexSet,
    dynamic_groups: Vec<PathGroup>,
}

/// The compiled, hot-swappable route matcher. Holds its [`MatchArtifact`]
/// behind an [`ArcSwapOption`] so warm-up, cache load, and hot-reload can
/// each install a new artifact with one atomic swap; concurrent matches
/// never observe a partially-built artifact and never block each other.
#[derive(Default)]
pub struct Matcher {
    artifact: ArcSwapOption<MatchArtifact>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once an artifact has been installed, via [`Self::warm_up`] or
    /// [`Self::load_artifact`].
    pub fn is_warm(&self) -> bool {
        self.artifact.load().is_some()
    }

    /// Builds the static/dynamic partition from `catalog` and installs it
    /// atomically. Safe to call again later (e.g. after a catalog reload);
    /// the previous artifact remains valid for any match already in flight.
    pub fn warm_up(&self, catalog: &Catalog) {
        let (static_groups, dynamic_groups) = partition_entries(catalog.entries());
        self.install(static_groups, dynamic_groups);
    }

    /// Installs a precompiled partition, e.g. one produced by
    /// [`crate::cache::CacheArtifact::load_into`], skipping the
    /// recompilation `warm_up` would otherwise do. Both paths share
    /// [`partition_entries`], so this is the same installation step
    /// `warm_up` itself uses once its partition is ready.
    pub(crate) fn load_artifact(
        &self,
        static_groups: HashMap<String, PathGroup>,
        dynamic_groups: Vec<PathGroup>,
    ) {
        self.install(static_groups, dynamic_groups);
    }

    fn install(&self, static_groups: HashMap<String, PathGroup>, dynamic_groups: Vec<PathGroup>) {
        let dynamic_sources: Vec<String> = dynamic_groups
            .iter()
            .map(|g| g.path_regex_source.clone())
            .collect();
        let dynamic_set = RegexSet::new(&dynamic_sources).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to build dynamic route regex set");
            RegexSet::empty()
        });

        tracing::info!(
            static_routes = static_groups.len(),
            dynamic_routes = dynamic_groups.len(),
            "matcher warmed up"
        );

        self.artifact.store(Some(Arc::new(MatchArtifact {
            static_groups,
            dynamic_set,
            dynamic_groups,
        })));
    }

    /// Matches a request against the warmed-up artifact.
    ///
    /// # Errors
    /// [`MatchError::NoRouteMatched`] if no route's path matches;
    /// [`MatchError::MethodNotAllowed`] / [`MatchError::SchemeNotAllowed`] /
    /// [`MatchError::HostNotAllowed`] if a path matched but a subsequent
    /// constraint didn't, each carrying the allowed set.
    pub fn match_request(&self, request: &MatchRequest<'_>) -> Result<MatchedRoute, MatchError> {
        let started = Instant::now();
        let Some(artifact) = self.artifact.load_full() else {
            return Err(MatchError::NoRouteMatched);
        };

        let decoded = urlencoding::decode(request.path)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| request.path.to_string());
        let stripped = strip_base_path(&decoded, request.base_path);
        let canonical = canonicalize_request_path(&stripped);

        let result = if let Some(group) = artifact.static_groups.get(&canonical) {
            self.evaluate_group(group, request, &HashMap::new())
        } else {
            let matches: Vec<usize> = artifact.dynamic_set.matches(&canonical).into_iter().collect();
            match matches.into_iter().min() {
                None => Err(MatchError::NoRouteMatched),
                Some(idx) => {
                    let group = &artifact.dynamic_groups[idx];
                    let representative = &group.variants[0].compiled;
                    let path_captures = representative
                        .path_regex
                        .captures(&canonical)
                        .map(|caps| capture_map(&representative.path_variables, &caps))
                        .unwrap_or_default();
                    self.evaluate_group(group, request, &path_captures)
                }
            }
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(matched) => {
                if elapsed.as_millis() > 1 {
                    tracing::warn!(path = %request.path, ?elapsed, route = ?matched.route.name, "slow route match");
                } else {
                    tracing::debug!(path = %request.path, ?elapsed, route = ?matched.route.name, "route matched");
                }
            }
            Err(err) => {
                tracing::debug!(path = %request.path, ?elapsed, %err, "route match failed");
            }
        }
        result
    }

    fn evaluate_group(
        &self,
        group: &PathGroup,
        request: &MatchRequest<'_>,
        path_captures: &HashMap<String, String>,
    ) -> Result<MatchedRoute, MatchError> {
        let method_pass: Vec<&CatalogEntry> = group
            .variants
            .iter()
            .filter(|v| v.route.methods.is_empty() || v.route.methods.contains(&request.method))
            .collect();

        if method_pass.is_empty() {
            let allowed: BTreeSet<String> = group
                .variants
                .iter()
                .flat_map(|v| v.route.methods.iter().map(Method::as_str).map(str::to_string))
                .collect();
            return Err(MatchError::MethodNotAllowed { allowed });
        }

        let scheme_pass: Vec<&&CatalogEntry> = method_pass
            .iter()
            .filter(|v| scheme_ok(&v.route.schemes, request.scheme))
            .collect();

        if scheme_pass.is_empty() {
            let allowed: BTreeSet<String> = method_pass
                .iter()
                .flat_map(|v| v.route.schemes.iter().cloned())
                .collect();
            return Err(MatchError::SchemeNotAllowed { allowed });
        }

        for entry in &scheme_pass {
            if let Some(host_captures) = host_ok(&entry.compiled, request.host) {
                let arguments = bind_arguments(entry, path_captures, &host_captures);
                return Ok(MatchedRoute {
                    route: entry.route.clone(),
                    arguments,
                });
            }
        }

        Err(MatchError::HostNotAllowed)
    }
}

fn scheme_ok(route_schemes: &std::collections::HashSet<String>, request_scheme: Option<&str>) -> bool {
    if route_schemes.is_empty() {
        return true;
    }
    let scheme = request_scheme.unwrap_or("").to_ascii_lowercase();
    route_schemes.contains(&scheme)
}

/// Returns `Some(host capture map)` when the route has no host constraint
/// or the request host matches one of its compiled host regexes.
fn host_ok(compiled: &CompiledRoute, request_host: Option<&str>) -> Option<HashMap<String, String>> {
    if compiled.host_regexes.is_empty() {
        return Some(HashMap::new());
    }
    let host = request_host?;
    for regex in &compiled.host_regexes {
        if let Some(caps) = regex.captures(host) {
            return Some(capture_map(&compiled.host_variables, &caps));
        }
    }
    None
}

fn capture_map(variables: &[crate::compiler::VariableSlot], caps: &regex::Captures<'_>) -> HashMap<String, String> {
    let scratch: CaptureScratch = variables
        .iter()
        .filter_map(|slot| {
            caps.name(&slot.name)
                .map(|m| (slot.name.clone(), m.as_str().to_string()))
        })
        .collect();
    scratch.into_iter().collect()
}

/// Binds each of `entry`'s variables to its captured value, falling back to
/// the variable's own default then the route's default. Captures are already
/// percent-decoded: the request path is decoded once, in full, before
/// matching, so the text a capture group pulls out is already the decoded
/// form and must not be decoded a second time here.
fn bind_arguments(
    entry: &CatalogEntry,
    path_captures: &HashMap<String, String>,
    host_captures: &HashMap<String, String>,
) -> HashMap<String, Value> {
    let mut arguments = HashMap::new();
    for slot in entry.compiled.variables() {
        let captured = path_captures
            .get(&slot.name)
            .or_else(|| host_captures.get(&slot.name));
        let value = match captured {
            Some(raw) => Value::String(raw.clone()),
            None => slot
                .default
                .clone()
                .or_else(|| entry.route.defaults.get(&slot.name).cloned())
                .unwrap_or(Value::Null),
        };
        arguments.insert(slot.name.clone(), value);
    }
    arguments
}

/// Strips a server-supplied base path prefix at a `/` boundary; leaves the
/// path untouched if it doesn't actually start with that prefix.
fn strip_base_path(path: &str, base_path: Option<&str>) -> String {
    let Some(base) = base_path else {
        return path.to_string();
    };
    let base = base.strip_suffix('/').unwrap_or(base);
    if base.is_empty() {
        return path.to_string();
    }
    if let Some(rest) = path.strip_prefix(base) {
        if rest.is_empty() {
            return "/".to_string();
        }
        if rest.starts_with('/') {
            return rest.to_string();
        }
    }
    path.to_string()
}

/// Applies the canonicalization rules to an incoming request path: a
/// missing leading `/` is added regardless of what the path opens with, and
/// a trailing `/` is removed unless the path is exactly `/`.
fn canonicalize_request_path(path: &str) -> String {
    let mut p = path.to_string();
    if !p.starts_with('/') {
        p.insert(0, '/');
    }
    canonicalize_static_path(&p)
}

/// Canonicalizes a path for use as a static-bucket key: trailing `/`
/// removed, unless the path is exactly `/`.
fn canonicalize_static_path(path: &str) -> String {
    if path.len() > 1 && path.ends_with('/') {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}
