//! The frozen [`Route`] value type and the fluent [`RouteSpec`] builder used
//! to construct one.
//!
//! The source this crate's design is descended from stored handlers as an
//! untyped mix of closures, class names, and `[class, method]` pairs, and
//! spread route metadata across an inheritance chain
//! (`Route`/`DomainRoute`/`FastRoute`). Both are collapsed here: one flat
//! value type, and one opaque [`HandlerToken`] enum the matcher never
//! inspects.

use crate::error::RouterError;
use crate::pattern::{self, ParsedHandlerTail};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// An opaque reference to whatever a downstream dispatcher uses to invoke a
/// route. The matcher never interprets this; it only carries it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerToken {
    Named(String),
    ClassMethod { class: String, method: String },
    Opaque(Value),
}

impl From<ParsedHandlerTail> for HandlerToken {
    fn from(tail: ParsedHandlerTail) -> Self {
        match tail {
            ParsedHandlerTail::Named(name) => HandlerToken::Named(name),
            ParsedHandlerTail::ClassMethod { class, method } => {
                HandlerToken::ClassMethod { class, method }
            }
        }
    }
}

/// A per-variable assertion: either a single regex fragment or a list of
/// literal alternatives joined with `|` at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assert {
    Regex(String),
    OneOf(Vec<String>),
}

impl Assert {
    pub(crate) fn as_regex_fragment(&self) -> String {
        match self {
            Assert::Regex(r) => r.clone(),
            Assert::OneOf(values) => values
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|"),
        }
    }
}

/// A frozen route record: the pattern string, its method/scheme/host
/// constraints, and the metadata a downstream dispatcher needs. Built via
/// [`RouteSpec`] and owned by a [`crate::catalog::Catalog`] once added.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub path: String,
    pub methods: HashSet<Method>,
    pub handler: Option<HandlerToken>,
    pub name: Option<String>,
    pub schemes: HashSet<String>,
    pub hosts: Vec<String>,
    pub asserts: HashMap<String, Assert>,
    pub defaults: HashMap<String, Value>,
    pub middleware_names: Vec<String>,
    pub resource: bool,
}

/// Fluent builder for a [`Route`]. Construct with [`RouteSpec::new`], chain
/// the setters that apply, then pass to [`crate::catalog::Catalog::add`].
#[derive(Debug, Clone, Default)]
pub struct RouteSpec {
    pattern: String,
    methods: HashSet<Method>,
    handler: Option<HandlerToken>,
    name: Option<String>,
    schemes: HashSet<String>,
    hosts: Vec<String>,
    asserts: HashMap<String, Assert>,
    defaults: HashMap<String, Value>,
    middleware_names: Vec<String>,
    resource: bool,
}

impl RouteSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        RouteSpec {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.methods.insert(method);
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: HandlerToken) -> Self {
        self.handler = Some(handler);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.schemes.insert(scheme.into().to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        if !self.hosts.contains(&host) {
            self.hosts.push(host);
        }
        self
    }

    #[must_use]
    pub fn assert(mut self, name: impl Into<String>, assert: Assert) -> Self {
        self.asserts.insert(name.into(), assert);
        self
    }

    #[must_use]
    pub fn default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.middleware_names.push(name.into());
        self
    }

    /// Marks this route as a resource-style route, the only kind allowed to
    /// carry an empty method set (meaning "matches any verb").
    #[must_use]
    pub fn resource(mut self) -> Self {
        self.resource = true;
        self
    }

    pub(crate) fn apply_prefix(&mut self, prefix: &str) {
        self.pattern = join_path(prefix, &self.pattern);
    }

    pub(crate) fn apply_group(&mut self, opts: &GroupOptionsInner) {
        self.schemes.extend(opts.schemes.iter().cloned());
        for h in &opts.hosts {
            if !self.hosts.contains(h) {
                self.hosts.push(h.clone());
            }
        }
        self.methods.extend(opts.methods.iter().cloned());
        for (k, v) in &opts.defaults {
            self.defaults.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &opts.asserts {
            self.asserts.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for m in &opts.middleware_names {
            self.middleware_names.push(m.clone());
        }
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parses and freezes this spec into a [`Route`], validating the
    /// method-set/resource invariant. The pattern's own embedded scheme,
    /// host, and handler tail (if any) are folded into the frozen fields.
    pub fn build(mut self) -> Result<(Route, crate::compiler::CompiledRoute), RouterError> {
        let parsed = pattern::parse(&self.pattern)?;

        if let Some(scheme) = &parsed.scheme {
            self.schemes.insert(scheme.clone());
        }
        if let Some(host) = &parsed.host {
            if !self.hosts.contains(host) {
                self.hosts.push(host.clone());
            }
        }
        if self.handler.is_none() {
            if let Some(tail) = parsed.handler_tail.clone() {
                self.handler = Some(tail.into());
            }
        }

        if self.methods.is_empty() && !self.resource {
            return Err(RouterError::EmptyMethodSet {
                pattern: self.pattern.clone(),
            });
        }

        let mut normalized_path = self.pattern.clone();
        if let Some(idx) = normalized_path.find("://") {
            if let Some(host_start) = normalized_path[idx + 3..].find('/') {
                normalized_path = normalized_path[idx + 3 + host_start..].to_string();
            }
        } else if normalized_path.starts_with("//") {
            if let Some(host_end) = normalized_path[2..].find('/') {
                normalized_path = normalized_path[2 + host_end..].to_string();
            }
        }
        if let Some(tail_start) = normalized_path.rfind("*<") {
            normalized_path.truncate(tail_start);
        }
        if !normalized_path.starts_with('/') {
            normalized_path.insert(0, '/');
        }

        let host_token_sets = self
            .hosts
            .iter()
            .map(|h| pattern::tokenize_standalone(h))
            .collect::<Result<Vec<_>, _>>()?;
        let compiled =
            crate::compiler::compile_with_hosts(&parsed.path_tokens, &host_token_sets, &self.asserts)?;

        let route = Route {
            path: normalized_path,
            methods: self.methods,
            handler: self.handler,
            name: self.name,
            schemes: self.schemes,
            hosts: self.hosts,
            asserts: self.asserts,
            defaults: self.defaults,
            middleware_names: self.middleware_names,
            resource: self.resource,
        };

        Ok((route, compiled))
    }
}

/// Joins a group prefix and a route pattern on a single `/`, collapsing a
/// doubled separator if both sides contributed one.
pub(crate) fn join_path(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        return suffix.to_string();
    }
    let prefix_trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    let suffix_trimmed = suffix.strip_prefix('/').unwrap_or(suffix);
    if suffix_trimmed.is_empty() {
        prefix_trimmed.to_string()
    } else {
        format!("{prefix_trimmed}/{suffix_trimmed}")
    }
}

/// Inherited state applied to every route added within a
/// [`crate::catalog::Catalog::group`] scope.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupOptionsInner {
    pub schemes: HashSet<String>,
    pub hosts: Vec<String>,
    pub methods: HashSet<Method>,
    pub defaults: HashMap<String, Value>,
    pub asserts: HashMap<String, Assert>,
    pub middleware_names: Vec<String>,
}
