//! Typed error enums for build-time, match-time, and generation-time failures.
//!
//! Errors are hand-written enums with manual `Display`/`Error` impls rather
//! than boxed/type-erased errors, so callers can pattern-match on payloads
//! such as [`MatchError::MethodNotAllowed`]'s allowed-methods set.

use std::collections::BTreeSet;
use std::fmt;

/// Failures that can occur while parsing a pattern or assembling a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A route pattern failed to parse.
    MalformedPattern { pattern: String, reason: String },
    /// Two routes in the same catalog were given the same name.
    DuplicateRoute(String),
    /// A route was added with an empty method set but was not marked
    /// `resource()`.
    EmptyMethodSet { pattern: String },
    /// The matcher was asked to match or generate before `warm_up` ran.
    NotWarmedUp,
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::MalformedPattern { pattern, reason } => {
                write!(f, "malformed route pattern '{pattern}': {reason}")
            }
            RouterError::DuplicateRoute(name) => {
                write!(f, "duplicate route name '{name}'")
            }
            RouterError::EmptyMethodSet { pattern } => write!(
                f,
                "route '{pattern}' has an empty method set but is not marked as a resource route"
            ),
            RouterError::NotWarmedUp => write!(f, "matcher has not been warmed up yet"),
        }
    }
}

impl std::error::Error for RouterError {}

/// Failures that can occur while matching an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// No route's path pattern matched the request path.
    NoRouteMatched,
    /// At least one route's path matched, but none accepted this method.
    MethodNotAllowed { allowed: BTreeSet<String> },
    /// A route matched path and method, but not the request scheme.
    SchemeNotAllowed { allowed: BTreeSet<String> },
    /// A route matched path and method, but not the request host.
    HostNotAllowed,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::NoRouteMatched => write!(f, "no route matched the request path"),
            MatchError::MethodNotAllowed { allowed } => {
                let methods = allowed.iter().cloned().collect::<Vec<_>>().join(", ");
                write!(f, "method not allowed; allowed methods: {methods}")
            }
            MatchError::SchemeNotAllowed { allowed } => {
                write!(f, "scheme not allowed; allowed schemes: {}", allowed.iter().cloned().collect::<Vec<_>>().join(", "))
            }
            MatchError::HostNotAllowed => write!(f, "host not allowed for the matched route"),
        }
    }
}

impl std::error::Error for MatchError {}

/// Failures that can occur while generating a URL from a route and
/// parameter map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlGenerationError {
    /// No route with this name exists in the catalog the generator was
    /// built from.
    UnknownRoute(String),
    /// A required variable had no bound value, route default, or inline
    /// default.
    MissingParameter { route: String, variable: String },
    /// A bound value did not satisfy the variable's assertion regex.
    AssertionFailed {
        route: String,
        variable: String,
        value: String,
    },
}

impl fmt::Display for UrlGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlGenerationError::UnknownRoute(name) => write!(f, "unknown route '{name}'"),
            UrlGenerationError::MissingParameter { route, variable } => write!(
                f,
                "route '{route}' is missing a value for required variable '{variable}'"
            ),
            UrlGenerationError::AssertionFailed {
                route,
                variable,
                value,
            } => write!(
                f,
                "value '{value}' for variable '{variable}' on route '{route}' does not satisfy its assertion"
            ),
        }
    }
}

impl std::error::Error for UrlGenerationError {}
