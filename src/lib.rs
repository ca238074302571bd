//! # routecraft
//!
//! **routecraft** compiles a catalog of route patterns into anchored regexes
//! and matches incoming requests (method, scheme, host, path) against them,
//! extracting path and host parameter bindings. It also inverts the process,
//! generating a concrete URL from a route name and a parameter map.
//!
//! ## Architecture
//!
//! - **[`pattern`]** - tokenizes a route pattern string into static text,
//!   variables, and optional groups.
//! - **[`compiler`]** - turns parsed tokens into an anchored [`regex::Regex`]
//!   plus an ordered variable list, applying assertion presets.
//! - **[`route`]** - the frozen [`route::Route`] value type and the
//!   [`route::RouteSpec`] builder used to construct one.
//! - **[`catalog`]** - [`catalog::Catalog`], the route collection with
//!   prefix/assert/default grouping and duplicate-name rejection.
//! - **[`matcher`]** - [`matcher::Matcher`], the compiled, hot-swappable
//!   artifact that matches requests in near-constant time.
//! - **[`generator`]** - inverse URL generation from a route + parameter map.
//! - **[`cache`]** - a serializable cache artifact that lets a caller skip
//!   recompiling a catalog across process restarts.
//! - **[`error`]** - the crate's typed error enums.
//!
//! Request/response modeling, handler dispatch, middleware chaining,
//! annotation discovery, CLI entry points, server adapters, and config
//! loading are deliberately out of scope; callers own all of that and only
//! hand this crate primitive values.
//!
//! ### Request-handling flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Catalog as catalog::Catalog
//!     participant Matcher as matcher::Matcher
//!     participant Regex as regex::RegexSet
//!
//!     Caller->>Catalog: add(RouteSpec) / group(...)
//!     Caller->>Matcher: warm_up(&catalog)
//!     Matcher->>Matcher: compile routes, group by path
//!     Caller->>Matcher: match_request(&req)
//!     Matcher->>Matcher: static lookup (HashMap)
//!     alt no static hit
//!         Matcher->>Regex: matches(path)
//!         Regex-->>Matcher: matching pattern indices
//!         Matcher->>Matcher: re-run winning regex for captures
//!     end
//!     Matcher-->>Caller: MatchedRoute | MatchError
//! ```

pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod error;
pub mod generator;
pub mod matcher;
pub mod pattern;
pub mod route;

pub use cache::CacheArtifact;
pub use catalog::{Catalog, GroupOptions};
pub use error::{MatchError, RouterError, UrlGenerationError};
pub use generator::GeneratedUrl;
pub use matcher::{MatchRequest, MatchedRoute, Matcher};
pub use route::{Assert, HandlerToken, Route, RouteSpec};
