//! Turns a parsed pattern's token stream into an anchored [`regex::Regex`]
//! plus an ordered variable table, the `CompiledRoute` record of the
//! external interface.

use crate::error::RouterError;
use crate::pattern::{self, ParsedPattern, Token, Variable};
use crate::route::Assert;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

static PRESETS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("int", r"\d+");
    m.insert("lower", "[a-z]+");
    m.insert("upper", "[A-Z]+");
    m.insert("alpha", "[A-Za-z]+");
    m.insert("alnum", "[A-Za-z0-9]+");
    m.insert("year", "[12][0-9]{3}");
    m.insert("month", "0[1-9]|1[012]");
    m.insert("day", "0[1-9]|[12][0-9]|3[01]");
    m.insert(
        "uuid",
        "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    );
    m
});

const DEFAULT_ASSERT: &str = "[^/]+";

/// One entry in a [`CompiledRoute`]'s variable table, in discovery order
/// (host variables first, then path variables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSlot {
    pub name: String,
    /// The variable's own inline `{name=default}` default, if any. A
    /// route-level default supplied via [`crate::route::RouteSpec::default`]
    /// is consulted separately, as a fallback, by the matcher and
    /// generator; it is not folded in here.
    pub default: Option<Value>,
    /// False when the variable sits inside an optional group, meaning a
    /// caller may omit it without the whole route becoming unmatchable.
    pub required: bool,
    /// The resolved regex fragment (preset, inline token, or route assert)
    /// this variable's capture group was built from, kept so the URL
    /// generator can validate a substituted value without re-running the
    /// whole pattern's assertion-resolution logic.
    pub assert_source: String,
}

/// The compiler's output for one route: its anchored path regex, zero or
/// more anchored host regexes, and the ordered variable table used by both
/// the matcher (to know what to bind) and the URL generator (to know what
/// must be supplied).
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub path_regex: Regex,
    /// The anchored path regex source, kept around for cache
    /// serialization and for re-deriving the `RegexSet` entry.
    pub path_regex_source: String,
    pub host_regexes: Vec<Regex>,
    pub host_regex_sources: Vec<String>,
    /// Variables captured by `path_regex`, in discovery order.
    pub path_variables: Vec<VariableSlot>,
    /// Variables captured across `host_regexes`, in discovery order. Kept
    /// apart from `path_variables` because routes sharing an identical
    /// compiled path (grouped together by the matcher) may still differ in
    /// host, so host bindings must be resolved per-variant rather than per
    /// path group.
    pub host_variables: Vec<VariableSlot>,
    pub path_tokens: Vec<Token>,
    pub host_token_sets: Vec<Vec<Token>>,
    /// The pattern with each variable replaced by `<name>`, optional-group
    /// brackets intact: a human-readable template, not used for matching.
    pub template: String,
    /// Computed once at compile time rather than re-derived from
    /// `path_tokens`, so a [`crate::cache::CacheArtifact`] load (which
    /// never reconstructs token streams) can restore it directly.
    is_static: bool,
}

impl CompiledRoute {
    /// True when this route has no path variables and no host constraint,
    /// i.e. it can be matched by a plain string lookup instead of a regex.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// All variables in the order the external interface specifies: host
    /// variables first, then path variables.
    pub fn variables(&self) -> impl Iterator<Item = &VariableSlot> {
        self.host_variables.iter().chain(self.path_variables.iter())
    }
}

/// Compiles a parsed pattern's path and host token streams, given the
/// route's per-variable assertion overrides, into a [`CompiledRoute`].
/// `extra_hosts` are host patterns contributed by builder calls or group
/// inheritance beyond the one (if any) embedded in the pattern itself.
pub fn compile(
    parsed: &ParsedPattern,
    asserts: &HashMap<String, Assert>,
) -> Result<CompiledRoute, RouterError> {
    compile_with_hosts(&parsed.path_tokens, &collect_hosts(parsed), asserts)
}

fn collect_hosts(parsed: &ParsedPattern) -> Vec<Vec<Token>> {
    if parsed.host_tokens.is_empty() {
        Vec::new()
    } else {
        vec![parsed.host_tokens.clone()]
    }
}

/// Compiles path tokens plus an explicit list of host token sets (used by
/// [`crate::route::RouteSpec::build`] once group-inherited hosts have been
/// folded into the final host list).
pub fn compile_with_hosts(
    path_tokens: &[Token],
    host_token_sets: &[Vec<Token>],
    asserts: &HashMap<String, Assert>,
) -> Result<CompiledRoute, RouterError> {
    validate_unique_names(path_tokens, host_token_sets)?;

    let mut host_variables = Vec::new();
    let mut host_regexes = Vec::new();
    let mut host_regex_sources = Vec::new();

    for host_tokens in host_token_sets {
        let mut idx = 0;
        let (body, vars, _template) = compile_seq(host_tokens, &mut idx, asserts, false)?;
        let source = format!("(?i)^{body}$");
        let regex = Regex::new(&source).map_err(|e| RouterError::MalformedPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;
        host_regexes.push(regex);
        host_regex_sources.push(source);
        host_variables.extend(vars);
    }

    let mut idx = 0;
    let (path_body, path_variables, template) = compile_seq(path_tokens, &mut idx, asserts, false)?;
    let path_regex_source = format!("(?s)^{path_body}$");
    let path_regex =
        Regex::new(&path_regex_source).map_err(|e| RouterError::MalformedPattern {
            pattern: path_regex_source.clone(),
            reason: e.to_string(),
        })?;

    let is_static = host_token_sets.is_empty() && path_variables.is_empty();

    Ok(CompiledRoute {
        path_regex,
        path_regex_source,
        host_regexes,
        host_regex_sources,
        path_variables,
        host_variables,
        path_tokens: path_tokens.to_vec(),
        host_token_sets: host_token_sets.to_vec(),
        template,
        is_static,
    })
}

/// Reconstructs a [`CompiledRoute`] from the already-resolved regex source
/// strings and variable tables a [`crate::cache::CacheArtifact`] persisted,
/// skipping the pattern parser and assertion/preset resolution entirely,
/// so the only work left is `Regex::new` on each source.
pub(crate) fn from_cached_sources(
    path_regex_source: String,
    host_regex_sources: Vec<String>,
    path_variables: Vec<VariableSlot>,
    host_variables: Vec<VariableSlot>,
    path_tokens: Vec<Token>,
    host_token_sets: Vec<Vec<Token>>,
    template: String,
) -> Result<CompiledRoute, RouterError> {
    let path_regex = Regex::new(&path_regex_source).map_err(|e| RouterError::MalformedPattern {
        pattern: path_regex_source.clone(),
        reason: e.to_string(),
    })?;
    let host_regexes = host_regex_sources
        .iter()
        .map(|s| {
            Regex::new(s).map_err(|e| RouterError::MalformedPattern {
                pattern: s.clone(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let is_static = host_regex_sources.is_empty() && path_variables.is_empty();

    Ok(CompiledRoute {
        path_regex,
        path_regex_source,
        host_regexes,
        host_regex_sources,
        path_variables,
        host_variables,
        path_tokens,
        host_token_sets,
        template,
        is_static,
    })
}

fn validate_unique_names(
    path_tokens: &[Token],
    host_token_sets: &[Vec<Token>],
) -> Result<(), RouterError> {
    let mut seen = std::collections::HashSet::new();
    for tok in host_token_sets
        .iter()
        .flat_map(|set| set.iter())
        .chain(path_tokens.iter())
    {
        if let Token::Var(v) = tok {
            if !seen.insert(v.name.clone()) {
                return Err(RouterError::MalformedPattern {
                    pattern: v.name.clone(),
                    reason: format!("duplicate variable name '{}'", v.name),
                });
            }
        }
    }
    Ok(())
}

fn compile_seq(
    tokens: &[Token],
    idx: &mut usize,
    asserts: &HashMap<String, Assert>,
    in_group: bool,
) -> Result<(String, Vec<VariableSlot>, String), RouterError> {
    let mut body = String::new();
    let mut variables = Vec::new();
    let mut template = String::new();

    while *idx < tokens.len() {
        match &tokens[*idx] {
            Token::GroupClose => {
                return Ok((body, variables, template));
            }
            Token::GroupOpen => {
                *idx += 1;
                let (inner_body, inner_vars, inner_template) =
                    compile_seq(tokens, idx, asserts, true)?;
                if *idx < tokens.len() && matches!(tokens[*idx], Token::GroupClose) {
                    *idx += 1;
                }
                body.push_str("(?:");
                body.push_str(&inner_body);
                body.push_str(")?");
                template.push('[');
                template.push_str(&inner_template);
                template.push(']');
                variables.extend(inner_vars);
            }
            Token::Literal(s) => {
                body.push_str(&regex::escape(s));
                template.push_str(s);
                *idx += 1;
            }
            Token::Var(v) => {
                let fragment = resolve_assert(v, asserts)?;
                body.push_str("(?P<");
                body.push_str(&v.name);
                body.push('>');
                body.push_str(&fragment);
                body.push(')');
                template.push('<');
                template.push_str(&v.name);
                template.push('>');
                variables.push(VariableSlot {
                    name: v.name.clone(),
                    default: v.default.as_ref().map(|d| Value::String(d.clone())),
                    required: !in_group,
                    assert_source: fragment,
                });
                *idx += 1;
            }
        }
    }
    Ok((body, variables, template))
}

/// Resolves a variable's assertion per the priority order: an inline token
/// that exactly names a preset resolves to that preset; any other inline
/// token is used verbatim as a literal regex fragment; absent an inline
/// token, the route's own per-variable assert (joined with `|` for a list);
/// absent that, the default `[^/]+`.
fn resolve_assert(var: &Variable, asserts: &HashMap<String, Assert>) -> Result<String, RouterError> {
    if let Some(token) = &var.regex {
        if let Some(preset) = PRESETS.get(token.as_str()) {
            return Ok((*preset).to_string());
        }
        return Ok(pattern::strip_anchors(token).to_string());
    }
    if let Some(assert) = asserts.get(&var.name) {
        return Ok(assert.as_regex_fragment());
    }
    Ok(DEFAULT_ASSERT.to_string())
}
