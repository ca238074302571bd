//! The inverse of matching: given a named route and a parameter map,
//! renders a concrete path (and, for host-bound routes, a host and scheme)
//! by walking the route's own token stream rather than re-deriving one from
//! its compiled regex.

use crate::catalog::{Catalog, CatalogEntry};
use crate::compiler::VariableSlot;
use crate::error::UrlGenerationError;
use crate::pattern::{Token, Variable};
use crate::route::Route;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// A generated URL's pieces. Left to the caller to assemble into a single
/// string in whatever form their transport layer expects (this crate does
/// not know if it's building an absolute URL, a relative path for a
/// same-origin redirect, or something else).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUrl {
    pub path: String,
    pub host: Option<String>,
    pub scheme: Option<String>,
}

impl GeneratedUrl {
    /// Assembles `scheme://host` + `path` into one string, falling back to
    /// a bare path when the route carries no host.
    pub fn to_url_string(&self) -> String {
        match &self.host {
            Some(host) => {
                let scheme = self.scheme.as_deref().unwrap_or("http");
                format!("{scheme}://{host}{}", self.path)
            }
            None => self.path.clone(),
        }
    }
}

/// Generates a [`GeneratedUrl`] for the route named `name` in `catalog`,
/// substituting `params` (falling back to each variable's inline default,
/// then its route-level default) into the route's path and, if host-bound,
/// its first host template.
///
/// # Errors
/// [`UrlGenerationError::UnknownRoute`] if no route in `catalog` carries
/// this name; [`UrlGenerationError::MissingParameter`] if a variable
/// outside every optional group has no value from any source.
pub fn generate(
    catalog: &Catalog,
    name: &str,
    params: &HashMap<String, Value>,
) -> Result<GeneratedUrl, UrlGenerationError> {
    let entry = catalog
        .get_by_name(name)
        .ok_or_else(|| UrlGenerationError::UnknownRoute(name.to_string()))?;

    let slots: HashMap<&str, &VariableSlot> = entry
        .compiled
        .variables()
        .map(|slot| (slot.name.as_str(), slot))
        .collect();

    let path = render(&entry.compiled.path_tokens, &entry.route, params, name, &slots)?.0;

    let host = match entry.compiled.host_token_sets.first() {
        Some(tokens) => Some(render(tokens, &entry.route, params, name, &slots)?.0),
        None => None,
    };

    let scheme = select_scheme(entry);

    Ok(GeneratedUrl { path, host, scheme })
}

/// Prefers `https` if the route allows it, otherwise the lexicographically
/// first scheme the route declares, otherwise scheme-less. Sets are
/// unordered, so "first" is made deterministic via a `BTreeSet`.
fn select_scheme(entry: &CatalogEntry) -> Option<String> {
    if entry.route.schemes.is_empty() {
        return None;
    }
    if entry.route.schemes.contains("https") {
        return Some("https".to_string());
    }
    let sorted: BTreeSet<&String> = entry.route.schemes.iter().collect();
    sorted.into_iter().next().cloned()
}

/// Renders one token sequence (a route's path, or its first host template).
/// Returns the rendered string and whether any variable inside it resolved
/// to a value, which is how an enclosing optional group decides whether to
/// keep or elide itself.
fn render(
    tokens: &[Token],
    route: &Route,
    params: &HashMap<String, Value>,
    route_name: &str,
    slots: &HashMap<&str, &VariableSlot>,
) -> Result<(String, bool), UrlGenerationError> {
    let mut idx = 0;
    render_seq(tokens, &mut idx, route, params, route_name, slots, false)
}

#[allow(clippy::too_many_arguments)]
fn render_seq(
    tokens: &[Token],
    idx: &mut usize,
    route: &Route,
    params: &HashMap<String, Value>,
    route_name: &str,
    slots: &HashMap<&str, &VariableSlot>,
    in_group: bool,
) -> Result<(String, bool), UrlGenerationError> {
    let mut body = String::new();
    let mut any_resolved = false;

    while *idx < tokens.len() {
        match &tokens[*idx] {
            Token::GroupClose => return Ok((body, any_resolved)),
            Token::GroupOpen => {
                *idx += 1;
                let (inner, inner_resolved) =
                    render_seq(tokens, idx, route, params, route_name, slots, true)?;
                if *idx < tokens.len() && matches!(tokens[*idx], Token::GroupClose) {
                    *idx += 1;
                }
                if inner_resolved {
                    body.push_str(&inner);
                }
                any_resolved = any_resolved || inner_resolved;
            }
            Token::Literal(s) => {
                body.push_str(s);
                *idx += 1;
            }
            Token::Var(v) => {
                match resolve_value(v, route, params) {
                    Some((value, from_params)) => {
                        if from_params {
                            check_assertion(slots, v, &value, route_name)?;
                        }
                        percent_encode_into(&mut body, &value);
                        any_resolved = true;
                    }
                    None => {
                        if !in_group {
                            return Err(UrlGenerationError::MissingParameter {
                                route: route_name.to_string(),
                                variable: v.name.clone(),
                            });
                        }
                    }
                }
                *idx += 1;
            }
        }
    }
    Ok((body, any_resolved))
}

/// Validates a caller-supplied (not defaulted) value against the variable's
/// compiled assertion fragment. Defaults aren't checked here: they were
/// supplied by whoever built the route, not the caller of `generate`, so a
/// mismatch there is a route-authoring bug rather than a generation-time
/// one.
fn check_assertion(
    slots: &HashMap<&str, &VariableSlot>,
    var: &Variable,
    value: &str,
    route_name: &str,
) -> Result<(), UrlGenerationError> {
    let Some(slot) = slots.get(var.name.as_str()) else {
        return Ok(());
    };
    let anchored = format!("^(?:{})$", slot.assert_source);
    let Ok(re) = Regex::new(&anchored) else {
        return Ok(());
    };
    if re.is_match(value) {
        Ok(())
    } else {
        Err(UrlGenerationError::AssertionFailed {
            route: route_name.to_string(),
            variable: var.name.clone(),
            value: value.to_string(),
        })
    }
}

/// Resolves a variable's substitution value: the caller-supplied parameter
/// map first, then the placeholder's own inline `{name=default}`, then the
/// route's builder-supplied default. A `Value::Null` anywhere in that chain
/// is treated the same as absent. The returned bool is true only when the
/// value came from `params` itself, which is what decides whether
/// [`check_assertion`] runs, since a route's own defaults are trusted as-is.
fn resolve_value(
    var: &Variable,
    route: &Route,
    params: &HashMap<String, Value>,
) -> Option<(String, bool)> {
    if let Some(v) = params.get(&var.name) {
        if let Some(s) = value_to_string(v) {
            return Some((s, true));
        }
    }
    if let Some(default) = &var.default {
        return Some((default.clone(), false));
    }
    if let Some(v) = route.defaults.get(&var.name) {
        if let Some(s) = value_to_string(v) {
            return Some((s, false));
        }
    }
    None
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Percent-encodes `value` and appends it to `out`, leaving the separator
/// set `spec.md` §4.5 names (`/ . - _ ~ : @`) unescaped so a substituted
/// value that itself contains a decorative separator round-trips as typed
/// path structure rather than an opaque escaped blob.
fn percent_encode_into(out: &mut String, value: &str) {
    const SAFE: &[u8] = b"/.-_~:@";
    for byte in value.as_bytes() {
        let c = *byte;
        let is_unreserved =
            c.is_ascii_alphanumeric() || SAFE.contains(&c);
        if is_unreserved {
            out.push(c as char);
        } else {
            out.push('%');
            out.push_str(&format!("{c:02X}"));
        }
    }
}
