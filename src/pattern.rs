//! Tokenizes a route pattern string into static literals, variable
//! placeholders, and optional groups, splitting off an embedded
//! `scheme://host` prefix and `*<Class@method>` handler tail first.
//!
//! See the grammar in the crate's external interface documentation:
//! `pattern := [scheme "://"] [host] path [handlertail]`.

use crate::error::RouterError;
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 32;

/// One element of a tokenized pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    Literal(String),
    Var(Variable),
    GroupOpen,
    GroupClose,
}

/// A parsed `{name}`, `{name:regex}`, `{name=default}`, or
/// `{name:regex=default}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub regex: Option<String>,
    pub default: Option<String>,
}

/// A handler reference embedded directly in a pattern's `*<...>` tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedHandlerTail {
    Named(String),
    ClassMethod { class: String, method: String },
}

/// The result of splitting and tokenizing a full pattern string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPattern {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub host_tokens: Vec<Token>,
    pub path_tokens: Vec<Token>,
    pub handler_tail: Option<ParsedHandlerTail>,
}

/// Parses a full pattern string into its authority prefix, path tokens,
/// and handler tail.
pub fn parse(pattern: &str) -> Result<ParsedPattern, RouterError> {
    let (scheme, host, rest) = split_authority(pattern)?;
    let (path_part, handler_tail) = split_handler_tail(rest, pattern)?;

    let mut path = path_part.to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    let path_tokens = tokenize(&path, pattern)?;
    let host_tokens = match &host {
        Some(h) => tokenize(h, pattern)?,
        None => Vec::new(),
    };

    validate_unique_names(&host_tokens, &path_tokens, pattern)?;

    Ok(ParsedPattern {
        scheme,
        host,
        host_tokens,
        path_tokens,
        handler_tail,
    })
}

/// Splits an optional `scheme://` and/or `//host` prefix off the front of
/// a pattern. Either, both, or neither may be present; per the grammar the
/// `"://"` literal is really "optional scheme colon" followed by an
/// independently optional `"//host"`, which is what lets a pattern open
/// with a bare `//host/path` (no scheme) as well as `scheme://host/path`.
fn split_authority(pattern: &str) -> Result<(Option<String>, Option<String>, &str), RouterError> {
    let mut rest = pattern;
    let mut scheme = None;

    if !rest.starts_with('{') && !rest.starts_with('/') {
        if let Some(colon) = rest.find(':') {
            let candidate = &rest[..colon];
            let is_scheme_token = !candidate.is_empty()
                && candidate
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
            if is_scheme_token && rest[colon..].starts_with("://") {
                scheme = Some(candidate.to_ascii_lowercase());
                rest = &rest[colon + 3..];
            }
        }
    }

    let mut host = None;
    if rest.starts_with("//") {
        let after_slashes = &rest[2..];
        let host_end = find_unescaped(after_slashes, '/').unwrap_or(after_slashes.len());
        let (h, tail) = after_slashes.split_at(host_end);
        if h.is_empty() {
            return Err(RouterError::MalformedPattern {
                pattern: pattern.to_string(),
                reason: "empty host in authority prefix".to_string(),
            });
        }
        host = Some(h.to_string());
        rest = tail;
    }

    Ok((scheme, host, rest))
}

/// Splits a trailing `*<ClassName@method>` or `*<method>` handler tail off
/// the end of a pattern, if present.
fn split_handler_tail<'a>(
    rest: &'a str,
    full_pattern: &str,
) -> Result<(&'a str, Option<ParsedHandlerTail>), RouterError> {
    if !rest.ends_with('>') {
        return Ok((rest, None));
    }
    let Some(start) = rest.rfind("*<") else {
        return Ok((rest, None));
    };
    let path_part = &rest[..start];
    let inner = &rest[start + 2..rest.len() - 1];
    if path_part.is_empty() {
        return Err(RouterError::MalformedPattern {
            pattern: full_pattern.to_string(),
            reason: "handler tail has no path component".to_string(),
        });
    }
    let tail = match inner.split_once('@') {
        Some((class, method)) => ParsedHandlerTail::ClassMethod {
            class: class.to_string(),
            method: method.to_string(),
        },
        None => ParsedHandlerTail::Named(inner.to_string()),
    };
    Ok((path_part, Some(tail)))
}

/// Finds the first unescaped occurrence of `needle`, skipping over any
/// `{...}` variable span so a variable's own content (which may contain the
/// needle character) isn't mistaken for a structural separator.
fn find_unescaped(s: &str, needle: char) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ if depth == 0 && c == needle => return Some(i),
            _ => {}
        }
    }
    let _ = bytes;
    None
}

/// Tokenizes one segment (a path or a host) into literals, variables, and
/// optional-group markers.
fn tokenize(s: &str, full_pattern: &str) -> Result<Vec<Token>, RouterError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut bracket_depth: i32 = 0;
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                let mut depth = 1;
                let mut j = i + 1;
                while j < chars.len() && depth > 0 {
                    match chars[j] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(RouterError::MalformedPattern {
                        pattern: full_pattern.to_string(),
                        reason: "unbalanced braces in variable".to_string(),
                    });
                }
                let content: String = chars[i + 1..j].iter().collect();
                tokens.push(Token::Var(parse_variable(&content, full_pattern)?));
                i = j + 1;
            }
            '[' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                bracket_depth += 1;
                tokens.push(Token::GroupOpen);
                i += 1;
            }
            ']' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                bracket_depth -= 1;
                if bracket_depth < 0 {
                    return Err(RouterError::MalformedPattern {
                        pattern: full_pattern.to_string(),
                        reason: "unbalanced brackets: unmatched ']'".to_string(),
                    });
                }
                tokens.push(Token::GroupClose);
                i += 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    if bracket_depth != 0 {
        return Err(RouterError::MalformedPattern {
            pattern: full_pattern.to_string(),
            reason: "unbalanced brackets: unmatched '['".to_string(),
        });
    }
    Ok(tokens)
}

/// Parses the content between `{` and `}`: splits on the last `=` to
/// separate an optional default, then on the first `:` in what remains to
/// separate an optional regex/preset token from the name.
fn parse_variable(content: &str, full_pattern: &str) -> Result<Variable, RouterError> {
    let (head, default) = match content.rfind('=') {
        Some(idx) => (&content[..idx], Some(content[idx + 1..].to_string())),
        None => (content, None),
    };
    let (name, regex) = match head.find(':') {
        Some(idx) => (&head[..idx], Some(head[idx + 1..].to_string())),
        None => (head, None),
    };

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(RouterError::MalformedPattern {
            pattern: full_pattern.to_string(),
            reason: format!("variable name '{name}' must be 1-{MAX_NAME_LEN} characters"),
        });
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('0');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(RouterError::MalformedPattern {
            pattern: full_pattern.to_string(),
            reason: format!("variable name '{name}' must not start with a digit"),
        });
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouterError::MalformedPattern {
            pattern: full_pattern.to_string(),
            reason: format!("variable name '{name}' contains invalid characters"),
        });
    }

    if let Some(r) = &regex {
        let stripped = strip_anchors(r);
        if stripped.is_empty() {
            return Err(RouterError::MalformedPattern {
                pattern: full_pattern.to_string(),
                reason: format!("empty assertion for variable '{name}'"),
            });
        }
    }

    Ok(Variable {
        name: name.to_string(),
        regex,
        default,
    })
}

/// Tokenizes a standalone host string (one not embedded in a route
/// pattern, e.g. one contributed by [`crate::route::RouteSpec::host`] or
/// group inheritance) using the same grammar as a pattern's path.
pub(crate) fn tokenize_standalone(s: &str) -> Result<Vec<Token>, RouterError> {
    tokenize(s, s)
}

/// Strips one leading `^` and one trailing `$` from a regex fragment.
pub(crate) fn strip_anchors(s: &str) -> &str {
    let s = s.strip_prefix('^').unwrap_or(s);
    s.strip_suffix('$').unwrap_or(s)
}

fn validate_unique_names(
    host_tokens: &[Token],
    path_tokens: &[Token],
    full_pattern: &str,
) -> Result<(), RouterError> {
    let mut seen = std::collections::HashSet::new();
    for tok in host_tokens.iter().chain(path_tokens.iter()) {
        if let Token::Var(v) = tok {
            if !seen.insert(v.name.clone()) {
                return Err(RouterError::MalformedPattern {
                    pattern: full_pattern.to_string(),
                    reason: format!("duplicate variable name '{}'", v.name),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_static_path() {
        let parsed = parse("/blog/my-post").expect("parse");
        assert_eq!(parsed.path_tokens, vec![Token::Literal("/blog/my-post".into())]);
    }

    #[test]
    fn tokenizes_simple_variable() {
        let parsed = parse("/blog/{slug}").expect("parse");
        assert_eq!(
            parsed.path_tokens,
            vec![
                Token::Literal("/blog/".into()),
                Token::Var(Variable {
                    name: "slug".into(),
                    regex: None,
                    default: None
                })
            ]
        );
    }

    #[test]
    fn tokenizes_regex_with_nested_braces() {
        let parsed = parse(r"/items/{count:\d{1,3}}").expect("parse");
        let Token::Var(v) = &parsed.path_tokens[1] else {
            panic!("expected var token")
        };
        assert_eq!(v.name, "count");
        assert_eq!(v.regex.as_deref(), Some(r"\d{1,3}"));
    }

    #[test]
    fn tokenizes_default_value() {
        let parsed = parse("/user[/{id=0}]").expect("parse");
        assert!(parsed.path_tokens.contains(&Token::GroupOpen));
        assert!(parsed.path_tokens.contains(&Token::GroupClose));
    }

    #[test]
    fn splits_regex_and_default() {
        let parsed = parse(r"/year/{y:\d{4}=2000}").expect("parse");
        let Token::Var(v) = &parsed.path_tokens[1] else {
            panic!("expected var token")
        };
        assert_eq!(v.regex.as_deref(), Some(r"\d{4}"));
        assert_eq!(v.default.as_deref(), Some("2000"));
    }

    #[test]
    fn rejects_unbalanced_brackets() {
        assert!(parse("/user[/{id}").is_err());
        assert!(parse("/user/{id}]").is_err());
    }

    #[test]
    fn rejects_digit_leading_name() {
        assert!(parse("/x/{1bad}").is_err());
    }

    #[test]
    fn rejects_too_long_name() {
        let long = "a".repeat(33);
        let pattern = format!("/x/{{{long}}}");
        assert!(parse(&pattern).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        assert!(parse("/x/{id}/y/{id}").is_err());
    }

    #[test]
    fn rejects_empty_assert() {
        assert!(parse("/x/{id:^$}").is_err());
    }

    #[test]
    fn splits_scheme_and_host() {
        let parsed = parse("http://api.example.com/v1/{endpoint}").expect("parse");
        assert_eq!(parsed.scheme.as_deref(), Some("http"));
        assert_eq!(parsed.host.as_deref(), Some("api.example.com"));
        assert_eq!(parsed.path_tokens[0], Token::Literal("/v1/".into()));
    }

    #[test]
    fn splits_host_only_authority() {
        let parsed = parse("//api.example.com/v1/{endpoint}").expect("parse");
        assert_eq!(parsed.scheme, None);
        assert_eq!(parsed.host.as_deref(), Some("api.example.com"));
    }

    #[test]
    fn splits_handler_tail_named() {
        let parsed = parse("/blog/{slug}*<showPost>").expect("parse");
        assert_eq!(
            parsed.handler_tail,
            Some(ParsedHandlerTail::Named("showPost".into()))
        );
    }

    #[test]
    fn splits_handler_tail_class_method() {
        let parsed = parse("/blog/{slug}*<BlogController@show>").expect("parse");
        assert_eq!(
            parsed.handler_tail,
            Some(ParsedHandlerTail::ClassMethod {
                class: "BlogController".into(),
                method: "show".into(),
            })
        );
    }

    #[test]
    fn rejects_handler_tail_without_path() {
        assert!(parse("*<showPost>").is_err());
    }
}
