//! `{{placeholder}}` templating over an event payload.
//!
//! A token is `{{ path }}` or `{{ path | fallback }}`. Resolution order:
//! 1. dotted path lookup in the payload (`donor.name`, `items.0.sku`);
//! 2. the literal fallback after `|`, when present;
//! 3. the caller's [`MissingPolicy`].

use serde_json::Value;
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// What to do with a token whose path does not resolve and that has no
/// fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Render as the empty string.
    #[default]
    Blank,
    /// Fail with [`TemplateError::Unresolved`].
    Error,
    /// Leave the `{{token}}` in the output untouched.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("empty placeholder at byte {0}")]
    Empty(usize),

    #[error("placeholder '{0}' does not resolve against the payload")]
    Unresolved(String),
}

/// One parsed `{{...}}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub path: &'a str,
    pub fallback: Option<&'a str>,
    /// The whole token including braces.
    pub raw: &'a str,
}

enum Segment<'a> {
    Text(&'a str),
    Token(Placeholder<'a>),
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(TemplateError::Unterminated(offset + start))?;

        let inner = &after_open[..end];
        let (path, fallback) = match inner.split_once('|') {
            Some((p, f)) => (p.trim(), Some(f.trim())),
            None => (inner.trim(), None),
        };
        if path.is_empty() {
            return Err(TemplateError::Empty(offset + start));
        }

        let token_len = OPEN.len() + end + CLOSE.len();
        segments.push(Segment::Token(Placeholder {
            path,
            fallback,
            raw: &rest[start..start + token_len],
        }));

        offset += start + token_len;
        rest = &rest[start + token_len..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

/// List every placeholder in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<Placeholder<'_>>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|s| match s {
            Segment::Token(p) => Some(p),
            Segment::Text(_) => None,
        })
        .collect())
}

/// Read the value at a dotted `path`. Numeric segments index into arrays.
///
/// Returns `None` when any segment is missing or traverses a scalar.
pub fn lookup<'v>(payload: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(payload, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render a JSON value the way it should appear inside text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Render `template` against `payload`.
pub fn render(template: &str, payload: &Value, policy: MissingPolicy) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());

    for segment in parse(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Token(token) => match (lookup(payload, token.path), token.fallback) {
                (Some(value), _) => out.push_str(&display_value(value)),
                (None, Some(fallback)) => out.push_str(fallback),
                (None, None) => match policy {
                    MissingPolicy::Blank => {}
                    MissingPolicy::Keep => out.push_str(token.raw),
                    MissingPolicy::Error => {
                        return Err(TemplateError::Unresolved(token.path.to_owned()))
                    }
                },
            },
        }
    }

    Ok(out)
}
