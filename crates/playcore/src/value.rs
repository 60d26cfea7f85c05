//! Helpers over the dynamic JSON values that flow between steps.

use serde_json::Map;

pub use serde_json::Value;

/// Name -> value mapping held by a running execution.
pub type Variables = Map<String, Value>;

/// Structured skill input or output.
pub type Payload = Map<String, Value>;

/// Resolve a dotted path such as `sum.result` or `items.0.name`.
///
/// Object segments are looked up by key, array segments by numeric index.
/// Returns `None` as soon as a segment cannot be followed.
pub fn lookup_path<'a>(variables: &'a Variables, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = variables.get(parts.next()?.trim())?;

    for part in parts {
        let part = part.trim();
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Check whether `s` is a dotted path of identifiers (`a`, `a.b`, `a.0.c`).
pub fn is_variable_path(s: &str) -> bool {
    let mut segments = s.split('.');
    let first_ok = segments.next().is_some_and(is_identifier);
    first_ok
        && segments.all(|seg| {
            is_identifier(seg) || (!seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()))
        })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Standard truthiness: null, false, zero, empty string/array/object are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Short type description used in diagnostics.
pub fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("object with {} keys", map.len()),
        Value::Array(items) => format!("array with {} items", items.len()),
        other => preview(other, 80),
    }
}

/// Display form of a value, truncated to `max` characters with `...`.
pub fn preview(value: &Value, max: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate(&text, max)
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
