//! Coerce arbitrary manifest JSON values into display text.
//!
//! Upstream stages have stored the same logical field as a string, a
//! `{english, romaji}` map, a list of names, or a bare number. Everything
//! that ends up in the package must be plain text, never `{...}` or `[...]`.

use serde_json::Value;

/// Map keys tried, in order, before falling back to concatenation.
pub const PREFERRED_KEYS: &[&str] = &["english", "en", "name", "title", "value", "romaji", "text"];

/// Keys that reduce an asset record to its file name, in order.
pub const FILE_KEYS: &[&str] = &["file", "filename", "path", "name", "src"];

/// Render a JSON value as trimmed text.
///
/// - string: trimmed
/// - number/bool: display form
/// - map: first non-empty [`PREFERRED_KEYS`] entry, else the non-empty
///   values joined with `, `
/// - sequence: non-empty items joined with `, `
/// - null: empty
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => join_non_empty(items.iter()),
        Value::Object(map) => {
            for key in PREFERRED_KEYS {
                if let Some(v) = map.get(*key) {
                    let text = coerce_text(v);
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
            join_non_empty(map.values())
        }
    }
}

fn join_non_empty<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values
        .map(coerce_text)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coerce `obj[key]`, returning `None` for missing or empty values.
pub fn text_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).map(coerce_text).filter(|s| !s.is_empty())
}

/// First non-empty coerced value among `keys`.
pub fn first_text(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_field(obj, key))
}

/// Read an unsigned integer that may have been stored as a number or a
/// numeric string.
pub fn u32_field(obj: &Value, key: &str) -> Option<u32> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn bool_field(obj: &Value, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_u64().is_some_and(|v| v != 0),
        _ => false,
    }
}

/// Reduce an asset entry (bare file name or metadata record) to its file name.
pub fn asset_file(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(_) => FILE_KEYS.iter().find_map(|key| match value.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }),
        _ => None,
    }
}
