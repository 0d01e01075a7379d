//! Document normalization: recursive key canonicalization followed by a
//! canonical flattening of the JSON structure into serialized text.
//!
//! Normalization is a pure transform applied fresh on every ingestion run;
//! the normalized form is never persisted. Flattening is deterministic
//! (sorted key order), which the chunker and identity assigner rely on.

use serde_json::Value;

/// Legacy organizational term rewritten in keys during normalization.
const LEGACY_TERM: &str = "head";
/// Its current equivalent.
const CURRENT_TERM: &str = "chair";

/// Recursively canonicalize a JSON value.
///
/// - Mapping keys are lower-cased, and any occurrence of the legacy term
///   inside a key is rewritten to its current equivalent (the rest of the
///   key string is preserved).
/// - Sequence elements are normalized in order.
/// - Scalars pass through unchanged.
///
/// Total for any well-formed JSON value; never fails.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, val) in map {
                out.insert(normalize_key(key), normalize_value(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        scalar => scalar.clone(),
    }
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace(LEGACY_TERM, CURRENT_TERM)
}

/// Flatten a normalized JSON value into canonical serialized text.
///
/// Objects become `key: value` lines (nested objects are rendered inline as
/// `key – sub: val; sub2: val2`); top-level arrays become one block per
/// element separated by blank lines. Key order is sorted, so the output is
/// stable across runs — only chunk determinism matters downstream, and this
/// guarantees it.
pub fn flatten_document(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut lines = Vec::with_capacity(map.len());
            for (key, val) in sorted_entries(map) {
                lines.push(flatten_entry(key, val));
            }
            lines.join("\n")
        }
        Value::Array(items) => {
            let blocks: Vec<String> = items.iter().map(flatten_document).collect();
            blocks.join("\n\n")
        }
        scalar => render_scalar(scalar),
    }
}

fn flatten_entry(key: &str, value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let parts: Vec<String> = sorted_entries(map)
                .into_iter()
                .map(|(sub, subval)| format!("{}: {}", sub, render_value(subval)))
                .collect();
            format!("{} – {}", key, parts.join("; "))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(render_value).collect();
            format!("{}: {}", key, parts.join(", "))
        }
        scalar => format!("{}: {}", key, render_scalar(scalar)),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            // Deep nesting falls back to compact JSON; serde_json's default
            // map keeps keys sorted, so this stays canonical.
            value.to_string()
        }
        scalar => render_scalar(scalar),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn sorted_entries(map: &serde_json::Map<String, Value>) -> Vec<(&str, &Value)> {
    let mut entries: Vec<(&str, &Value)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_by_key(|(k, _)| *k);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_lowercased() {
        let input = json!({"Course_Code": "CS101", "CREDITS": 3});
        let out = normalize_value(&input);
        assert_eq!(out, json!({"course_code": "CS101", "credits": 3}));
    }

    #[test]
    fn test_legacy_term_rewritten_in_key() {
        let input = json!({"Head": "Dr. Smith"});
        let out = normalize_value(&input);
        assert_eq!(out, json!({"chair": "Dr. Smith"}));
    }

    #[test]
    fn test_legacy_term_rewrite_preserves_rest_of_key() {
        let input = json!({"Department Head Email": "x@example.edu"});
        let out = normalize_value(&input);
        assert_eq!(out, json!({"department chair email": "x@example.edu"}));
    }

    #[test]
    fn test_values_untouched() {
        // Only keys are rewritten; a value containing the legacy term
        // passes through unchanged.
        let input = json!({"title": "Head of Department"});
        let out = normalize_value(&input);
        assert_eq!(out, json!({"title": "Head of Department"}));
    }

    #[test]
    fn test_recursive_through_arrays_and_objects() {
        let input = json!({"Courses": [{"Name": "Intro", "Head TA": "Ana"}]});
        let out = normalize_value(&input);
        assert_eq!(out, json!({"courses": [{"name": "Intro", "chair ta": "Ana"}]}));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(normalize_value(&json!(42)), json!(42));
        assert_eq!(normalize_value(&json!("text")), json!("text"));
        assert_eq!(normalize_value(&json!(null)), json!(null));
    }

    #[test]
    fn test_flatten_object_sorted_lines() {
        let value = json!({"b": "two", "a": "one"});
        assert_eq!(flatten_document(&value), "a: one\nb: two");
    }

    #[test]
    fn test_flatten_nested_object_inline() {
        let value = json!({"advising": {"email": "cs@x.edu", "room": "B12"}});
        assert_eq!(
            flatten_document(&value),
            "advising – email: cs@x.edu; room: B12"
        );
    }

    #[test]
    fn test_flatten_array_one_block_per_element() {
        let value = json!([{"code": "CS101"}, {"code": "CS201"}]);
        assert_eq!(flatten_document(&value), "code: CS101\n\ncode: CS201");
    }

    #[test]
    fn test_flatten_inline_list_values() {
        let value = json!({"offered": ["Fall", "Spring"]});
        assert_eq!(flatten_document(&value), "offered: Fall, Spring");
    }

    #[test]
    fn test_flatten_deterministic() {
        let value = json!({"z": 1, "m": {"q": true, "a": null}, "a": [1, 2]});
        let one = flatten_document(&value);
        let two = flatten_document(&value);
        assert_eq!(one, two);
    }
}
