//! Object flattening.
//!
//! Turns an arbitrarily nested JSON object into a [`FlattenedDocument`]:
//! every scalar leaf becomes a value of the field named by the mapping keys
//! on its path, joined with `_`. Sequence positions are not part of the name,
//! so the elements of a list all land on the same field.

use serde_json::Value;

use crate::types::FlattenedDocument;

/// Separator between the mapping keys of a field path.
pub const PATH_SEPARATOR: &str = "_";

/// Flatten a nested object.
///
/// `null` leaves are dropped. A scalar with no mapping key above it (a bare
/// scalar root, or a scalar directly inside a root-level list) has no field
/// name and is dropped as well.
///
/// ```
/// use expander_shared::flatten::flatten;
/// use serde_json::json;
///
/// let doc = flatten(&json!({"run_list": ["a", "b"], "automatic": {"os": "linux"}}));
/// assert_eq!(doc.get("run_list").unwrap(), ["a", "b"]);
/// assert_eq!(doc.get("automatic_os").unwrap(), ["linux"]);
/// ```
pub fn flatten(object: &Value) -> FlattenedDocument {
    let mut document = FlattenedDocument::new();
    let mut path = Vec::new();
    walk(object, &mut path, &mut document);
    document
}

fn walk<'a>(value: &'a Value, path: &mut Vec<&'a str>, document: &mut FlattenedDocument) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.as_str());
                walk(child, path, document);
                path.pop();
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, path, document);
            }
        }
        Value::Null => {}
        scalar => {
            if path.is_empty() {
                return;
            }
            document.push(path.join(PATH_SEPARATOR), scalar_to_string(scalar));
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
