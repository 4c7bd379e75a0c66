//! Document value algebra: smart-merge and denumeration.

use serde_json::Value as JsonValue;

use crate::error::{IndexerError, Result};

/// Collapse a fetched value list to its document form: empty becomes null,
/// a singleton becomes the element, anything longer stays a list.
pub fn denumerate(mut values: Vec<JsonValue>) -> JsonValue {
    match values.len() {
        0 => JsonValue::Null,
        1 => values.remove(0),
        _ => JsonValue::Array(values),
    }
}

/// Merge two documents built from different sub-definitions of a composite
/// index.
///
/// Shared keys combine recursively: nulls yield to the other side, lists
/// concatenate (deduplicated), a scalar joins a list, maps merge key-wise,
/// and two scalars become a deduplicated list. Any other combination is a
/// [`IndexerError::MergeConflict`].
pub fn smart_merge(a: JsonValue, b: JsonValue) -> Result<JsonValue> {
    match (a, b) {
        (JsonValue::Null, b) => Ok(b),
        (a, JsonValue::Null) => Ok(a),
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            let mut merged = a;
            for item in b {
                push_unique(&mut merged, item);
            }
            Ok(JsonValue::Array(merged))
        }
        (JsonValue::Array(mut a), b) if is_scalar(&b) => {
            push_unique(&mut a, b);
            Ok(JsonValue::Array(a))
        }
        (a, JsonValue::Array(mut b)) if is_scalar(&a) => {
            // Keep the list side's order, appending the scalar.
            push_unique(&mut b, a);
            Ok(JsonValue::Array(b))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            let mut merged = a;
            for (key, b_val) in b {
                let combined = match merged.remove(&key) {
                    Some(a_val) => smart_merge(a_val, b_val)?,
                    None => b_val,
                };
                merged.insert(key, combined);
            }
            Ok(JsonValue::Object(merged))
        }
        (a, b) if is_scalar(&a) && is_scalar(&b) => {
            let mut merged = vec![a];
            push_unique(&mut merged, b);
            Ok(JsonValue::Array(merged))
        }
        (a, b) => Err(IndexerError::MergeConflict(format!(
            "cannot merge {} with {}",
            type_name(&a),
            type_name(&b)
        ))),
    }
}

fn is_scalar(value: &JsonValue) -> bool {
    matches!(
        value,
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)
    )
}

fn push_unique(list: &mut Vec<JsonValue>, item: JsonValue) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "map",
    }
}
