//! Structured value merging
//!
//! Deep merge for JSON extension payloads. The merge is not commutative:
//! lists concatenate left then right, and on scalar or type clashes the right
//! side wins.
//!
//! ```
//! use featmerge_core::structured::merge_structured;
//! use serde_json::json;
//!
//! let merged = merge_structured(&json!({"a": 1, "b": {"c": 1}}), &json!({"b": {"d": 2}, "e": 5}));
//! assert_eq!(merged, json!({"a": 1, "b": {"c": 1, "d": 2}, "e": 5}));
//! ```

use serde_json::{Map, Value};
use std::fmt;

/// Top-level shape of a JSON value, used in mismatch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Array,
    Object,
    String,
    Number,
    Boolean,
    Null,
}

impl ValueShape {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => ValueShape::Array,
            Value::Object(_) => ValueShape::Object,
            Value::String(_) => ValueShape::String,
            Value::Number(_) => ValueShape::Number,
            Value::Bool(_) => ValueShape::Boolean,
            Value::Null => ValueShape::Null,
        }
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueShape::Array => "ARRAY",
            ValueShape::Object => "OBJECT",
            ValueShape::String => "STRING",
            ValueShape::Number => "NUMBER",
            ValueShape::Boolean => "BOOLEAN",
            ValueShape::Null => "NULL",
        };
        f.write_str(name)
    }
}

/// Concatenate two lists in order, without deduplication
pub fn concat_arrays(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut result = a.to_vec();
    result.extend_from_slice(b);
    result
}

/// Deep merge two objects
///
/// Keys keep the order of `a`, with keys only present in `b` appended.
pub fn merge_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut result = a.clone();
    for (key, incoming) in b {
        let merged = match result.get(key) {
            Some(existing) => merge_structured(existing, incoming),
            None => incoming.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// Merge two structured values
///
/// - two lists concatenate
/// - two objects deep-merge
/// - anything else, including differing shapes, yields `b`
pub fn merge_structured(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Array(left), Value::Array(right)) => Value::Array(concat_arrays(left, right)),
        (Value::Object(left), Value::Object(right)) => Value::Object(merge_objects(left, right)),
        (_, b) => b.clone(),
    }
}
