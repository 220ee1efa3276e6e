//! Canonical JSON encoding used for artifacts, reports and hashes.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::errors::BatchError;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => {
            let canonical_values = values.into_iter().map(canonicalize).collect();
            Value::Array(canonical_values)
        }
        other => other,
    }
}

/// Converts any serializable payload into a key-ordered JSON value.
///
/// Numbers are held as `i64`/`u64`/`f64` and written in their shortest
/// round-trip form; non-finite floats have no JSON representation and
/// become `null`.
pub fn to_normalized_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, BatchError> {
    let value = serde_json::to_value(value).map_err(|err| BatchError::serde("json_serialize", err))?;
    Ok(canonicalize(value))
}

/// Serializes a value into canonical JSON bytes with deterministic ordering.
pub fn to_canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, BatchError> {
    let canonical = to_normalized_value(value)?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical)
        .map_err(|err| BatchError::serde("json_write", err))?;
    Ok(bytes)
}

/// Serializes an artifact payload as indented canonical JSON, newline terminated.
pub fn to_artifact_bytes(value: &Value) -> Result<Vec<u8>, BatchError> {
    let canonical = canonicalize(value.clone());
    let mut bytes = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    canonical
        .serialize(&mut serializer)
        .map_err(|err| BatchError::serde("json_write", err))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, BatchError> {
    serde_json::from_slice(data).map_err(|err| BatchError::serde("json_deserialize", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_bytes_sort_keys_and_indent() {
        let value = json!({"b": 1, "a": {"d": true, "c": 2.5}});
        let text = String::from_utf8(to_artifact_bytes(&value).unwrap()).unwrap();
        assert!(text.starts_with("{\n    \"a\""));
        assert!(text.ends_with("}\n"));
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, value);
    }

    #[test]
    fn numbers_and_booleans_are_written_plainly() {
        #[derive(Serialize)]
        struct Rates {
            rate: f32,
            per_node: f64,
            parity: u8,
            bisec: bool,
        }
        let value = Rates {
            rate: 0.5,
            per_node: 1.0e8,
            parity: 2,
            bisec: false,
        };
        let bytes = to_canonical_json_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"bisec":false,"parity":2,"per_node":100000000.0,"rate":0.5}"#
        );
    }

    #[test]
    fn non_finite_floats_become_null() {
        let value = to_normalized_value(&vec![1.5f64, f64::NAN]).unwrap();
        assert_eq!(value, json!([1.5, null]));
    }
}
