//! Hashing - SHA-256 fingerprints for render plans
//!
//! Identical specifications produce identical plan hashes. The output
//! location is left out because default filenames are random.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::resolve::RenderPlan;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            // Writing into a String cannot fail
            let _ = write!(out, "{:02x}", byte);
            out
        })
}

/// Compact JSON with object keys sorted at every depth.
///
/// Maps keep insertion order in memory, so the sort happens here.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&canonicalize(serde_json::to_value(value)?))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// plan_hash = sha256(canonical plan without output.path)
pub fn compute_plan_hash(plan: &RenderPlan) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(plan)?;
    if let Some(output) = value.get_mut("output").and_then(Value::as_object_mut) {
        output.remove("path");
    }
    Ok(sha256_hex(canonical_json(&value)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use crate::spec::PlotSpec;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": {"y": 2, "b": 3}});
        assert_eq!(canonical_json(&obj).unwrap(), r#"{"a":{"b":3,"y":2},"z":1}"#);
    }

    #[test]
    fn test_canonical_json_ignores_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("b".into(), json!(1));
        first.insert("a".into(), json!([{"d": 1, "c": 2}]));
        let mut second = serde_json::Map::new();
        second.insert("a".into(), json!([{"c": 2, "d": 1}]));
        second.insert("b".into(), json!(1));
        assert_eq!(canonical_json(&first).unwrap(), canonical_json(&second).unwrap());
        assert_eq!(canonical_json(&first).unwrap(), r#"{"a":[{"c":2,"d":1}],"b":1}"#);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_plan_hash_ignores_generated_filename() {
        let spec = PlotSpec::from_value(json!({
            "aes": {"x": "a"},
            "geom": {"type": "histogram", "params": {"bins": 20}},
        }))
        .unwrap();
        let a = resolve(&spec).unwrap();
        let b = resolve(&spec).unwrap();
        assert_ne!(a.output.path, b.output.path);
        assert_eq!(compute_plan_hash(&a).unwrap(), compute_plan_hash(&b).unwrap());
    }

    #[test]
    fn test_plan_hash_tracks_params() {
        let plan = |bins: u32| {
            let spec = PlotSpec::from_value(json!({
                "geom": {"type": "histogram", "params": {"bins": bins}},
            }))
            .unwrap();
            resolve(&spec).unwrap()
        };
        assert_ne!(
            compute_plan_hash(&plan(10)).unwrap(),
            compute_plan_hash(&plan(30)).unwrap()
        );
    }
}
