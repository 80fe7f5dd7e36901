//! Key-wise recursive merge used to build the maximum compatible card.
//!
//! For each key present in any input, the non-null values are collected in input order.
//! All objects: merged recursively. Otherwise the last value wins, except that an empty array
//! never beats an earlier non-empty value. Arrays are replaced whole, never unioned.

use serde_json::{Map, Value};

/// Merge objects left to right; later inputs take precedence.
pub fn merge_objects(objects: &[&Map<String, Value>]) -> Map<String, Value> {
    let mut out = Map::new();
    for obj in objects {
        for key in obj.keys() {
            if out.contains_key(key) {
                continue;
            }
            let candidates: Vec<&Value> = objects
                .iter()
                .filter_map(|o| o.get(key))
                .filter(|v| !v.is_null())
                .collect();
            if let Some(merged) = merge_values(&candidates) {
                out.insert(key.clone(), merged);
            }
        }
    }
    out
}

fn merge_values(candidates: &[&Value]) -> Option<Value> {
    if candidates.is_empty() {
        return None;
    }
    let objects: Vec<&Map<String, Value>> = candidates.iter().filter_map(|v| v.as_object()).collect();
    if objects.len() == candidates.len() {
        return Some(Value::Object(merge_objects(&objects)));
    }
    candidates
        .iter()
        .rev()
        .find(|v| !is_empty_array(v))
        .or_else(|| candidates.last())
        .map(|v| (*v).clone())
}

#[inline]
fn is_empty_array(value: &Value) -> bool {
    value.as_array().is_some_and(Vec::is_empty)
}
