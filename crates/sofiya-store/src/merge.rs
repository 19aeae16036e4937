//! Recursive merge of JSON records
//!
//! Object values merge key by key. A `null` in the patch removes the key from
//! the target. Any other patch value replaces the target value, so arrays
//! are replaced wholesale rather than concatenated.

use serde_json::{Map, Value};

/// Merge `patch` into `target` in place
pub fn merge(target: &mut Value, patch: Value) {
    let Value::Object(patch) = patch else {
        *target = patch;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target) = target else {
        return;
    };

    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            merge(target.entry(key).or_insert(Value::Null), value);
        }
    }
}
