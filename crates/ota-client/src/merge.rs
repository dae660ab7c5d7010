//! JSON merging for multi-file string sets
//!
//! When several files contribute to one string map, later files win on key
//! collisions. Deep merge combines nested objects key by key; shallow merge
//! replaces colliding top-level values wholesale.

use serde_json::{Map, Value};

/// Recursively merge `src` into `dest`.
///
/// Object values are combined key by key; any other collision lets `src`
/// replace the existing value.
pub(crate) fn deep_merge(dest: &mut Value, src: Value) {
    match (dest, src) {
        (Value::Object(dest), Value::Object(src)) => {
            for (key, value) in src {
                deep_merge(dest.entry(key).or_insert(Value::Null), value);
            }
        }
        (dest, src) => *dest = src,
    }
}

/// Merge `src` into the accumulator map, deeply or shallowly.
pub(crate) fn merge_object(dest: &mut Map<String, Value>, src: Map<String, Value>, deep: bool) {
    if deep {
        for (key, value) in src {
            deep_merge(dest.entry(key).or_insert(Value::Null), value);
        }
    } else {
        dest.extend(src);
    }
}
