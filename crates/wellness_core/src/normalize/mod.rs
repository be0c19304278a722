//! Field normalizers: one module per export domain.
//!
//! Both normalizers share the same contract: one raw vendor record in, one
//! flat row of stable column names out, independent of which schema variant
//! populated the source. Alias tables are declarative consts so each
//! resolution path can be tested on its own.

use serde_json::{Map, Value};

use crate::cell::Cell;

pub mod daily;
pub mod sleep;

/// First present, non-null value among `keys`.
pub(crate) fn pick<'a>(mapping: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| mapping.get(*k))
        .find(|v| !v.is_null())
}

/// `pick` collapsed to a scalar cell; containers resolve to None.
pub(crate) fn pick_cell(mapping: &Map<String, Value>, keys: &[&str]) -> Option<Cell> {
    pick(mapping, keys)
        .map(Cell::from_json)
        .filter(|c| !c.is_null())
}

/// First container found among `keys` whose value is an object.
pub(crate) fn pick_object<'a>(
    mapping: &'a Map<String, Value>,
    keys: &[&'a str],
) -> Option<(&'a str, &'a Map<String, Value>)> {
    for key in keys {
        if let Some(obj) = mapping.get(*key).and_then(|v| v.as_object()) {
            return Some((*key, obj));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pick_skips_null_values() {
        let obj = json!({"a": null, "b": 2});
        let map = obj.as_object().unwrap();
        assert_eq!(pick(map, &["a", "b"]), Some(&json!(2)));
        assert_eq!(pick(map, &["a", "missing"]), None);
    }

    #[test]
    fn pick_object_returns_first_object_valued_key() {
        let obj = json!({"x": [1], "y": {"k": 1}});
        let map = obj.as_object().unwrap();
        let (name, inner) = pick_object(map, &["x", "y"]).unwrap();
        assert_eq!(name, "y");
        assert_eq!(inner.get("k"), Some(&json!(1)));
    }
}
