//! Locating per-day records inside a parsed export document.
//!
//! The vendor wraps the same record list in several top-level shapes
//! depending on export vintage. Malformed shapes contribute zero records
//! rather than an error; one bad file among many should not abort a run.

use serde_json::{Map, Value};

/// Wrapper keys checked, in order, for daily-summary documents.
pub const DAILY_WRAPPER_KEYS: &[&str] = &["dailySummaries", "entries", "summaries", "records"];

/// Wrapper keys checked, in order, for sleep documents.
pub const SLEEP_WRAPPER_KEYS: &[&str] = &["sleepData", "dailySleep", "sleep"];

/// Keys that identify a mapping as a single record rather than a wrapper.
const DATE_KEYS: &[&str] = &["calendarDate", "calendarDateStr"];

/// Return the per-record mappings found inside `payload`.
///
/// - a top-level list yields its object elements (others silently dropped)
/// - a mapping yields the list under the first present wrapper key
/// - a mapping that itself carries a date key is a singleton record
/// - anything else yields nothing
pub fn extract_records<'a>(payload: &'a Value, wrapper_keys: &[&str]) -> Vec<&'a Map<String, Value>> {
    if let Some(arr) = payload.as_array() {
        return arr.iter().filter_map(|v| v.as_object()).collect();
    }

    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };

    for key in wrapper_keys {
        if let Some(arr) = obj.get(*key).and_then(|v| v.as_array()) {
            return arr.iter().filter_map(|v| v.as_object()).collect();
        }
    }

    if DATE_KEYS.iter().any(|k| obj.contains_key(*k)) {
        return vec![obj];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_list_keeps_only_objects() {
        let payload = json!([{"calendarDate": "2025-01-01"}, 42, "x", {"calendarDate": "2025-01-02"}]);
        let records = extract_records(&payload, DAILY_WRAPPER_KEYS);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn wrapper_keys_checked_in_order() {
        let payload = json!({
            "records": [{"calendarDate": "2025-01-03"}],
            "entries": [{"calendarDate": "2025-01-01"}, {"calendarDate": "2025-01-02"}]
        });
        let records = extract_records(&payload, DAILY_WRAPPER_KEYS);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn wrapper_key_with_non_list_value_is_skipped() {
        let payload = json!({"sleepData": "oops", "dailySleep": [{"calendarDate": "2025-01-01"}]});
        let records = extract_records(&payload, SLEEP_WRAPPER_KEYS);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn bare_record_becomes_singleton() {
        let payload = json!({"calendarDate": "2025-01-01", "totalSteps": 100});
        let records = extract_records(&payload, DAILY_WRAPPER_KEYS);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn unknown_shapes_yield_nothing() {
        assert!(extract_records(&json!({"foo": 1}), DAILY_WRAPPER_KEYS).is_empty());
        assert!(extract_records(&json!("nope"), DAILY_WRAPPER_KEYS).is_empty());
        assert!(extract_records(&json!(17), SLEEP_WRAPPER_KEYS).is_empty());
    }
}
