//! Metadata contract validation.
//!
//! Applied exactly once per pipeline run, after the last stage. Every key
//! must be in the typed allow-list or carry an approved prefix; anything
//! else (wrong type, oversized value, over-deep nesting) is moved
//! verbatim under the `_invalid` bucket. Nothing is silently dropped, and
//! nothing malformed reaches a consumer expecting the fixed shape.

use serde_json::Value;
use std::collections::BTreeMap;

const MAX_STRING_LEN: usize = 2_000;
const MAX_LIST_LEN: usize = 50;
const MAX_NESTING_DEPTH: usize = 4;

/// Quarantine bucket; reserved, never validated itself.
pub const INVALID_KEY: &str = "_invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Bool,
    Number,
    String,
    List,
    Object,
}

/// Typed allow-list of first-party metadata keys.
const ALLOWED_KEYS: &[(&str, ValueKind)] = &[
    ("pii_found", ValueKind::Bool),
    ("pii_replacements", ValueKind::Object),
    ("pattern_matched", ValueKind::String),
    ("error_node_id", ValueKind::String),
    ("prune_mode", ValueKind::String),
    ("prune_kept_nodes", ValueKind::Number),
    ("prune_dropped_nodes", ValueKind::Number),
    ("bundle_manifest", ValueKind::Object),
    ("budget_steps", ValueKind::List),
    ("estimated_tokens", ValueKind::Number),
    ("budget_degraded", ValueKind::Bool),
    ("pipeline_status", ValueKind::String),
];

/// Key families stages may extend without touching the allow-list.
const ALLOWED_PREFIXES: &[&str] = &["stage_error_"];

/// Validate `metadata` in place per the contract above.
pub fn validate_metadata(metadata: &mut BTreeMap<String, Value>) {
    coerce_pipeline_status(metadata);

    let keys: Vec<String> = metadata
        .keys()
        .filter(|k| k.as_str() != INVALID_KEY)
        .cloned()
        .collect();

    let mut quarantined = serde_json::Map::new();
    for key in keys {
        let value = &metadata[&key];
        if !key_allowed(&key, value) || !within_limits(value, 1) {
            log::debug!("metadata key '{key}' violates the contract; quarantining");
            let value = metadata.remove(&key).expect("key just listed");
            quarantined.insert(key, value);
        }
    }

    if !quarantined.is_empty() {
        let mut bucket = match metadata.remove(INVALID_KEY) {
            Some(Value::Object(existing)) => existing,
            Some(other) => {
                // A caller-shaped bucket still may not lose data.
                let mut map = serde_json::Map::new();
                map.insert("_prior".to_string(), other);
                map
            }
            None => serde_json::Map::new(),
        };
        bucket.extend(quarantined);
        metadata.insert(INVALID_KEY.to_string(), Value::Object(bucket));
    }
}

fn coerce_pipeline_status(metadata: &mut BTreeMap<String, Value>) {
    if let Some(status) = metadata.get_mut("pipeline_status") {
        let valid = matches!(status.as_str(), Some("ok" | "degraded" | "failed"));
        if !valid {
            *status = Value::String("ok".to_string());
        }
    }
}

fn key_allowed(key: &str, value: &Value) -> bool {
    if let Some((_, kind)) = ALLOWED_KEYS.iter().find(|(name, _)| *name == key) {
        return kind_matches(*kind, value);
    }
    ALLOWED_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

fn kind_matches(kind: ValueKind, value: &Value) -> bool {
    match kind {
        ValueKind::Bool => value.is_boolean(),
        ValueKind::Number => value.is_number(),
        ValueKind::String => value.is_string(),
        ValueKind::List => value.is_array(),
        ValueKind::Object => value.is_object(),
    }
}

fn within_limits(value: &Value, depth: usize) -> bool {
    if depth > MAX_NESTING_DEPTH {
        return false;
    }
    match value {
        Value::String(s) => s.len() <= MAX_STRING_LEN,
        Value::Array(items) => {
            items.len() <= MAX_LIST_LEN && items.iter().all(|v| within_limits(v, depth + 1))
        }
        Value::Object(map) => {
            map.len() <= MAX_LIST_LEN && map.values().all(|v| within_limits(v, depth + 1))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn unknown_keys_are_quarantined_not_dropped() {
        let mut metadata = meta(&[
            ("pattern_matched", json!("oom")),
            ("rogue_key", json!("value")),
        ]);
        validate_metadata(&mut metadata);

        assert_eq!(metadata["pattern_matched"], json!("oom"));
        assert!(!metadata.contains_key("rogue_key"));
        assert_eq!(metadata[INVALID_KEY], json!({"rogue_key": "value"}));
    }

    #[test]
    fn wrong_type_for_allowed_key_is_quarantined() {
        let mut metadata = meta(&[("pii_found", json!("yes"))]);
        validate_metadata(&mut metadata);
        assert_eq!(metadata[INVALID_KEY], json!({"pii_found": "yes"}));
    }

    #[test]
    fn stage_error_prefix_family_passes() {
        let mut metadata = meta(&[(
            "stage_error_build.context",
            json!({"kind": "failed", "message": "boom"}),
        )]);
        validate_metadata(&mut metadata);
        assert!(metadata.contains_key("stage_error_build.context"));
        assert!(!metadata.contains_key(INVALID_KEY));
    }

    #[test]
    fn oversized_values_are_quarantined() {
        let mut metadata = meta(&[
            ("pattern_matched", Value::String("x".repeat(MAX_STRING_LEN + 1))),
            ("budget_steps", json!(vec![0; MAX_LIST_LEN + 1])),
        ]);
        validate_metadata(&mut metadata);
        let invalid = metadata[INVALID_KEY].as_object().unwrap();
        assert_eq!(invalid.len(), 2);
    }

    #[test]
    fn over_deep_nesting_is_quarantined() {
        let mut metadata = meta(&[(
            "bundle_manifest",
            json!({"a": {"b": {"c": {"d": {"e": 1}}}}}),
        )]);
        validate_metadata(&mut metadata);
        assert!(metadata[INVALID_KEY].as_object().unwrap().contains_key("bundle_manifest"));
    }

    #[test]
    fn bogus_pipeline_status_defaults_to_ok() {
        let mut metadata = meta(&[("pipeline_status", json!("exploded"))]);
        validate_metadata(&mut metadata);
        assert_eq!(metadata["pipeline_status"], json!("ok"));

        let mut metadata = meta(&[("pipeline_status", json!("degraded"))]);
        validate_metadata(&mut metadata);
        assert_eq!(metadata["pipeline_status"], json!("degraded"));
    }

    #[test]
    fn quarantine_merges_into_existing_bucket() {
        let mut metadata = meta(&[
            (INVALID_KEY, json!({"earlier": 1})),
            ("later_rogue", json!(2)),
        ]);
        validate_metadata(&mut metadata);
        assert_eq!(metadata[INVALID_KEY], json!({"earlier": 1, "later_rogue": 2}));
    }
}
