// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response fingerprinting for state identity.

use crate::{AUTH_TOKEN_FIELDS, ENTITY_ID_FIELDS};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// Bounds on the structure signature.
const MAX_SIGNATURE_DEPTH: usize = 3;
const MAX_SIGNATURE_KEYS: usize = 10;

/// Compute the 16-hex-char fingerprint of a response.
///
/// The fingerprint hashes an ordered map of: every configured state-key
/// field's value (top level first, then one level down under `data`),
/// the first entity-id field found, an `_has_auth` marker, and a bounded
/// structural signature of the whole body. Responses that agree on all
/// of these are the same state.
#[must_use]
pub fn fingerprint(response: &Value, state_key_fields: &[String]) -> String {
    fingerprint_at(response, None, state_key_fields)
}

/// Fingerprint with the producing endpoint folded into the identity, so
/// the same payload seen from two different endpoints is two states.
/// State detection uses this; the bare [`fingerprint`] stays
/// endpoint-free for payload-identity comparisons.
#[must_use]
pub fn fingerprint_at(
    response: &Value,
    endpoint: Option<&str>,
    state_key_fields: &[String],
) -> String {
    let mut data: BTreeMap<String, Value> = BTreeMap::new();

    if let Some(endpoint) = endpoint {
        data.insert("_endpoint".to_string(), Value::String(endpoint.to_string()));
    }

    for field in state_key_fields {
        if let Some(value) = field_or_nested(response, field) {
            data.insert(field.clone(), value.clone());
        }
    }

    for field in ENTITY_ID_FIELDS {
        if let Some(value) = response.get(field) {
            data.insert(format!("_id_{field}"), value.clone());
            break;
        }
    }

    let has_auth = AUTH_TOKEN_FIELDS
        .iter()
        .any(|field| response.get(field).is_some());
    data.insert("_has_auth".to_string(), Value::Bool(has_auth));

    data.insert(
        "_structure".to_string(),
        Value::String(structure_signature(response, 0)),
    );

    // BTreeMap serializes in key order, so the rendering is canonical.
    let canonical = serde_json::to_string(&data).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

fn field_or_nested<'v>(response: &'v Value, field: &str) -> Option<&'v Value> {
    if let Some(value) = response.get(field) {
        return Some(value);
    }
    response
        .get("data")
        .filter(|data| data.is_object())
        .and_then(|data| data.get(field))
}

/// A bounded recursive rendering of a response's shape: objects become
/// `{k1,k2,...}` with keys sorted and truncated, arrays show their first
/// element's shape, scalars their type name.
#[must_use]
pub fn structure_signature(value: &Value, depth: usize) -> String {
    if depth > MAX_SIGNATURE_DEPTH {
        return "...".to_string();
    }
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys.truncate(MAX_SIGNATURE_KEYS);
            format!("{{{}}}", keys.join(","))
        }
        Value::Array(items) => match items.first() {
            Some(first) => format!("[{}]", structure_signature(first, depth + 1)),
            None => "[]".to_string(),
        },
        Value::String(_) => "str".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int".to_string()
            } else {
                "float".to_string()
            }
        }
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys() -> Vec<String> {
        vec!["status".into(), "state".into(), "phase".into()]
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let fp = fingerprint(&json!({"id": 1}), &keys());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn endpoint_distinguishes_identical_payloads() {
        let body = json!({"id": 42, "title": "x"});
        let created = fingerprint_at(&body, Some("/todos"), &keys());
        let fetched = fingerprint_at(&body, Some("/todos/{todoId}"), &keys());
        assert_ne!(created, fetched);
        assert_eq!(created, fingerprint_at(&body, Some("/todos"), &keys()));
    }

    #[test]
    fn same_response_same_fingerprint() {
        let body = json!({"id": 42, "status": "open", "items": [1, 2]});
        assert_eq!(fingerprint(&body, &keys()), fingerprint(&body, &keys()));
    }

    #[test]
    fn state_key_changes_change_the_fingerprint() {
        let open = json!({"id": 42, "status": "open"});
        let closed = json!({"id": 42, "status": "closed"});
        assert_ne!(fingerprint(&open, &keys()), fingerprint(&closed, &keys()));
    }

    #[test]
    fn entity_id_distinguishes_resources() {
        let a = json!({"id": 1, "title": "x"});
        let b = json!({"id": 2, "title": "x"});
        assert_ne!(fingerprint(&a, &keys()), fingerprint(&b, &keys()));
    }

    #[test]
    fn auth_presence_changes_identity_but_token_value_does_not() {
        let anon = json!({"user": "x"});
        let with_token_1 = json!({"user": "x", "token": "aaa"});
        let with_token_2 = json!({"user": "x", "token": "bbb"});
        assert_ne!(fingerprint(&anon, &keys()), fingerprint(&with_token_1, &keys()));
        assert_eq!(
            fingerprint(&with_token_1, &keys()),
            fingerprint(&with_token_2, &keys())
        );
    }

    #[test]
    fn nested_data_feeds_state_keys() {
        let direct = json!({"status": "open"});
        let nested = json!({"data": {"status": "open"}});
        // Different structure, but both pick up the status key.
        let fp_direct = fingerprint(&direct, &keys());
        let fp_nested = fingerprint(&nested, &keys());
        assert_ne!(fp_direct, fp_nested);
    }

    #[test]
    fn structure_signature_is_bounded() {
        let deep = json!({"a": {"b": {"c": {"d": {"e": 1}}}}});
        let sig = structure_signature(&deep, 0);
        assert_eq!(sig, "{a}");

        let nested_array = json!([[[[[1]]]]]);
        assert_eq!(structure_signature(&nested_array, 0), "[[[[...]]]]");
    }

    #[test]
    fn structure_signature_sorts_and_truncates_keys() {
        let value = json!({"b": 1, "a": 2});
        assert_eq!(structure_signature(&value, 0), "{a,b}");

        let wide: serde_json::Map<String, serde_json::Value> =
            (0..15).map(|i| (format!("k{i:02}"), json!(1))).collect();
        let sig = structure_signature(&Value::Object(wide), 0);
        assert_eq!(sig.matches(',').count(), MAX_SIGNATURE_KEYS - 1);
    }

    #[test]
    fn scalar_signatures() {
        assert_eq!(structure_signature(&json!("x"), 0), "str");
        assert_eq!(structure_signature(&json!(1), 0), "int");
        assert_eq!(structure_signature(&json!(1.5), 0), "float");
        assert_eq!(structure_signature(&json!(true), 0), "bool");
        assert_eq!(structure_signature(&Value::Null, 0), "null");
        assert_eq!(structure_signature(&json!([]), 0), "[]");
    }
}
