// SPDX-License-Identifier: MIT OR Apache-2.0
//! sx-context
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Context extraction and path-parameter substitution.
//!
//! Responses carry the ids and tokens that later requests need. This
//! crate pulls them out of a response body into an
//! [`ExplorationContext`], and substitutes `{placeholder}` segments in
//! endpoint templates back out of that context, so chains like
//! `POST /todos` → `GET /todos/{todoId}` execute with real values.

mod keys;
mod name;

pub use keys::{infer_context_key_from_endpoint, infer_entity_type, normalize_key, singularize};
pub use name::generate_state_name;

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use sx_core::{ExplorationContext, ScalarValue};
use tracing::debug;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("static regex"));

// Canonical auth-token keys, in the classification used by rule 3 of
// extraction: the left side is the response key, the right the context key.
const TOKEN_KEYS: [(&str, &str); 7] = [
    ("token", "auth_token"),
    ("jwt", "auth_token"),
    ("bearer", "auth_token"),
    ("auth_token", "auth_token"),
    ("access_token", "access_token"),
    ("refresh_token", "refresh_token"),
    ("api_key", "api_key"),
];

// Status keys captured verbatim by rule 4.
const STATUS_KEYS: [&str; 7] = [
    "status", "state", "completed", "active", "verified", "deleted", "pending",
];

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract ids, tokens, and status markers from a response body into the
/// context.
///
/// The body is flattened recursively: nested objects contribute all their
/// leaves, arrays of objects contribute the leaves of their first element
/// only. For each leaf, the rules apply in order:
///
/// 1. a key named `id` binds under a key inferred from the endpoint
///    (`/todos` → `todo_id`); a root-level `id` additionally binds `id`;
/// 2. keys ending in `_id` / `Id` bind under their snake_case form;
/// 3. token keys bind under a canonical auth key (`token`, `jwt` and
///    `bearer` all normalize to `auth_token`);
/// 4. status keys (`status`, `state`, `completed`, `active`, `verified`,
///    `deleted`, `pending`) bind verbatim.
///
/// `null` values never bind.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sx_core::ExplorationContext;
/// use sx_context::extract_context;
///
/// let mut ctx = ExplorationContext::new();
/// extract_context(
///     &json!({"id": 42, "title": "x", "completed": false}),
///     "/todos",
///     &mut ctx,
/// );
/// assert_eq!(ctx.get("todo_id"), Some(&42i64.into()));
/// assert_eq!(ctx.get("id"), Some(&42i64.into()));
/// ```
pub fn extract_context(response: &Value, endpoint: &str, context: &mut ExplorationContext) {
    let Some(root) = response.as_object() else {
        return;
    };

    let mut leaves: Vec<(String, bool, &Value)> = Vec::new();
    flatten_into(root, true, &mut leaves);

    for (leaf_key, at_root, value) in leaves {
        if value.is_null() {
            continue;
        }
        let Some(scalar) = ScalarValue::from_json(value) else {
            continue;
        };

        if leaf_key == "id" {
            if let Some(inferred) = infer_context_key_from_endpoint(endpoint) {
                context.insert(inferred, scalar.clone());
            }
            if at_root {
                context.insert("id", scalar);
            }
            continue;
        }

        if leaf_key.ends_with("_id") || leaf_key.ends_with("Id") {
            context.insert(normalize_key(&leaf_key), scalar);
            continue;
        }

        if let Some((_, canonical)) = TOKEN_KEYS.iter().find(|(k, _)| *k == leaf_key) {
            context.insert(*canonical, scalar);
            continue;
        }

        if STATUS_KEYS.contains(&leaf_key.as_str()) {
            context.insert(leaf_key, scalar);
        }
    }
}

// Collect (leaf key, is-root-level, value) triples. Arrays of objects are
// represented by their first element; other arrays are dropped.
fn flatten_into<'v>(
    object: &'v serde_json::Map<String, Value>,
    at_root: bool,
    out: &mut Vec<(String, bool, &'v Value)>,
) {
    for (key, value) in object {
        match value {
            Value::Object(nested) => flatten_into(nested, false, out),
            Value::Array(items) => {
                if let Some(Value::Object(first)) = items.first() {
                    flatten_into(first, false, out);
                }
            }
            leaf => out.push((key.clone(), at_root, leaf)),
        }
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Replace every `{placeholder}` in `endpoint` with a context value.
///
/// Each placeholder is looked up in order: exact key, snake_case form,
/// snake_case form with `_id` appended, and — for the literal `id` —
/// `<entity_type>_id` inferred from the endpoint, then plain `id`.
/// Returns `None` if any placeholder cannot be resolved; the caller must
/// then skip the action.
///
/// # Examples
///
/// ```
/// use sx_core::ExplorationContext;
/// use sx_context::substitute_path_params;
///
/// let mut ctx = ExplorationContext::new();
/// ctx.insert("todo_id", 42i64.into());
/// ctx.insert("attachment_id", "abc-123".into());
///
/// assert_eq!(
///     substitute_path_params("/todos/{todoId}/attachments/{attachmentId}", &ctx),
///     Some("/todos/42/attachments/abc-123".into())
/// );
/// assert_eq!(substitute_path_params("/users/{userId}", &ctx), None);
/// ```
#[must_use]
pub fn substitute_path_params(endpoint: &str, context: &ExplorationContext) -> Option<String> {
    if !endpoint.contains('{') {
        return Some(endpoint.to_string());
    }

    let mut result = endpoint.to_string();
    for placeholder in placeholders_in(endpoint) {
        let Some(value) = resolve_placeholder(&placeholder, endpoint, context) else {
            debug!(%placeholder, endpoint, "placeholder unresolved, skipping");
            return None;
        };
        result = result.replace(&format!("{{{placeholder}}}"), &value.to_string());
    }
    Some(result)
}

fn resolve_placeholder<'c>(
    placeholder: &str,
    endpoint: &str,
    context: &'c ExplorationContext,
) -> Option<&'c ScalarValue> {
    if let Some(value) = context.get(placeholder) {
        return Some(value);
    }
    let snake = normalize_key(placeholder);
    if let Some(value) = context.get(&snake) {
        return Some(value);
    }
    if !snake.ends_with("_id") {
        if let Some(value) = context.get(&format!("{snake}_id")) {
            return Some(value);
        }
    }
    if placeholder.eq_ignore_ascii_case("id") {
        if let Some(entity) = infer_entity_type(endpoint) {
            if let Some(value) = context.get(&format!("{entity}_id")) {
                return Some(value);
            }
        }
        return context.get("id");
    }
    None
}

/// Placeholder names appearing in an endpoint template, in order.
#[must_use]
pub fn placeholders_in(endpoint: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(endpoint)
        .map(|c| c[1].to_string())
        .collect()
}

/// Whether an endpoint still contains `{...}` placeholders.
#[must_use]
pub fn has_unresolved_placeholders(endpoint: &str) -> bool {
    endpoint.contains('{')
}

/// Whether every placeholder in `endpoint` can be resolved from `context`.
#[must_use]
pub fn can_resolve(endpoint: &str, context: &ExplorationContext) -> bool {
    substitute_path_params(endpoint, context).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, ScalarValue)]) -> ExplorationContext {
        let mut c = ExplorationContext::new();
        for (k, v) in pairs {
            c.insert(*k, v.clone());
        }
        c
    }

    // ── extraction ──────────────────────────────────────────────────

    #[test]
    fn root_id_binds_inferred_and_generic_keys() {
        let mut c = ExplorationContext::new();
        extract_context(&json!({"id": 42}), "/todos", &mut c);
        assert_eq!(c.get("todo_id"), Some(&42i64.into()));
        assert_eq!(c.get("id"), Some(&42i64.into()));
    }

    #[test]
    fn nested_id_binds_inferred_key_but_not_generic() {
        let mut c = ExplorationContext::new();
        extract_context(&json!({"data": {"id": 7}}), "/orders", &mut c);
        assert_eq!(c.get("order_id"), Some(&7i64.into()));
        assert!(!c.contains("id"));
    }

    #[test]
    fn suffixed_ids_normalize_to_snake_case() {
        let mut c = ExplorationContext::new();
        extract_context(
            &json!({"todoId": 1, "owner_id": 2, "parentID": 3}),
            "/todos",
            &mut c,
        );
        assert_eq!(c.get("todo_id"), Some(&1i64.into()));
        assert_eq!(c.get("owner_id"), Some(&2i64.into()));
        // "parentID" ends in "ID", not "Id" or "_id"; rule 2 skips it.
        assert!(!c.contains("parent_id"));
    }

    #[test]
    fn token_keys_canonicalize() {
        let mut c = ExplorationContext::new();
        extract_context(&json!({"token": "t1"}), "/login", &mut c);
        assert_eq!(c.get("auth_token"), Some(&"t1".into()));

        let mut c = ExplorationContext::new();
        extract_context(&json!({"jwt": "t2", "refresh_token": "r1"}), "/login", &mut c);
        assert_eq!(c.get("auth_token"), Some(&"t2".into()));
        assert_eq!(c.get("refresh_token"), Some(&"r1".into()));
    }

    #[test]
    fn null_values_never_bind() {
        let mut c = ExplorationContext::new();
        extract_context(&json!({"id": null, "status": null}), "/todos", &mut c);
        assert!(c.is_empty());
    }

    #[test]
    fn arrays_contribute_first_object_only() {
        let mut c = ExplorationContext::new();
        extract_context(
            &json!({"items": [{"item_id": 1}, {"item_id": 2}]}),
            "/carts",
            &mut c,
        );
        assert_eq!(c.get("item_id"), Some(&1i64.into()));
    }

    #[test]
    fn scalar_arrays_are_ignored() {
        let mut c = ExplorationContext::new();
        extract_context(&json!({"tags": ["a", "b"]}), "/todos", &mut c);
        assert!(c.is_empty());
    }

    #[test]
    fn status_fields_bind_verbatim() {
        let mut c = ExplorationContext::new();
        extract_context(
            &json!({"status": "open", "completed": false, "pending": true}),
            "/orders",
            &mut c,
        );
        assert_eq!(c.get("status"), Some(&"open".into()));
        assert_eq!(c.get("completed"), Some(&false.into()));
        assert_eq!(c.get("pending"), Some(&true.into()));
    }

    // ── substitution ────────────────────────────────────────────────

    #[test]
    fn exact_match_wins() {
        let c = ctx(&[("todoId", 9i64.into()), ("todo_id", 42i64.into())]);
        assert_eq!(
            substitute_path_params("/todos/{todoId}", &c),
            Some("/todos/9".into())
        );
    }

    #[test]
    fn snake_case_fallback() {
        let c = ctx(&[("todo_id", 42i64.into())]);
        assert_eq!(
            substitute_path_params("/todos/{todoId}", &c),
            Some("/todos/42".into())
        );
    }

    #[test]
    fn id_suffix_fallback() {
        let c = ctx(&[("todo_id", 42i64.into())]);
        assert_eq!(
            substitute_path_params("/todos/{todo}", &c),
            Some("/todos/42".into())
        );
    }

    #[test]
    fn literal_id_uses_entity_inference() {
        let c = ctx(&[("todo_id", 42i64.into())]);
        assert_eq!(
            substitute_path_params("/todos/{id}", &c),
            Some("/todos/42".into())
        );

        let c = ctx(&[("id", 3i64.into())]);
        assert_eq!(
            substitute_path_params("/todos/{id}", &c),
            Some("/todos/3".into())
        );
    }

    #[test]
    fn any_unresolved_placeholder_fails_the_whole_endpoint() {
        let c = ctx(&[("todo_id", 42i64.into())]);
        assert_eq!(
            substitute_path_params("/todos/{todoId}/attachments/{attachmentId}", &c),
            None
        );
        assert!(!can_resolve("/todos/{todoId}/attachments/{attachmentId}", &c));
    }

    #[test]
    fn placeholder_free_endpoint_passes_through() {
        let c = ExplorationContext::new();
        assert_eq!(
            substitute_path_params("/health", &c),
            Some("/health".into())
        );
        assert!(!has_unresolved_placeholders("/health"));
    }

    // ── round-trip property ─────────────────────────────────────────

    proptest::proptest! {
        // Any template whose placeholders are covered (under normalization)
        // substitutes completely: no braces remain and every binding's
        // string form appears.
        #[test]
        fn covered_placeholders_always_substitute(
            names in proptest::collection::hash_set("[a-z]{1,8}", 1..4),
            values in proptest::collection::vec(0i64..10_000, 4),
        ) {
            let mut context = ExplorationContext::new();
            let mut template = String::new();
            let count = names.len();
            for (name, value) in names.iter().zip(&values) {
                template.push_str(&format!("/{name}s/{{{name}Id}}"));
                context.insert(format!("{name}_id"), (*value).into());
            }

            let resolved = substitute_path_params(&template, &context)
                .expect("all placeholders covered");
            let open_brace = '{';
            proptest::prop_assert!(!resolved.contains(open_brace));
            for value in values.iter().take(count) {
                proptest::prop_assert!(resolved.contains(&value.to_string()));
            }
        }
    }
}
