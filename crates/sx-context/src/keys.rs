// SPDX-License-Identifier: MIT OR Apache-2.0
//! Key normalization and endpoint-based key inference.

use regex::Regex;
use std::sync::LazyLock;

static UPPER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("static regex"));
static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z\d])([A-Z])").expect("static regex"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static regex"));
static VERSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v[1-9]\d*$").expect("static regex"));
static NUMERIC_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("static regex"));
static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("static regex")
});

/// Normalize a key to `snake_case`.
///
/// Runs of uppercase letters followed by lowercase split as
/// `uppercase_lowercase` (`APIKey` → `api_key`), remaining camel
/// boundaries become underscores, everything lowercases, repeated
/// underscores collapse, and leading/trailing underscores are stripped.
///
/// # Examples
///
/// ```
/// use sx_context::normalize_key;
///
/// assert_eq!(normalize_key("todoId"), "todo_id");
/// assert_eq!(normalize_key("APIKey"), "api_key");
/// assert_eq!(normalize_key("ID"), "id");
/// assert_eq!(normalize_key("__user__id__"), "user_id");
/// ```
#[must_use]
pub fn normalize_key(key: &str) -> String {
    if key.chars().all(|c| !c.is_ascii_lowercase()) && key.chars().any(|c| c.is_ascii_uppercase())
    {
        return key.to_ascii_lowercase();
    }
    let split = UPPER_RUN.replace_all(key, "${1}_${2}");
    let split = CAMEL_BOUNDARY.replace_all(&split, "${1}_${2}");
    let lowered = split.to_ascii_lowercase();
    let collapsed = UNDERSCORE_RUN.replace_all(&lowered, "_");
    collapsed.trim_matches('_').to_string()
}

/// Singularize a resource name with the fixed heuristic:
/// `ies` → `y`, a trailing `ses` drops its `es`, any other trailing `s`
/// drops (but a double `ss` stays).
#[must_use]
pub fn singularize(resource: &str) -> String {
    if let Some(stem) = resource.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if resource.ends_with("ses") {
        return resource[..resource.len() - 2].to_string();
    }
    if resource.ends_with('s') && !resource.ends_with("ss") {
        return resource[..resource.len() - 1].to_string();
    }
    resource.to_string()
}

/// Infer the context key a root-level `id` should bind under, from the
/// endpoint that produced the response.
///
/// Strips the query string, `/api`, version segments, and `{placeholder}`
/// segments, takes the last remaining segment, singularizes it, and
/// suffixes `_id`.
///
/// # Examples
///
/// ```
/// use sx_context::infer_context_key_from_endpoint;
///
/// assert_eq!(
///     infer_context_key_from_endpoint("/todos"),
///     Some("todo_id".into())
/// );
/// assert_eq!(
///     infer_context_key_from_endpoint("/api/v1/categories"),
///     Some("category_id".into())
/// );
/// assert_eq!(infer_context_key_from_endpoint("/"), None);
/// ```
#[must_use]
pub fn infer_context_key_from_endpoint(endpoint: &str) -> Option<String> {
    let path = endpoint.split('?').next().unwrap_or(endpoint);
    let resource = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .filter(|s| {
            let lower = s.to_ascii_lowercase();
            lower != "api" && !VERSION_SEGMENT.is_match(&lower)
        })
        .next_back()?;

    let resource = singularize(&normalize_key(resource));
    if resource.is_empty() {
        return None;
    }
    if resource.ends_with("_id") {
        Some(resource)
    } else {
        Some(format!("{resource}_id"))
    }
}

/// Infer the entity type an endpoint operates on: the last path segment
/// that is not a common prefix (`api`, `rest`, `graphql`, `v<digits>`),
/// not a numeric or UUID id, and not a `{placeholder}`, singularized.
///
/// # Examples
///
/// ```
/// use sx_context::infer_entity_type;
///
/// assert_eq!(infer_entity_type("/todos/42/attachments"), Some("attachment".into()));
/// assert_eq!(infer_entity_type("/api/v1/users/123"), Some("user".into()));
/// assert_eq!(infer_entity_type("/api"), None);
/// ```
#[must_use]
pub fn infer_entity_type(endpoint: &str) -> Option<String> {
    let mut entity: Option<&str> = None;
    for segment in endpoint.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        let lower = segment.to_ascii_lowercase();
        if matches!(lower.as_str(), "api" | "rest" | "graphql") || VERSION_SEGMENT.is_match(&lower)
        {
            continue;
        }
        if NUMERIC_SEGMENT.is_match(segment) || UUID_SEGMENT.is_match(&lower) {
            continue;
        }
        if segment.starts_with('{') && segment.ends_with('}') {
            continue;
        }
        entity = Some(segment);
    }
    entity.map(|e| singularize(e))
}
