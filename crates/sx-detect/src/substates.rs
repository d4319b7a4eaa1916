// SPDX-License-Identifier: MIT OR Apache-2.0
//! Auth and entity sub-state classification.

use crate::{AUTH_TOKEN_FIELDS, ENTITY_ID_FIELDS, STATUS_FIELDS, USER_FIELDS};
use serde_json::Value;
use sx_context::infer_entity_type;
use sx_core::{AuthState, EntityState, ScalarValue};

/// Classify the authentication facts visible in a response.
///
/// Token and user fields are looked up at the top level and one level
/// down under `data`; roles and permissions come from the top level or a
/// nested `user` object.
#[must_use]
pub fn detect_auth_state(response: &Value) -> AuthState {
    let mut auth = AuthState::default();

    for field in AUTH_TOKEN_FIELDS {
        if response.get(field).is_some() {
            auth.has_token = true;
            auth.token_type = Some(classify_token(field));
            break;
        }
        if nested(response, "data", field).is_some() {
            auth.has_token = true;
            auth.token_type = Some("token".to_string());
            break;
        }
    }

    for field in USER_FIELDS {
        for value in [response.get(field), nested(response, "data", field)]
            .into_iter()
            .flatten()
        {
            match value {
                Value::Object(info) => {
                    for (k, v) in info {
                        auth.user_info.insert(k.clone(), v.clone());
                    }
                }
                other => {
                    auth.user_info.insert(field.to_string(), other.clone());
                }
            }
        }
    }

    auth.is_authenticated = auth.has_token || !auth.user_info.is_empty();

    auth.roles = string_list(response.get("roles"));
    auth.permissions = string_list(response.get("permissions"));
    if let Some(user) = response.get("user").and_then(Value::as_object) {
        if let Some(roles) = user.get("roles") {
            auth.roles = string_list(Some(roles));
        }
        if let Some(permissions) = user.get("permissions") {
            auth.permissions = string_list(Some(permissions));
        }
    }

    auth
}

fn classify_token(field: &str) -> String {
    let lower = field.to_ascii_lowercase();
    if lower.contains("access") {
        "access_token".to_string()
    } else if lower.contains("refresh") {
        "refresh_token".to_string()
    } else if lower.contains("jwt") || lower.contains("bearer") {
        "jwt".to_string()
    } else {
        "token".to_string()
    }
}

/// Classify the entity facts visible in a response: type from the
/// endpoint, id and status from the canonical field lists, everything
/// else scalar as properties.
#[must_use]
pub fn detect_entity_state(response: &Value, endpoint: Option<&str>) -> EntityState {
    let mut entity = EntityState::default();

    if let Some(endpoint) = endpoint {
        entity.entity_type = infer_entity_type(endpoint);
    }

    for field in ENTITY_ID_FIELDS {
        if let Some(value) = response.get(field).or_else(|| nested(response, "data", field)) {
            entity.entity_id = Some(display(value));
            break;
        }
    }

    for field in STATUS_FIELDS {
        if let Some(value) = response.get(field).or_else(|| nested(response, "data", field)) {
            entity.status = Some(display(value));
            break;
        }
    }

    if let Some(object) = response.as_object() {
        for (key, value) in object {
            if key.starts_with('_') || is_classified(key) {
                continue;
            }
            if let Some(scalar) = ScalarValue::from_json(value) {
                entity.properties.insert(key.clone(), scalar);
            } else if let Value::Array(items) = value {
                if !items.is_empty() {
                    entity
                        .properties
                        .insert(format!("{key}_count"), ScalarValue::Int(items.len() as i64));
                }
            }
        }
    }

    entity
}

fn is_classified(key: &str) -> bool {
    AUTH_TOKEN_FIELDS.contains(&key)
        || USER_FIELDS.contains(&key)
        || ENTITY_ID_FIELDS.contains(&key)
        || STATUS_FIELDS.contains(&key)
}

fn nested<'v>(response: &'v Value, parent: &str, field: &str) -> Option<&'v Value> {
    response
        .get(parent)
        .filter(|v| v.is_object())
        .and_then(|v| v.get(field))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
