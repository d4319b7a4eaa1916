// SPDX-License-Identifier: MIT OR Apache-2.0
//! sx-detect
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! State inference from API responses.
//!
//! A [`StateDetector`] reduces a heterogeneous JSON response to a stable
//! fingerprint plus the set of further actions it advertises, and
//! classifies authentication and entity sub-states along the way. A given
//! fingerprint always maps to the same cached [`State`] within one run.

mod fingerprint;
mod links;
mod substates;

pub use fingerprint::{fingerprint, fingerprint_at, structure_signature};
pub use links::extract_link_actions;
pub use substates::{detect_auth_state, detect_entity_state};

use serde_json::Value;
use sx_core::{Action, State, StateId, StateMetadata};
use tracing::debug;

/// Token field spellings that indicate authentication material.
pub const AUTH_TOKEN_FIELDS: [&str; 15] = [
    "token",
    "access_token",
    "accessToken",
    "auth_token",
    "authToken",
    "jwt",
    "bearer",
    "id_token",
    "idToken",
    "refresh_token",
    "refreshToken",
    "session_token",
    "sessionToken",
    "api_key",
    "apiKey",
];

/// User/identity field spellings.
pub const USER_FIELDS: [&str; 13] = [
    "user",
    "user_id",
    "userId",
    "username",
    "email",
    "name",
    "displayName",
    "display_name",
    "account",
    "profile",
    "identity",
    "sub",
    "uid",
];

/// Entity identifier field spellings, in lookup priority order.
pub const ENTITY_ID_FIELDS: [&str; 7] = ["id", "_id", "uuid", "guid", "pk", "key", "slug"];

/// Status/state field spellings, in lookup priority order.
pub const STATUS_FIELDS: [&str; 6] = ["status", "state", "phase", "stage", "condition", "lifecycle"];

// Fields that never make it into state properties.
const TRANSIENT_FIELDS: [&str; 8] = [
    "timestamp",
    "created_at",
    "updated_at",
    "request_id",
    "_links",
    "links",
    "meta",
    "_meta",
];

/// Infers application state from API responses, caching by fingerprint.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sx_detect::StateDetector;
///
/// let mut detector = StateDetector::new();
/// let body = json!({"id": 42, "status": "open"});
/// let first = detector.detect_state(&body, Some("/todos/42"), Some("GET"));
/// let second = detector.detect_state(&body, Some("/todos/42"), Some("GET"));
/// assert_eq!(first.id, second.id);
/// assert_eq!(first.name, "Open");
/// ```
pub struct StateDetector {
    known_states: std::collections::HashMap<StateId, State>,
    state_key_fields: Vec<String>,
    action_extractors: Vec<Box<dyn Fn(&Value) -> Vec<Action> + Send + Sync>>,
}

impl Default for StateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDetector")
            .field("known_states", &self.known_states.len())
            .field("state_key_fields", &self.state_key_fields)
            .field("action_extractors", &self.action_extractors.len())
            .finish()
    }
}

impl StateDetector {
    /// A detector with the default state-key fields
    /// (`status`, `state`, `phase`).
    #[must_use]
    pub fn new() -> Self {
        StateDetector {
            known_states: std::collections::HashMap::new(),
            state_key_fields: vec!["status".into(), "state".into(), "phase".into()],
            action_extractors: Vec::new(),
        }
    }

    /// Add a field whose value participates in state identity.
    pub fn add_state_key_field(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.state_key_fields.contains(&field) {
            self.state_key_fields.push(field);
        }
    }

    /// Replace the state-key field list.
    pub fn set_state_key_fields(&mut self, fields: Vec<String>) {
        self.state_key_fields = fields;
    }

    /// Register a custom action extractor, consulted before the built-in
    /// HATEOAS extraction.
    pub fn add_action_extractor(
        &mut self,
        extractor: impl Fn(&Value) -> Vec<Action> + Send + Sync + 'static,
    ) {
        self.action_extractors.push(Box::new(extractor));
    }

    /// Detect the state a response represents.
    ///
    /// The response is fingerprinted first; a known fingerprint returns
    /// the cached state unchanged, so repeated detections of the same
    /// response observe one `State` per identity.
    pub fn detect_state(
        &mut self,
        response: &Value,
        endpoint: Option<&str>,
        method: Option<&str>,
    ) -> State {
        let id = fingerprint_at(response, endpoint, &self.state_key_fields);
        if let Some(known) = self.known_states.get(&id) {
            debug!(state = %id, "fingerprint cache hit");
            return known.clone();
        }

        let mut state = State::new(id.clone(), self.infer_state_name(response, endpoint));
        state.properties = extract_state_properties(response);
        state.available_actions = self.detect_available_actions(response);

        let mut metadata = StateMetadata {
            endpoint: endpoint.map(String::from),
            method: method.map(String::from),
            ..StateMetadata::default()
        };
        if let Some(object) = response.as_object() {
            metadata.response_keys = object.keys().cloned().collect();
        }
        let auth = detect_auth_state(response);
        if auth.is_authenticated {
            metadata.auth_state = Some(auth);
        }
        let entity = detect_entity_state(response, endpoint);
        if entity.is_detected() {
            metadata.entity_state = Some(entity);
        }
        state.metadata = metadata;

        self.known_states.insert(id, state.clone());
        state
    }

    /// Actions advertised by a response: custom extractors first, then
    /// HATEOAS links, deduplicated by `(method, endpoint)`.
    #[must_use]
    pub fn detect_available_actions(&self, response: &Value) -> Vec<Action> {
        let mut actions: Vec<Action> = Vec::new();
        for extractor in &self.action_extractors {
            actions.extend(extractor(response));
        }
        actions.extend(extract_link_actions(response));

        let mut seen = std::collections::HashSet::new();
        actions
            .into_iter()
            .filter(|a| seen.insert((a.method, a.endpoint.clone())))
            .collect()
    }

    /// The 16-hex-char fingerprint of a response under the configured
    /// state-key fields.
    #[must_use]
    pub fn fingerprint(&self, response: &Value) -> String {
        fingerprint(response, &self.state_key_fields)
    }

    /// Whether two states are the same: equal ids, or agreement on every
    /// state-key property.
    #[must_use]
    pub fn is_same_state(&self, a: &State, b: &State) -> bool {
        if a.id == b.id {
            return true;
        }
        if self.state_key_fields.is_empty() {
            return false;
        }
        self.state_key_fields
            .iter()
            .all(|field| a.properties.get(field) == b.properties.get(field))
    }

    /// Look up a previously detected state.
    #[must_use]
    pub fn known_state(&self, id: &str) -> Option<&State> {
        self.known_states.get(id)
    }

    /// All states detected so far.
    pub fn known_states(&self) -> impl Iterator<Item = &State> {
        self.known_states.values()
    }

    /// Drop every cached state.
    pub fn clear_cache(&mut self) {
        self.known_states.clear();
    }

    // First match wins: a status-ish field, the endpoint, a `type` field,
    // then the unknown-state fallback.
    fn infer_state_name(&self, response: &Value, endpoint: Option<&str>) -> String {
        for field in ["status", "state", "phase", "stage"] {
            if let Some(value) = response.get(field).and_then(Value::as_str) {
                return title_case(&value.replace('_', " "));
            }
        }

        if let Some(endpoint) = endpoint {
            let cleaned: String = endpoint
                .trim_matches('/')
                .replace('/', "_")
                .chars()
                .filter(|c| *c != '{' && *c != '}')
                .collect();
            return if cleaned.is_empty() {
                "State_Root".to_string()
            } else {
                format!("State_{cleaned}")
            };
        }

        if let Some(kind) = response.get("type").and_then(Value::as_str) {
            return format!("State_{kind}");
        }

        "Unknown_State".to_string()
    }
}

// Scalar state properties, with transient fields dropped and non-empty
// arrays reduced to their length.
fn extract_state_properties(
    response: &Value,
) -> std::collections::BTreeMap<String, sx_core::ScalarValue> {
    let mut properties = std::collections::BTreeMap::new();
    let Some(object) = response.as_object() else {
        return properties;
    };
    for (key, value) in object {
        if TRANSIENT_FIELDS.contains(&key.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let Some(scalar) = sx_core::ScalarValue::from_json(value) {
            properties.insert(key.clone(), scalar);
        } else if let Value::Array(items) = value {
            if !items.is_empty() {
                properties.insert(
                    format!("{key}_count"),
                    sx_core::ScalarValue::Int(items.len() as i64),
                );
            }
        }
    }
    properties
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
