// SPDX-License-Identifier: MIT OR Apache-2.0
//! States, transitions, and the directed state graph.

use crate::{Action, ScalarValue};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

/// Identifier of a state: the 16-hex-char response fingerprint, or a
/// synthesized id for fallback and seed states.
pub type StateId = String;

// ---------------------------------------------------------------------------
// Sub-states
// ---------------------------------------------------------------------------

/// Authentication facts detected in a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuthState {
    /// Whether the response implies an authenticated caller.
    pub is_authenticated: bool,
    /// Whether a token field was present.
    pub has_token: bool,
    /// Classified token kind (`access_token`, `refresh_token`, `jwt`, `token`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// User/identity fields gathered from the response.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_info: BTreeMap<String, Value>,
    /// Declared roles, when present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Declared permissions, when present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

/// Entity facts detected in a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityState {
    /// Entity type inferred from the endpoint (`todo`, `user`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// The entity's identifier, stringified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// The entity's status field, stringified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining scalar properties of the entity.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ScalarValue>,
}

impl EntityState {
    /// Whether anything was detected at all.
    #[must_use]
    pub fn is_detected(&self) -> bool {
        self.entity_type.is_some() || self.entity_id.is_some()
    }
}

/// Typed metadata attached to a state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StateMetadata {
    /// Endpoint whose response produced this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Method of the producing request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Detected authentication sub-state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_state: Option<AuthState>,
    /// Detected entity sub-state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_state: Option<EntityState>,
    /// Top-level keys of the producing response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_keys: Vec<String>,
    /// Context snapshot of the branch that first reached this state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, ScalarValue>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A node in the graph: one equivalence class of API responses.
///
/// Two states are equal iff their ids are equal; everything else is
/// descriptive.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct State {
    /// Stable fingerprint identifier.
    pub id: StateId,
    /// Human-readable name.
    pub name: String,
    /// Scalar properties used for graph-building and visualization.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ScalarValue>,
    /// Actions reachable from this state, in discovery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_actions: Vec<Action>,
    /// Typed metadata.
    #[serde(default, skip_serializing_if = "StateMetadata::is_default")]
    pub metadata: StateMetadata,
    /// When this state was first discovered.
    pub discovered_at: DateTime<Utc>,
}

impl StateMetadata {
    fn is_default(&self) -> bool {
        self == &StateMetadata::default()
    }
}

impl State {
    /// Create a state with empty properties and actions.
    #[must_use]
    pub fn new(id: impl Into<StateId>, name: impl Into<String>) -> Self {
        State {
            id: id.into(),
            name: name.into(),
            properties: BTreeMap::new(),
            available_actions: Vec::new(),
            metadata: StateMetadata::default(),
            discovered_at: Utc::now(),
        }
    }

    /// Minimal placeholder for a transition endpoint that was never
    /// explicitly added.
    #[must_use]
    pub fn placeholder(id: impl Into<StateId>) -> Self {
        let id = id.into();
        let name = format!("State_{id}");
        State::new(id, name)
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A directed edge: one action executed from one state, and where it led.
///
/// Identity is `(from_state, action, to_state)`; the response payload,
/// timing, and outcome are descriptive.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    /// Source state id.
    pub from_state: StateId,
    /// The action that was executed.
    pub action: Action,
    /// Destination state id.
    pub to_state: StateId,
    /// Raw JSON response body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// HTTP status code, absent when the executor failed outright.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Wall-clock duration of the request in milliseconds.
    pub duration_ms: f64,
    /// False for 4xx/5xx, timeouts, and executor failures.
    pub success: bool,
    /// Error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When this transition was recorded.
    pub discovered_at: DateTime<Utc>,
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.from_state == other.from_state
            && self.action == other.action
            && self.to_state == other.to_state
    }
}

impl Eq for Transition {}

impl Hash for Transition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.from_state.hash(state);
        self.action.hash(state);
        self.to_state.hash(state);
    }
}

// ---------------------------------------------------------------------------
// StateGraph
// ---------------------------------------------------------------------------

/// The discovered state space: states keyed by id plus an ordered
/// transition list.
///
/// Invariants:
///
/// - every transition's endpoints are keys of `states` (placeholder
///   entries are auto-created on [`add_transition`](StateGraph::add_transition));
/// - duplicate transitions (same source, action, destination) are
///   suppressed;
/// - the first state ever added becomes the initial state and is never
///   reassigned by later adds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StateGraph {
    /// All known states, keyed by id.
    pub states: BTreeMap<StateId, State>,
    /// Transitions in completion order.
    pub transitions: Vec<Transition>,
    /// Id of the first state added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<StateId>,
}

impl StateGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a state. The first state added becomes the
    /// initial state.
    pub fn add_state(&mut self, state: State) {
        if self.initial_state.is_none() {
            self.initial_state = Some(state.id.clone());
        }
        self.states.insert(state.id.clone(), state);
    }

    /// Add a transition, creating placeholder states for unknown
    /// endpoints and suppressing exact duplicates.
    pub fn add_transition(&mut self, transition: Transition) {
        if !self.states.contains_key(&transition.from_state) {
            self.add_state(State::placeholder(transition.from_state.clone()));
        }
        if !self.states.contains_key(&transition.to_state) {
            self.add_state(State::placeholder(transition.to_state.clone()));
        }
        if !self.transitions.contains(&transition) {
            self.transitions.push(transition);
        }
    }

    /// Look up a state.
    #[must_use]
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    /// Distinct destination states reachable in one step from `id`.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<StateId> {
        let mut seen: Vec<StateId> = Vec::new();
        for t in &self.transitions {
            if t.from_state == id && !seen.contains(&t.to_state) {
                seen.push(t.to_state.clone());
            }
        }
        seen
    }

    /// All transitions leaving `id`.
    pub fn transitions_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.from_state == id)
    }

    /// All transitions arriving at `id`.
    pub fn transitions_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.to_state == id)
    }

    /// Every unique action labelling a transition.
    #[must_use]
    pub fn all_actions(&self) -> HashSet<Action> {
        self.transitions.iter().map(|t| t.action.clone()).collect()
    }

    /// Whether `to` is reachable from `from` along recorded transitions.
    #[must_use]
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for t in &self.transitions {
                if t.from_state == current {
                    queue.push_back(&t.to_state);
                }
            }
        }
        false
    }

    /// Number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of recorded transitions.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}
