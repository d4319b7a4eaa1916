// SPDX-License-Identifier: MIT OR Apache-2.0
//! sx-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The shared contract for the state explorer.
//!
//! Every other crate in the workspace speaks in these types: an
//! [`Action`] is an HTTP request intent, an [`ExplorationContext`] is the
//! id/token bag accumulated along one exploration branch, a
//! [`State`](graph::State) is an equivalence class of API responses, and a
//! [`StateGraph`](graph::StateGraph) ties them together.

/// Configuration for an exploration run and its validation.
pub mod config;
/// The insertion-tracked key/value bag threaded along exploration branches.
pub mod context;
/// States, transitions, and the state graph.
pub mod graph;
/// Issues discovered during exploration.
pub mod issue;
/// Coverage accounting and the final exploration result.
pub mod report;

pub use config::{ConfigWarning, ExplorationConfig, WarningSeverity};
pub use context::ExplorationContext;
pub use graph::{
    AuthState, EntityState, State, StateGraph, StateId, StateMetadata, Transition,
};
pub use issue::{Issue, IssueSeverity};
pub use report::{CoverageReport, ExplorationResult};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

/// An HTTP verb. Methods are always uppercased on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Safe read.
    Get,
    /// Create / submit.
    Post,
    /// Full replace.
    Put,
    /// Remove.
    Delete,
    /// Partial update.
    Patch,
    /// Headers only.
    Head,
    /// Capability probe.
    Options,
}

impl HttpMethod {
    /// All verbs the explorer recognizes, in spec iteration order.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// The uppercase wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether a request body is meaningful for this verb.
    #[must_use]
    pub fn takes_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a recognized HTTP verb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized HTTP method: {0}")]
pub struct InvalidMethod(pub String);

impl FromStr for HttpMethod {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(InvalidMethod(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ScalarValue
// ---------------------------------------------------------------------------

/// The non-container restriction of a JSON value.
///
/// State properties and context bindings are scalar-valued: objects and
/// arrays never travel through them, which keeps graph nodes cheap to
/// compare and render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ScalarValue {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer.
    Int(i64),
    /// JSON floating-point number.
    Float(f64),
    /// JSON string.
    Str(String),
}

impl ScalarValue {
    /// Convert a JSON value, returning `None` for objects and arrays.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<ScalarValue> {
        match value {
            Value::Null => Some(ScalarValue::Null),
            Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ScalarValue::Int(i))
                } else {
                    n.as_f64().map(ScalarValue::Float)
                }
            }
            Value::String(s) => Some(ScalarValue::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Truthiness in the sense used by coverage bucketing: `null`, `false`,
    /// zero, and the empty string are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            ScalarValue::Null => false,
            ScalarValue::Bool(b) => *b,
            ScalarValue::Int(i) => *i != 0,
            ScalarValue::Float(f) => *f != 0.0,
            ScalarValue::Str(s) => !s.is_empty(),
        }
    }

    /// The string form, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("null"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Int(i) => write!(f, "{i}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Int(i)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Str(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Str(s)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// An intent to issue one HTTP request.
///
/// The `endpoint` may be a template containing `{name}` placeholders; such
/// an action is not executable until every placeholder has been
/// substituted from a context, which produces a *new* action via
/// [`Action::with_endpoint`]. Actions are immutable once emitted.
///
/// Identity (equality and hashing) is `(method, endpoint, params, body)`,
/// so actions deduplicate naturally in sets regardless of description or
/// header differences.
///
/// # Examples
///
/// ```
/// use sx_core::{Action, HttpMethod};
///
/// let a = Action::new(HttpMethod::Get, "/todos/{todoId}");
/// assert!(a.endpoint_has_placeholders());
/// let concrete = a.with_endpoint("/todos/42");
/// assert!(!concrete.endpoint_has_placeholders());
/// assert_ne!(a, concrete);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Action {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Endpoint path, possibly templated (`/todos/{todoId}`).
    pub endpoint: String,
    /// Query parameters. The reserved key [`Action::PATH_PARAMS_KEY`] holds
    /// example values for path placeholders and is never sent on the wire.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    /// Request body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Human-readable description (summary or operation id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the spec declares a security requirement for this operation.
    #[serde(default)]
    pub requires_auth: bool,
    /// Type of the first declared security scheme (`http`, `apiKey`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
}

impl Action {
    /// Reserved params key carrying path-placeholder example values.
    pub const PATH_PARAMS_KEY: &'static str = "_path_params";

    /// Create a minimal action.
    #[must_use]
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Action {
            method,
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
            description: None,
            requires_auth: false,
            auth_type: None,
        }
    }

    /// Attach a request body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Produce the substituted clone of a templated action. Everything but
    /// the endpoint is carried over unchanged.
    #[must_use]
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.endpoint = endpoint.into();
        next
    }

    /// Whether the endpoint still contains `{name}` placeholders.
    #[must_use]
    pub fn endpoint_has_placeholders(&self) -> bool {
        self.endpoint.contains('{')
    }

    /// The `METHOD:endpoint` label used for visited-transition keys.
    #[must_use]
    pub fn transition_label(&self) -> String {
        format!("{}:{}", self.method, self.endpoint)
    }

    /// Query parameters as they should go on the wire: everything except
    /// the reserved path-params entry.
    pub fn wire_params(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params
            .iter()
            .filter(|(k, _)| k.as_str() != Self::PATH_PARAMS_KEY)
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.endpoint == other.endpoint
            && self.params == other.params
            && self.body == other.body
    }
}

// serde_json numbers are never NaN, so the identity comparison is total.
impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.endpoint.hash(state);
        // Containers of Value are not Hash; hash their canonical JSON.
        serde_json::to_string(&self.params)
            .unwrap_or_default()
            .hash(state);
        serde_json::to_string(&self.body)
            .unwrap_or_default()
            .hash(state);
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)
    }
}
