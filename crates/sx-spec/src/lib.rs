// SPDX-License-Identifier: MIT OR Apache-2.0
//! sx-spec
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! OpenAPI 3.x / Swagger 2.0 parsing into seed exploration actions.
//!
//! One [`Action`] is constructed per `(path, method)` pair: parameters are
//! merged and bucketed, request-body examples are synthesized from
//! schemas, and security requirements are inferred. Everything below the
//! top-level version check degrades gracefully — an unresolvable `$ref`
//! becomes an empty schema, a malformed path item is skipped.

mod example;

use example::SchemaResolver;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use sx_core::{Action, ExplorationConfig, HttpMethod};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by spec parsing. Everything else degrades gracefully.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The spec file could not be read.
    #[error("could not read spec file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The input was neither valid JSON nor valid YAML.
    #[error("could not parse spec: not valid JSON or YAML")]
    Unparseable,
    /// The top level is missing or malformed.
    #[error("invalid OpenAPI spec: {0}")]
    InvalidSpec(String),
    /// An include/exclude pattern failed to compile.
    #[error("invalid filter pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compile error.
        source: regex::Error,
    },
}

/// A spec document in any of the accepted input forms.
#[derive(Debug, Clone)]
pub enum SpecInput {
    /// Already-parsed JSON document.
    Document(Value),
    /// Raw JSON or YAML text.
    Text(String),
    /// Path to a `.json`/`.yaml`/`.yml` file.
    File(PathBuf),
}

impl From<Value> for SpecInput {
    fn from(value: Value) -> Self {
        SpecInput::Document(value)
    }
}

impl From<&str> for SpecInput {
    fn from(text: &str) -> Self {
        SpecInput::Text(text.to_string())
    }
}

impl From<String> for SpecInput {
    fn from(text: String) -> Self {
        SpecInput::Text(text)
    }
}

impl From<&Path> for SpecInput {
    fn from(path: &Path) -> Self {
        SpecInput::File(path.to_path_buf())
    }
}

impl From<PathBuf> for SpecInput {
    fn from(path: PathBuf) -> Self {
        SpecInput::File(path)
    }
}

/// Parse a spec document into seed actions using the configuration's
/// include/exclude patterns.
///
/// This is the sole public entry for one-shot use; [`SpecParser`] exposes
/// the same behaviour with a reusable filter compilation.
pub fn parse_spec(
    input: impl Into<SpecInput>,
    config: &ExplorationConfig,
) -> Result<Vec<Action>, SpecError> {
    SpecParser::new(config)?.parse(input)
}

// Content types tried for request-body examples, best first.
const CONTENT_TYPE_PRIORITY: [&str; 4] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
];

const FORM_CONTENT_TYPES: [&str; 2] = [
    "application/x-www-form-urlencoded",
    "multipart/form-data",
];

/// Turns OpenAPI/Swagger documents into [`Action`]s.
///
/// The parser owns the compiled endpoint filters and, during one parse,
/// the `$ref` resolution scratchpad. It never mutates an action after
/// emitting it.
#[derive(Debug)]
pub struct SpecParser {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    base_url: Option<String>,
    resolver: SchemaResolver,
    security_schemes: Value,
}

impl SpecParser {
    /// Compile the configuration's endpoint filters.
    pub fn new(config: &ExplorationConfig) -> Result<Self, SpecError> {
        Ok(SpecParser {
            include: compile_patterns(&config.include_patterns)?,
            exclude: compile_patterns(&config.exclude_patterns)?,
            base_url: None,
            resolver: SchemaResolver::default(),
            security_schemes: json!({}),
        })
    }

    /// Strip this base URL from endpoints during normalization.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Parse a spec document into one action per kept `(path, method)`.
    ///
    /// Fails only when the document cannot be loaded or lacks an
    /// `openapi`/`swagger` version field.
    pub fn parse(&mut self, input: impl Into<SpecInput>) -> Result<Vec<Action>, SpecError> {
        let document = load_document(input.into())?;
        let Some(spec) = document.as_object() else {
            return Err(SpecError::InvalidSpec("document is not an object".into()));
        };

        let version = spec
            .get("openapi")
            .or_else(|| spec.get("swagger"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if version.is_empty() {
            return Err(SpecError::InvalidSpec(
                "missing 'openapi' or 'swagger' field".into(),
            ));
        }

        // Fresh scratchpad per document.
        let components = spec.get("components").cloned().unwrap_or_else(|| json!({}));
        self.security_schemes = components
            .get("securitySchemes")
            .cloned()
            .unwrap_or_else(|| json!({}));
        self.resolver = SchemaResolver::new(components);

        let global_security = spec.get("security").cloned();

        let mut actions = Vec::new();
        let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
            return Ok(actions);
        };

        for (path, path_item) in paths {
            let Some(item) = path_item.as_object() else {
                continue;
            };
            let endpoint = self.normalize_endpoint(path);
            if !self.should_include(&endpoint) {
                debug!(%endpoint, "endpoint filtered out");
                continue;
            }

            let path_params: Vec<Value> = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for method in HttpMethod::ALL {
                let key = method.as_str().to_ascii_lowercase();
                let Some(operation) = item.get(&key).and_then(Value::as_object) else {
                    continue;
                };
                actions.push(self.parse_operation(
                    method,
                    &endpoint,
                    operation,
                    &path_params,
                    global_security.as_ref(),
                ));
            }
        }

        Ok(actions)
    }

    /// Build seed actions from bare `(method, path)` pairs, applying the
    /// same normalization and filtering as spec-derived endpoints.
    /// Unrecognized methods are dropped.
    #[must_use]
    pub fn seed_actions(&self, endpoints: &[(&str, &str)]) -> Vec<Action> {
        let mut actions = Vec::new();
        for (method, path) in endpoints {
            let Ok(method) = HttpMethod::from_str(method) else {
                warn!(%method, %path, "seed endpoint with unrecognized method dropped");
                continue;
            };
            let endpoint = self.normalize_endpoint(path);
            if self.should_include(&endpoint) {
                actions.push(Action::new(method, endpoint));
            }
        }
        actions
    }

    // ── operation parsing ───────────────────────────────────────────

    fn parse_operation(
        &self,
        method: HttpMethod,
        endpoint: &str,
        operation: &Map<String, Value>,
        path_level_params: &[Value],
        global_security: Option<&Value>,
    ) -> Action {
        let description = operation_description(operation);

        let mut params: Vec<Value> = Vec::new();
        for raw in path_level_params.iter().chain(
            operation
                .get("parameters")
                .and_then(Value::as_array)
                .map(|v| v.as_slice())
                .unwrap_or_default(),
        ) {
            if raw.is_object() {
                params.push(self.resolver.resolve_parameter(raw));
            }
        }

        let mut path_params = Map::new();
        let mut query_params = Map::new();
        let mut cookie_params: Vec<(String, Value)> = Vec::new();
        let mut headers = std::collections::BTreeMap::new();

        for param in &params {
            let location = param.get("in").and_then(Value::as_str).unwrap_or("");
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let required = param
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            match location {
                "path" => {
                    let value = self
                        .param_example(param)
                        .unwrap_or_else(|| self.schema_example(param));
                    path_params.insert(name.to_string(), value);
                }
                "query" => {
                    if let Some(value) = self.param_example(param) {
                        query_params.insert(name.to_string(), value);
                    } else if required {
                        query_params.insert(name.to_string(), self.schema_example(param));
                    }
                }
                "cookie" => {
                    if let Some(value) = self.param_example(param) {
                        cookie_params.push((name.to_string(), value));
                    }
                }
                "header" => {
                    let lower = name.to_ascii_lowercase();
                    if matches!(lower.as_str(), "authorization" | "content-type" | "accept") {
                        continue;
                    }
                    if let Some(value) = self.param_example(param) {
                        headers.insert(name.to_string(), stringify(&value));
                    } else if required {
                        let value = self.schema_example(param);
                        if !value.is_null() {
                            headers.insert(name.to_string(), stringify(&value));
                        }
                    }
                }
                _ => {}
            }
        }

        if !cookie_params.is_empty() {
            let cookie = cookie_params
                .iter()
                .map(|(k, v)| format!("{k}={}", stringify(v)))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert("Cookie".to_string(), cookie);
        }

        let body = if method.takes_body() {
            self.request_body_example(operation.get("requestBody"))
        } else {
            None
        };

        let (requires_auth, auth_type) = self.security_of(operation, global_security);

        if !path_params.is_empty() {
            query_params.insert(
                Action::PATH_PARAMS_KEY.to_string(),
                Value::Object(path_params),
            );
        }

        let mut action = Action::new(method, endpoint);
        action.params = query_params.into_iter().collect();
        action.body = body;
        action.headers = headers;
        action.description = description;
        action.requires_auth = requires_auth;
        action.auth_type = auth_type;
        action
    }

    // Example precedence for one parameter: direct `example`, first of
    // `examples`, then the schema's `default`/`example`.
    fn param_example(&self, param: &Value) -> Option<Value> {
        if let Some(example) = param.get("example") {
            return Some(example.clone());
        }
        if let Some(first) = param
            .get("examples")
            .and_then(Value::as_object)
            .and_then(|examples| examples.values().next())
        {
            if let Some(value) = first.get("value") {
                return Some(value.clone());
            }
        }

        let schema = param.get("schema")?;
        let schema = if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            self.resolver.resolve_ref(reference)
        } else {
            schema.clone()
        };
        if let Some(default) = schema.get("default") {
            return Some(default.clone());
        }
        if let Some(example) = schema.get("example") {
            return Some(example.clone());
        }
        None
    }

    // Synthesized example from the parameter's schema, `null` if absent.
    fn schema_example(&self, param: &Value) -> Value {
        match param.get("schema") {
            Some(schema) => self.resolver.build_example(schema),
            None => Value::Null,
        }
    }

    fn request_body_example(&self, request_body: Option<&Value>) -> Option<Value> {
        let mut request_body = request_body?.clone();
        if let Some(reference) = request_body.get("$ref").and_then(Value::as_str) {
            request_body = self.resolver.resolve_ref(reference);
        }
        let content = request_body.get("content")?.as_object()?;

        let selected_type = CONTENT_TYPE_PRIORITY
            .iter()
            .find(|ct| content.contains_key(**ct))
            .map(|ct| ct.to_string())
            .or_else(|| content.keys().next().cloned())?;
        let selected = content.get(&selected_type)?;

        if let Some(example) = selected.get("example") {
            return Some(example.clone());
        }
        if let Some(first) = selected
            .get("examples")
            .and_then(Value::as_object)
            .and_then(|examples| examples.values().next())
        {
            if let Some(value) = first.get("value") {
                return Some(value.clone());
            }
        }

        let schema = selected.get("schema")?;
        let schema = if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            self.resolver.resolve_ref(reference)
        } else {
            schema.clone()
        };
        let example = self.resolver.build_example(&schema);

        // Form payloads are key/value by nature; wrap loose scalars.
        if FORM_CONTENT_TYPES.contains(&selected_type.as_str()) && !example.is_object() {
            return Some(json!({ "data": example }));
        }
        Some(example)
    }

    // Operation-level security overrides global; an explicit empty list
    // means "no auth". The auth type is the first declared scheme's type.
    fn security_of(
        &self,
        operation: &Map<String, Value>,
        global_security: Option<&Value>,
    ) -> (bool, Option<String>) {
        let security = operation.get("security").or(global_security);
        let Some(requirements) = security.and_then(Value::as_array) else {
            return (false, None);
        };
        if requirements.is_empty() {
            return (false, None);
        }

        let auth_type = requirements
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|req| req.keys())
            .next()
            .map(|scheme_name| {
                self.security_schemes
                    .get(scheme_name)
                    .and_then(|scheme| scheme.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string()
            });

        (true, auth_type)
    }

    // ── endpoint admission ──────────────────────────────────────────

    fn normalize_endpoint(&self, endpoint: &str) -> String {
        let mut endpoint = endpoint.to_string();
        if let Some(base) = &self.base_url {
            if let Some(rest) = endpoint.strip_prefix(base.as_str()) {
                endpoint = rest.to_string();
            }
        }
        if let Some(stripped) = endpoint.split('?').next() {
            endpoint = stripped.to_string();
        }
        if !endpoint.starts_with('/') {
            endpoint = format!("/{endpoint}");
        }
        while endpoint.len() > 1 && endpoint.ends_with('/') {
            endpoint.pop();
        }
        endpoint
    }

    // Exclusion wins unconditionally; with includes configured, at least
    // one must match.
    fn should_include(&self, endpoint: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(endpoint)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|re| re.is_match(endpoint))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, SpecError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| SpecError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

fn load_document(input: SpecInput) -> Result<Value, SpecError> {
    match input {
        SpecInput::Document(value) => Ok(value),
        SpecInput::Text(text) => parse_text(&text),
        SpecInput::File(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|source| SpecError::Io { path: path.clone(), source })?;
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
            if is_yaml {
                serde_yaml::from_str(&text).map_err(|_| SpecError::Unparseable)
            } else {
                serde_json::from_str(&text).map_err(|_| SpecError::Unparseable)
            }
        }
    }
}

// JSON first, YAML as the fallback (YAML is a superset, but JSON errors
// are far more precise for the common case).
fn parse_text(text: &str) -> Result<Value, SpecError> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }
    serde_yaml::from_str(text).map_err(|_| SpecError::Unparseable)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn operation_description(operation: &Map<String, Value>) -> Option<String> {
    let text = operation
        .get("summary")
        .or_else(|| operation.get("description"))
        .and_then(Value::as_str);
    match text {
        Some(text) if text.len() > 200 => {
            let cut: String = text.chars().take(197).collect();
            Some(format!("{cut}..."))
        }
        Some(text) => Some(text.to_string()),
        None => operation
            .get("operationId")
            .and_then(Value::as_str)
            .map(String::from),
    }
}
