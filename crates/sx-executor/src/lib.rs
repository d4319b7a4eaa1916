// SPDX-License-Identifier: MIT OR Apache-2.0
//! sx-executor
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The executor contract and its reqwest-backed implementation.
//!
//! The engine never touches the network itself: it hands an [`Action`] to
//! an injected [`ActionExecutor`] and receives an [`ExecutorResponse`]
//! back. [`HttpExecutor`] is the built-in implementation, created from an
//! [`ExplorationConfig`] when nothing else is injected.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use sx_core::{Action, ExplorationConfig};
use thiserror::Error;
use tracing::debug;

/// Failure modes of an executor call. The engine maps timeouts to
/// medium-severity issues and everything else to high.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The request exceeded the per-request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// What an executor hands back: at minimum a status code and a JSON body.
///
/// Non-JSON payloads arrive wrapped as `{"raw": "<text>"}` so the
/// detector always has a JSON value to work with.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Parsed JSON body, or the raw-text envelope.
    pub body: Value,
    /// Response headers. The core does not consume them.
    pub headers: BTreeMap<String, String>,
}

impl ExecutorResponse {
    /// A JSON response with no headers of interest.
    #[must_use]
    pub fn new(status_code: u16, body: Value) -> Self {
        ExecutorResponse {
            status_code,
            body,
            headers: BTreeMap::new(),
        }
    }

    /// Wrap a non-JSON payload in the raw-text envelope.
    #[must_use]
    pub fn raw(status_code: u16, text: impl Into<String>) -> Self {
        ExecutorResponse::new(status_code, json!({ "raw": text.into() }))
    }

    /// Whether the status is a 4xx/5xx.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// Turns actions into responses. The single injection seam between the
/// engine and the outside world.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute one action. Implementations must already have resolved
    /// authentication and default headers.
    async fn execute(&self, action: &Action) -> Result<ExecutorResponse, ExecutorError>;
}

// ---------------------------------------------------------------------------
// HttpExecutor
// ---------------------------------------------------------------------------

/// The built-in executor: a reqwest client configured from an
/// [`ExplorationConfig`], joined to a base URL.
///
/// Query parameters skip the reserved `_path_params` entry, the
/// configured bearer token becomes an `Authorization` header, and
/// config-level headers merge under action-level ones.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    default_headers: BTreeMap<String, String>,
    auth_token: Option<String>,
    request_timeout: Duration,
}

impl HttpExecutor {
    /// Build an executor for `base_url` from the transport options in
    /// `config`.
    pub fn new(
        base_url: impl Into<String>,
        config: &ExplorationConfig,
    ) -> Result<Self, ExecutorError> {
        let redirects = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(redirects)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        Ok(HttpExecutor {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_headers: config.headers.clone(),
            auth_token: config.auth_token.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl ActionExecutor for HttpExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutorResponse, ExecutorError> {
        let url = self.url_for(&action.endpoint);
        debug!(method = %action.method, %url, "executing action");

        let method = reqwest::Method::from_bytes(action.method.as_str().as_bytes())
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        let mut request = self.client.request(method, &url);

        for (name, value) in &self.default_headers {
            request = request.header(name, value);
        }
        for (name, value) in &action.headers {
            request = request.header(name, value);
        }
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let query: Vec<(String, String)> = action
            .wire_params()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect();
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = &action.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecutorError::Timeout(self.request_timeout)
            } else {
                ExecutorError::Transport(e.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        let body = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => json!({ "raw": text }),
        };

        Ok(ExecutorResponse {
            status_code,
            body,
            headers,
        })
    }
}
