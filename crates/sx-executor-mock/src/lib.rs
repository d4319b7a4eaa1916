// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mock executor implementation used for local testing.
//!
//! Scripts responses by `(method, endpoint)` and records every executed
//! action, so engine behaviour can be asserted without a network.

#![deny(unsafe_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use sx_core::{Action, HttpMethod};
use sx_executor::{ActionExecutor, ExecutorError, ExecutorResponse};

type RouteKey = (HttpMethod, String);

/// An executor for unit and integration tests.
///
/// One-shot responses queue per route and are consumed first; a sticky
/// response per route answers everything afterwards. Unmatched requests
/// get the fallback status (404 unless changed).
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sx_core::{Action, HttpMethod};
/// use sx_executor::{ActionExecutor, ExecutorResponse};
/// use sx_executor_mock::MockExecutor;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let mock = MockExecutor::new();
/// mock.respond(HttpMethod::Get, "/todos/42", ExecutorResponse::new(200, json!({"id": 42})));
///
/// let ok = mock.execute(&Action::new(HttpMethod::Get, "/todos/42")).await.unwrap();
/// assert_eq!(ok.status_code, 200);
///
/// let missing = mock.execute(&Action::new(HttpMethod::Get, "/nope")).await.unwrap();
/// assert_eq!(missing.status_code, 404);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MockExecutor {
    once: Mutex<HashMap<RouteKey, VecDeque<ExecutorResponse>>>,
    sticky: Mutex<HashMap<RouteKey, ExecutorResponse>>,
    failures: Mutex<HashMap<RouteKey, String>>,
    timeouts: Mutex<std::collections::HashSet<RouteKey>>,
    calls: Mutex<Vec<Action>>,
    fallback_status: u16,
}

impl MockExecutor {
    /// A mock with no routes and a 404 fallback.
    #[must_use]
    pub fn new() -> Self {
        MockExecutor {
            fallback_status: 404,
            ..MockExecutor::default()
        }
    }

    /// Change the status answered for unscripted routes.
    #[must_use]
    pub fn with_fallback_status(mut self, status: u16) -> Self {
        self.fallback_status = status;
        self
    }

    /// Script the sticky response for a route.
    pub fn respond(&self, method: HttpMethod, endpoint: impl Into<String>, response: ExecutorResponse) {
        self.sticky
            .lock()
            .expect("sticky mutex poisoned")
            .insert((method, endpoint.into()), response);
    }

    /// Queue a one-shot response for a route; consumed before the sticky
    /// response.
    pub fn respond_once(
        &self,
        method: HttpMethod,
        endpoint: impl Into<String>,
        response: ExecutorResponse,
    ) {
        self.once
            .lock()
            .expect("once mutex poisoned")
            .entry((method, endpoint.into()))
            .or_default()
            .push_back(response);
    }

    /// Make a route fail with a transport error instead of responding.
    pub fn fail(&self, method: HttpMethod, endpoint: impl Into<String>, message: impl Into<String>) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .insert((method, endpoint.into()), message.into());
    }

    /// Make a route time out instead of responding.
    pub fn time_out(&self, method: HttpMethod, endpoint: impl Into<String>) {
        self.timeouts
            .lock()
            .expect("timeouts mutex poisoned")
            .insert((method, endpoint.into()));
    }

    /// Every action executed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Action> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// How many times a route was hit.
    #[must_use]
    pub fn call_count(&self, method: HttpMethod, endpoint: &str) -> usize {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .filter(|a| a.method == method && a.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutorResponse, ExecutorError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(action.clone());

        let key = (action.method, action.endpoint.clone());

        if self.timeouts.lock().expect("timeouts mutex poisoned").contains(&key) {
            return Err(ExecutorError::Timeout(std::time::Duration::from_secs(30)));
        }

        if let Some(message) = self.failures.lock().expect("failures mutex poisoned").get(&key) {
            return Err(ExecutorError::Transport(message.clone()));
        }

        if let Some(queue) = self.once.lock().expect("once mutex poisoned").get_mut(&key) {
            if let Some(response) = queue.pop_front() {
                return Ok(response);
            }
        }

        if let Some(response) = self.sticky.lock().expect("sticky mutex poisoned").get(&key) {
            return Ok(response.clone());
        }

        Ok(ExecutorResponse::new(
            self.fallback_status,
            json!({"error": "no scripted response", "endpoint": action.endpoint}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn once_responses_drain_before_sticky() {
        let mock = MockExecutor::new();
        mock.respond_once(
            HttpMethod::Post,
            "/todos",
            ExecutorResponse::new(201, json!({"id": 1})),
        );
        mock.respond(
            HttpMethod::Post,
            "/todos",
            ExecutorResponse::new(409, json!({"error": "duplicate"})),
        );

        let action = Action::new(HttpMethod::Post, "/todos");
        assert_eq!(mock.execute(&action).await.unwrap().status_code, 201);
        assert_eq!(mock.execute(&action).await.unwrap().status_code, 409);
        assert_eq!(mock.call_count(HttpMethod::Post, "/todos"), 2);
    }

    #[tokio::test]
    async fn scripted_failures_surface_as_transport_errors() {
        let mock = MockExecutor::new();
        mock.fail(HttpMethod::Get, "/flaky", "connection reset");

        let err = mock
            .execute(&Action::new(HttpMethod::Get, "/flaky"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Transport(_)));
    }

    #[tokio::test]
    async fn fallback_status_is_configurable() {
        let mock = MockExecutor::new().with_fallback_status(503);
        let response = mock
            .execute(&Action::new(HttpMethod::Get, "/anything"))
            .await
            .unwrap();
        assert_eq!(response.status_code, 503);
    }
}
