// SPDX-License-Identifier: MIT OR Apache-2.0
//! Full-stack run: spec parsing, the reqwest executor against a local
//! wiremock server, state detection, and result assembly.

use serde_json::json;
use sx_core::{ExplorationConfig, HttpMethod, IssueSeverity};
use sx_engine::{StateExplorer, Strategy};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn todo_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "Todos", "version": "1"},
        "paths": {
            "/todos": {
                "post": {
                    "summary": "Create a todo",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "title": {"type": "string", "example": "buy milk"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/todos/{todoId}": {
                "get": {
                    "summary": "Fetch one todo",
                    "parameters": [
                        {"name": "todoId", "in": "path", "required": true,
                         "schema": {"type": "integer"}}
                    ]
                }
            },
            "/admin/stats": {
                "get": {"summary": "Internal stats"}
            }
        }
    })
}

#[tokio::test]
async fn explores_a_live_server_through_the_spec() {
    // RUST_LOG=sx_engine=debug shows the frontier at work.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/todos"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42, "title": "buy milk", "completed": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todos/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42, "title": "buy milk", "completed": false,
            "_links": {"self": {"href": "/todos/42"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "database unavailable"
        })))
        .mount(&server)
        .await;

    let config = ExplorationConfig {
        auth_token: Some("test-token".into()),
        ..ExplorationConfig::default()
    };
    let mut explorer = StateExplorer::new(server.uri(), config, Strategy::Bfs).unwrap();
    let result = explorer.explore_spec(todo_spec()).await.unwrap();

    assert!(result.success);

    // The POST fed the templated GET its id.
    let get = result
        .graph
        .transitions
        .iter()
        .find(|t| t.action.method == HttpMethod::Get && t.action.endpoint.contains("/todos/"))
        .expect("substituted GET transition");
    assert_eq!(get.action.endpoint, "/todos/42");
    assert!(get.success);

    // The 500 became a high-severity issue and a failed transition.
    let issue = result
        .issues
        .iter()
        .find(|i| {
            i.action
                .as_ref()
                .is_some_and(|a| a.endpoint == "/admin/stats")
        })
        .expect("issue for /admin/stats");
    assert_eq!(issue.severity, IssueSeverity::High);
    let failed = result
        .graph
        .transitions
        .iter()
        .find(|t| t.action.endpoint == "/admin/stats")
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.status_code, Some(500));

    // Coverage saw all three endpoints and exercised all three.
    assert_eq!(result.coverage.endpoints_discovered, 3);
    assert_eq!(result.coverage.endpoints_tested, 3);

    // The created todo's context is visible on the read state.
    let read_state = result.graph.state(&get.to_state).unwrap();
    assert_eq!(read_state.metadata.context.get("todo_id"), Some(&42i64.into()));
}

#[tokio::test]
async fn exclude_patterns_keep_endpoints_off_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todos/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;

    let config = ExplorationConfig {
        exclude_patterns: vec!["^/admin".into()],
        ..ExplorationConfig::default()
    };
    let mut explorer = StateExplorer::new(server.uri(), config, Strategy::Bfs).unwrap();
    let result = explorer.explore_spec(todo_spec()).await.unwrap();

    assert!(result.success);
    assert!(
        result
            .graph
            .transitions
            .iter()
            .all(|t| !t.action.endpoint.starts_with("/admin"))
    );
    // Verified on drop by the wiremock expectation as well.
}
