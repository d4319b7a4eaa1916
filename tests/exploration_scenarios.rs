// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end exploration scenarios over the scripted mock executor:
//! create/read chains, nested resources, depth bounds, and cycles.

use serde_json::json;
use std::sync::Arc;
use sx_core::{Action, ExplorationConfig, ExplorationContext, HttpMethod};
use sx_engine::{StateExplorer, Strategy};
use sx_executor::ExecutorResponse;
use sx_executor_mock::MockExecutor;

fn explorer_over(mock: Arc<MockExecutor>, config: ExplorationConfig) -> StateExplorer {
    StateExplorer::with_executor("http://api.test", config, Strategy::Bfs, mock)
}

// ── 1. Todo create then read through the extracted id ───────────────

#[tokio::test]
async fn todo_create_read_chain() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Post,
        "/todos",
        ExecutorResponse::new(201, json!({"id": 42, "title": "x", "completed": false})),
    );
    mock.respond(
        HttpMethod::Get,
        "/todos/42",
        ExecutorResponse::new(200, json!({"id": 42, "title": "x", "completed": false})),
    );

    let mut explorer = explorer_over(mock.clone(), ExplorationConfig::default());
    let result = explorer
        .explore(Some(vec![
            Action::new(HttpMethod::Post, "/todos").with_body(json!({"title": "x"})),
            Action::new(HttpMethod::Get, "/todos/{todoId}"),
        ]))
        .await;

    assert!(result.success);
    assert_eq!(result.graph.transition_count(), 2);
    // Initial plus the two response states.
    assert_eq!(result.graph.state_count(), 3);

    // The templated GET ran against the concrete endpoint.
    assert_eq!(mock.call_count(HttpMethod::Get, "/todos/42"), 1);

    // The read state carries the extracted id in its context and name.
    let read = result
        .graph
        .transitions
        .iter()
        .find(|t| t.action.method == HttpMethod::Get)
        .unwrap();
    let read_state = result.graph.state(&read.to_state).unwrap();
    assert_eq!(
        read_state.metadata.context.get("todo_id"),
        Some(&42i64.into())
    );
    assert!(read_state.name.contains("Todo:42"), "name: {}", read_state.name);
}

// ── 2. Nested attachment ids substitute two levels deep ──────────────

#[test]
fn nested_attachment_substitution() {
    let mut ctx = ExplorationContext::new();
    sx_context::extract_context(
        &json!({"id": "abc-123", "todo_id": 42}),
        "/todos/42/attachments",
        &mut ctx,
    );

    assert_eq!(
        sx_context::substitute_path_params("/todos/{todoId}/attachments/{attachmentId}", &ctx),
        Some("/todos/42/attachments/abc-123".to_string())
    );
}

// ── 3. BFS respects the depth bound exactly ──────────────────────────

#[tokio::test]
async fn bfs_depth_bound_cuts_at_three() {
    let mock = Arc::new(MockExecutor::new());
    // Each level links to the next; statuses keep the states distinct.
    for level in 0..6 {
        mock.respond(
            HttpMethod::Get,
            format!("/level/{level}"),
            ExecutorResponse::new(
                200,
                json!({
                    "status": format!("level{level}"),
                    "_links": {"next": {"href": format!("/level/{}", level + 1)}}
                }),
            ),
        );
    }

    let config = ExplorationConfig {
        max_depth: 3,
        ..ExplorationConfig::default()
    };
    let mut explorer = explorer_over(mock, config);
    let result = explorer
        .explore(Some(vec![Action::new(HttpMethod::Get, "/level/0")]))
        .await;

    // Initial plus exactly one state per depth 1..=3.
    assert_eq!(result.graph.state_count(), 4);
    assert_eq!(result.graph.transition_count(), 3);
    assert!(
        result
            .graph
            .transitions
            .iter()
            .all(|t| t.action.endpoint != "/level/3"),
        "no transition past depth 3"
    );
}

// ── 4. Cycles terminate and deduplicate ──────────────────────────────

#[tokio::test]
async fn cycle_between_two_states_terminates() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Get,
        "/ping",
        ExecutorResponse::new(
            200,
            json!({"status": "ping", "_links": {"pong": {"href": "/pong"}}}),
        ),
    );
    mock.respond(
        HttpMethod::Get,
        "/pong",
        ExecutorResponse::new(
            200,
            json!({"status": "pong", "_links": {"ping": {"href": "/ping"}}}),
        ),
    );

    let mut explorer = explorer_over(mock, ExplorationConfig::default());
    let result = explorer
        .explore(Some(vec![Action::new(HttpMethod::Get, "/ping")]))
        .await;

    assert!(result.success);
    assert!(result.graph.transition_count() <= 4);

    // Re-adding an existing transition changes nothing.
    let mut graph = result.graph.clone();
    let existing = graph.transitions[0].clone();
    let before = graph.transition_count();
    graph.add_transition(existing);
    assert_eq!(graph.transition_count(), before);
}

// ── graph well-formedness and budget monotonicity ────────────────────

#[tokio::test]
async fn graphs_stay_well_formed_under_tight_budgets() {
    for (max_states, max_transitions, max_depth) in
        [(1, 500, 10), (2, 2, 10), (100, 1, 10), (3, 500, 1), (5, 4, 2)]
    {
        let mock = Arc::new(MockExecutor::new());
        for i in 0..8 {
            mock.respond(
                HttpMethod::Get,
                format!("/n/{i}"),
                ExecutorResponse::new(
                    200,
                    json!({
                        "status": format!("n{i}"),
                        "_links": {
                            "a": {"href": format!("/n/{}", (i + 1) % 8)},
                            "b": {"href": format!("/n/{}", (i + 3) % 8)}
                        }
                    }),
                ),
            );
        }

        let config = ExplorationConfig {
            max_states,
            max_transitions,
            max_depth,
            ..ExplorationConfig::default()
        };
        let mut explorer = explorer_over(mock, config);
        let result = explorer
            .explore(Some(vec![Action::new(HttpMethod::Get, "/n/0")]))
            .await;

        assert!(result.success);
        // Every transition endpoint is a known state.
        for t in &result.graph.transitions {
            assert!(result.graph.states.contains_key(&t.from_state));
            assert!(result.graph.states.contains_key(&t.to_state));
        }
        // Budgets hold at termination.
        assert!(result.coverage.states_found <= max_states);
        assert!(result.coverage.transitions_found <= max_transitions);
    }
}

// ── strategies agree on reachability for a small fixed API ───────────

#[tokio::test]
async fn every_strategy_terminates_on_the_same_api() {
    for strategy in [
        Strategy::Bfs,
        Strategy::Dfs,
        Strategy::Random,
        Strategy::Greedy,
        Strategy::Hybrid,
    ] {
        let mock = Arc::new(MockExecutor::new());
        mock.respond(
            HttpMethod::Get,
            "/a",
            ExecutorResponse::new(
                200,
                json!({"status": "a", "_links": {"next": {"href": "/b"}}}),
            ),
        );
        mock.respond(
            HttpMethod::Get,
            "/b",
            ExecutorResponse::new(200, json!({"status": "b"})),
        );

        let config = ExplorationConfig {
            random_seed: Some(1),
            ..ExplorationConfig::default()
        };
        let mut explorer =
            StateExplorer::with_executor("http://api.test", config, strategy, mock);
        let result = explorer
            .explore(Some(vec![Action::new(HttpMethod::Get, "/a")]))
            .await;

        assert!(result.success, "strategy {strategy}");
        assert_eq!(result.graph.transition_count(), 2, "strategy {strategy}");
    }
}
