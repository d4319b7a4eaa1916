// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine behaviour against the scripted mock executor: strategies,
//! budgets, issue severities, admission, and fallback synthesis.

use serde_json::json;
use std::sync::Arc;
use sx_core::{Action, ExplorationConfig, HttpMethod, IssueSeverity, State};
use sx_detect::StateDetector;
use sx_engine::{ExplorationEngine, Strategy};
use sx_executor::ExecutorResponse;
use sx_executor_mock::MockExecutor;

// ── helpers ──────────────────────────────────────────────────────────

fn initial_with(actions: Vec<Action>) -> State {
    let mut state = State::new("initial", "Initial");
    state.available_actions = actions;
    state
}

fn engine(mock: Arc<MockExecutor>, config: ExplorationConfig, strategy: Strategy) -> ExplorationEngine {
    ExplorationEngine::new(config, strategy, mock).with_detector(StateDetector::new())
}

/// A linear chain: GET /chain/0 links to /chain/1, which links to
/// /chain/2, and so on. The `status` field is a state-key field, so
/// every chain node fingerprints as its own state.
fn chain_mock(length: usize) -> Arc<MockExecutor> {
    let mock = Arc::new(MockExecutor::new());
    for i in 0..length {
        let mut body = json!({"status": format!("step{i}")});
        if i + 1 < length {
            body["_links"] = json!({
                "next": {"href": format!("/chain/{}", i + 1), "method": "GET"}
            });
        }
        mock.respond(
            HttpMethod::Get,
            format!("/chain/{i}"),
            ExecutorResponse::new(200, body),
        );
    }
    mock
}

// ── strategies ───────────────────────────────────────────────────────

#[tokio::test]
async fn bfs_walks_a_chain_to_its_end() {
    let mock = chain_mock(4);
    let mut engine = engine(mock, ExplorationConfig::default(), Strategy::Bfs);

    let graph = engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
            None,
        )
        .await
        .unwrap();

    // initial + four chain states, four transitions.
    assert_eq!(graph.state_count(), 5);
    assert_eq!(graph.transition_count(), 4);
    assert!(graph.transitions.iter().all(|t| t.success));
}

#[tokio::test]
async fn dfs_and_greedy_cover_the_same_chain() {
    for strategy in [Strategy::Dfs, Strategy::Greedy, Strategy::Hybrid] {
        let mock = chain_mock(3);
        let mut engine = engine(mock, ExplorationConfig::default(), strategy);
        let graph = engine
            .explore(
                initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(graph.transition_count(), 3, "strategy {strategy}");
    }
}

#[tokio::test]
async fn random_walk_is_deterministic_under_a_seed() {
    let mut graphs = Vec::new();
    for _ in 0..2 {
        let mock = chain_mock(5);
        let config = ExplorationConfig {
            random_seed: Some(7),
            ..ExplorationConfig::default()
        };
        let mut engine = engine(mock, config, Strategy::Random);
        let graph = engine
            .explore(
                initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
                None,
            )
            .await
            .unwrap();
        graphs.push(graph);
    }

    let labels = |g: &sx_core::StateGraph| -> Vec<String> {
        g.transitions
            .iter()
            .map(|t| format!("{}>{}>{}", t.from_state, t.action.transition_label(), t.to_state))
            .collect()
    };
    assert_eq!(labels(&graphs[0]), labels(&graphs[1]));
}

// ── budgets ──────────────────────────────────────────────────────────

#[tokio::test]
async fn max_states_budget_stops_exploration() {
    let mock = chain_mock(10);
    let config = ExplorationConfig {
        max_states: 3,
        ..ExplorationConfig::default()
    };
    let mut engine = engine(mock, config, Strategy::Bfs);
    engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
            None,
        )
        .await
        .unwrap();

    let coverage = engine.coverage_report();
    assert!(coverage.states_found <= 3);
}

#[tokio::test]
async fn max_transitions_budget_stops_exploration() {
    let mock = chain_mock(10);
    let config = ExplorationConfig {
        max_transitions: 2,
        ..ExplorationConfig::default()
    };
    let mut engine = engine(mock, config, Strategy::Bfs);
    engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
            None,
        )
        .await
        .unwrap();

    assert!(engine.coverage_report().transitions_found <= 2);
}

#[tokio::test]
async fn depth_budget_cuts_the_chain() {
    let mock = chain_mock(10);
    let config = ExplorationConfig {
        max_depth: 2,
        ..ExplorationConfig::default()
    };
    let mut engine = engine(mock, config, Strategy::Bfs);
    let graph = engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
            None,
        )
        .await
        .unwrap();

    // Depth 0 expands /chain/0, depth 1 expands /chain/1, depth 2 is cut.
    assert_eq!(graph.transition_count(), 2);
}

// ── issues ───────────────────────────────────────────────────────────

#[tokio::test]
async fn http_statuses_map_to_issue_severities() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Get,
        "/client-error",
        ExecutorResponse::new(404, json!({"error": "nope"})),
    );
    mock.respond(
        HttpMethod::Get,
        "/server-error",
        ExecutorResponse::new(500, json!({"error": "boom"})),
    );
    mock.fail(HttpMethod::Get, "/broken", "connection refused");
    mock.time_out(HttpMethod::Get, "/slow");

    let mut engine = engine(mock, ExplorationConfig::default(), Strategy::Bfs);
    engine
        .explore(
            initial_with(vec![
                Action::new(HttpMethod::Get, "/client-error"),
                Action::new(HttpMethod::Get, "/server-error"),
                Action::new(HttpMethod::Get, "/broken"),
                Action::new(HttpMethod::Get, "/slow"),
            ]),
            None,
        )
        .await
        .unwrap();

    let severity_for = |endpoint: &str| {
        engine
            .issues()
            .iter()
            .find(|i| {
                i.action
                    .as_ref()
                    .is_some_and(|a| a.endpoint == endpoint)
            })
            .map(|i| i.severity)
            .unwrap_or_else(|| panic!("no issue for {endpoint}"))
    };
    assert_eq!(severity_for("/client-error"), IssueSeverity::Medium);
    assert_eq!(severity_for("/server-error"), IssueSeverity::High);
    assert_eq!(severity_for("/broken"), IssueSeverity::High);
    assert_eq!(severity_for("/slow"), IssueSeverity::Medium);

    // Failures still record transitions.
    assert_eq!(engine.graph().transition_count(), 4);
    assert!(engine.graph().transitions.iter().all(|t| !t.success));

    // Every failure state buckets as error; only the initial state is a
    // success.
    let coverage = engine.coverage_report();
    assert_eq!(coverage.state_breakdown.get("success"), Some(&1));
    assert_eq!(coverage.state_breakdown.get("error"), Some(&4));
}

#[tokio::test]
async fn issues_carry_state_and_action() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Delete,
        "/todos/1",
        ExecutorResponse::new(403, json!({"error": "forbidden"})),
    );
    let mut engine = engine(mock, ExplorationConfig::default(), Strategy::Bfs);
    engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Delete, "/todos/1")]),
            None,
        )
        .await
        .unwrap();

    let issue = &engine.issues()[0];
    assert_eq!(issue.state.as_deref(), Some("initial"));
    assert_eq!(
        issue.action.as_ref().unwrap().endpoint,
        "/todos/1"
    );
    assert!(issue.response_data.is_some());
}

// ── context propagation and admission ────────────────────────────────

#[tokio::test]
async fn unresolvable_placeholders_skip_without_a_transition() {
    let mock = Arc::new(MockExecutor::new());
    let mut engine = engine(mock, ExplorationConfig::default(), Strategy::Bfs);
    let graph = engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/todos/{todoId}")]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(graph.transition_count(), 0);
    assert_eq!(engine.skipped_actions().count(), 1);
    assert!(engine.issues().is_empty());
}

#[tokio::test]
async fn sibling_actions_chain_through_extracted_context() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Post,
        "/todos",
        ExecutorResponse::new(201, json!({"id": 42, "title": "x"})),
    );
    mock.respond(
        HttpMethod::Get,
        "/todos/42",
        ExecutorResponse::new(200, json!({"id": 42, "title": "x", "completed": false})),
    );

    let mut engine = engine(mock.clone(), ExplorationConfig::default(), Strategy::Bfs);
    let graph = engine
        .explore(
            initial_with(vec![
                Action::new(HttpMethod::Post, "/todos").with_body(json!({"title": "x"})),
                Action::new(HttpMethod::Get, "/todos/{todoId}"),
            ]),
            None,
        )
        .await
        .unwrap();

    // The GET executed against the substituted endpoint.
    assert_eq!(mock.call_count(HttpMethod::Get, "/todos/42"), 1);
    let substituted = graph
        .transitions
        .iter()
        .find(|t| t.action.method == HttpMethod::Get)
        .unwrap();
    assert_eq!(substituted.action.endpoint, "/todos/42");
    assert_eq!(engine.skipped_actions().count(), 0);
}

#[tokio::test]
async fn engine_level_admission_uses_substring_checks() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(HttpMethod::Get, "/keep", ExecutorResponse::new(200, json!({"k": 1})));
    mock.respond(HttpMethod::Get, "/drop", ExecutorResponse::new(200, json!({"d": 1})));

    let config = ExplorationConfig {
        exclude_patterns: vec!["/drop".into()],
        ..ExplorationConfig::default()
    };
    let mut engine = engine(mock.clone(), config, Strategy::Bfs);
    engine
        .explore(
            initial_with(vec![
                Action::new(HttpMethod::Get, "/keep"),
                Action::new(HttpMethod::Get, "/drop"),
            ]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(mock.call_count(HttpMethod::Get, "/keep"), 1);
    assert_eq!(mock.call_count(HttpMethod::Get, "/drop"), 0);
}

// ── fallback synthesis ───────────────────────────────────────────────

#[tokio::test]
async fn without_a_detector_fallback_states_are_synthesized() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Get,
        "/a",
        ExecutorResponse::new(
            200,
            json!({"x": 1, "_links": {"next": {"href": "/b", "method": "GET"}}}),
        ),
    );
    mock.respond(HttpMethod::Get, "/b", ExecutorResponse::new(200, json!({"y": 2})));

    // No detector injected at all.
    let mut engine = ExplorationEngine::new(
        ExplorationConfig::default(),
        Strategy::Bfs,
        mock,
    );
    let graph = engine
        .explore(initial_with(vec![Action::new(HttpMethod::Get, "/a")]), None)
        .await
        .unwrap();

    // initial, the /a state, and the /b state reached via the HAL link.
    assert_eq!(graph.state_count(), 3);
    assert!(graph.states.keys().any(|id| id.starts_with("state__a_")));
}

#[tokio::test]
async fn failed_fallback_states_use_error_ids() {
    let mock = Arc::new(MockExecutor::new());
    let mut engine = ExplorationEngine::new(
        ExplorationConfig::default(),
        Strategy::Bfs,
        mock,
    );
    let graph = engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/missing")]),
            None,
        )
        .await
        .unwrap();

    assert!(graph.states.contains_key("error_404__missing"));
}

// ── cycles and coverage ──────────────────────────────────────────────

#[tokio::test]
async fn two_state_cycle_terminates_with_deduplicated_transitions() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Get,
        "/a",
        ExecutorResponse::new(
            200,
            json!({"name": "alpha", "_links": {"to-b": {"href": "/b"}}}),
        ),
    );
    mock.respond(
        HttpMethod::Get,
        "/b",
        ExecutorResponse::new(
            200,
            json!({"label": "beta", "_links": {"to-a": {"href": "/a"}}}),
        ),
    );

    let mut engine = engine(mock, ExplorationConfig::default(), Strategy::Bfs);
    let graph = engine
        .explore(initial_with(vec![Action::new(HttpMethod::Get, "/a")]), None)
        .await
        .unwrap();

    assert!(graph.transition_count() <= 4);
    // A and B are mutually reachable.
    let a = graph
        .transitions
        .iter()
        .find(|t| t.action.endpoint == "/a")
        .unwrap()
        .to_state
        .clone();
    let b = graph
        .transitions
        .iter()
        .find(|t| t.action.endpoint == "/b")
        .unwrap()
        .to_state
        .clone();
    assert!(graph.has_path(&a, &b));
    assert!(graph.has_path(&b, &a));
}

#[tokio::test]
async fn coverage_counts_discovered_versus_executed() {
    let mock = Arc::new(MockExecutor::new());
    mock.respond(
        HttpMethod::Get,
        "/root",
        ExecutorResponse::new(
            200,
            json!({
                "section": "root",
                "_links": {
                    "one": {"href": "/one"},
                    "two": {"href": "/two"}
                }
            }),
        ),
    );
    mock.respond(HttpMethod::Get, "/one", ExecutorResponse::new(200, json!({"n": 1})));
    mock.respond(HttpMethod::Get, "/two", ExecutorResponse::new(200, json!({"n": 2})));

    let config = ExplorationConfig {
        max_transitions: 1,
        ..ExplorationConfig::default()
    };
    let mut engine = engine(mock, config, Strategy::Bfs);
    engine
        .explore(initial_with(vec![Action::new(HttpMethod::Get, "/root")]), None)
        .await
        .unwrap();

    let coverage = engine.coverage_report();
    // /root executed; /one and /two discovered but never tried.
    assert_eq!(coverage.endpoints_discovered, 3);
    assert_eq!(coverage.endpoints_tested, 1);
    assert_eq!(coverage.uncovered_actions.len(), 2);
    assert!(coverage.endpoints_tested <= coverage.endpoints_discovered);
    assert!((0.0..=100.0).contains(&coverage.coverage_percent));
    // Initial state and the one successful destination.
    assert_eq!(coverage.state_breakdown.get("success"), Some(&2));
    assert_eq!(coverage.state_breakdown.get("error"), None);
}

#[tokio::test]
async fn repeated_explore_calls_reset_run_state() {
    let mock = chain_mock(2);
    let mut engine = engine(mock, ExplorationConfig::default(), Strategy::Bfs);

    let first = engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
            None,
        )
        .await
        .unwrap();
    let second = engine
        .explore(
            initial_with(vec![Action::new(HttpMethod::Get, "/chain/0")]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(first.transition_count(), second.transition_count());
}
