// SPDX-License-Identifier: MIT OR Apache-2.0
//! The exploration engine: frontier loops, budgets, transition and issue
//! recording, coverage.

use crate::strategy::{Frontier, FrontierEntry, frontier_for};
use crate::{EngineError, ResponseDetector, Strategy};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use sx_context::{extract_context, generate_state_name, substitute_path_params};
use sx_core::{
    Action, CoverageReport, ExplorationConfig, ExplorationContext, Issue, IssueSeverity,
    ScalarValue, State, StateGraph, StateId, Transition,
};
use sx_detect::extract_link_actions;
use sx_executor::{ActionExecutor, ExecutorError};
use tracing::{debug, info, warn};

/// One expansion outcome: the state an action led to, the recorded
/// transition, the branch context after extraction, and whether the
/// state was first seen by this execution.
#[derive(Debug, Clone)]
pub struct DiscoveredTransition {
    /// Destination state.
    pub state: State,
    /// The recorded transition.
    pub transition: Transition,
    /// Branch context after extraction from the response.
    pub context: ExplorationContext,
    /// Whether the destination was newly visited.
    pub newly_visited: bool,
}

/// Explores the reachable state space of an API by executing actions
/// through an injected [`ActionExecutor`] and recording the resulting
/// transitions.
///
/// The engine owns its graph, visited sets, issue list, and detector for
/// the duration of a run; callers read them back through accessors after
/// [`explore`](ExplorationEngine::explore) returns. A second `explore`
/// call resets all run state first.
pub struct ExplorationEngine {
    config: ExplorationConfig,
    strategy: Strategy,
    executor: Arc<dyn ActionExecutor>,
    detector: Option<Box<dyn ResponseDetector>>,
    graph: StateGraph,
    issues: Vec<Issue>,
    visited_states: BTreeSet<StateId>,
    visited_transitions: BTreeSet<(StateId, String, StateId)>,
    discovered_actions: HashSet<Action>,
    executed_actions: HashSet<Action>,
    skipped_actions: HashSet<Action>,
    state_contexts: BTreeMap<StateId, ExplorationContext>,
    current_depth: u32,
    deadline: Option<Instant>,
}

impl ExplorationEngine {
    /// Create an engine over an injected executor.
    #[must_use]
    pub fn new(config: ExplorationConfig, strategy: Strategy, executor: Arc<dyn ActionExecutor>) -> Self {
        ExplorationEngine {
            config,
            strategy,
            executor,
            detector: None,
            graph: StateGraph::new(),
            issues: Vec::new(),
            visited_states: BTreeSet::new(),
            visited_transitions: BTreeSet::new(),
            discovered_actions: HashSet::new(),
            executed_actions: HashSet::new(),
            skipped_actions: HashSet::new(),
            state_contexts: BTreeMap::new(),
            current_depth: 0,
            deadline: None,
        }
    }

    /// Inject the detector consulted for every response.
    pub fn set_detector(&mut self, detector: impl ResponseDetector + 'static) {
        self.detector = Some(Box::new(detector));
    }

    /// Builder form of [`set_detector`](Self::set_detector).
    #[must_use]
    pub fn with_detector(mut self, detector: impl ResponseDetector + 'static) -> Self {
        self.set_detector(detector);
        self
    }

    /// Change the traversal strategy.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    // ── run lifecycle ───────────────────────────────────────────────

    /// Explore from an initial state until a budget trips or the
    /// frontier drains. Returns the completed graph.
    ///
    /// Only an [`EngineError::InvariantViolation`] is an error; budget
    /// expiry and per-action failures terminate cleanly.
    pub async fn explore(
        &mut self,
        mut initial_state: State,
        initial_actions: Option<Vec<Action>>,
    ) -> Result<StateGraph, EngineError> {
        self.reset();
        self.deadline = Some(Instant::now() + self.config.timeout);

        if let Some(actions) = initial_actions {
            for action in actions {
                if !initial_state.available_actions.contains(&action) {
                    initial_state.available_actions.push(action);
                }
            }
        }
        for action in &initial_state.available_actions {
            self.discovered_actions.insert(action.clone());
        }
        // The starting point is trivially reachable; give it an outcome
        // so the coverage breakdown covers every state.
        initial_state
            .properties
            .entry("success".to_string())
            .or_insert(ScalarValue::Bool(true));

        let initial_context = ExplorationContext::new();
        self.graph.add_state(initial_state.clone());
        self.visited_states.insert(initial_state.id.clone());
        self.state_contexts
            .insert(initial_state.id.clone(), initial_context.clone());

        info!(strategy = %self.strategy, states = 1, "exploration starting");

        let seed = FrontierEntry::new(initial_state, 0, initial_context);
        match self.strategy {
            Strategy::Bfs => self.run_frontier(Strategy::Bfs, vec![seed]).await,
            Strategy::Dfs => self.run_frontier(Strategy::Dfs, vec![seed]).await,
            Strategy::Greedy => self.run_frontier(Strategy::Greedy, vec![seed]).await,
            Strategy::Random => self.run_random(seed.state, seed.context).await,
            Strategy::Hybrid => {
                let configured_depth = self.config.max_depth;
                self.config.max_depth = configured_depth.min(2);
                self.run_frontier(Strategy::Bfs, vec![seed]).await;
                self.config.max_depth = configured_depth;
                // The shallow pass exhausted the initial state; continue
                // from every visited state that still has untried actions.
                let seeds = self.unexhausted_seeds();
                self.run_frontier(Strategy::Greedy, seeds).await;
            }
        }

        self.verify_graph()?;
        info!(
            states = self.visited_states.len(),
            transitions = self.visited_transitions.len(),
            issues = self.issues.len(),
            "exploration finished"
        );
        Ok(self.graph.clone())
    }

    // BFS, DFS, and Greedy share one loop over their frontier shapes.
    async fn run_frontier(&mut self, strategy: Strategy, seeds: Vec<FrontierEntry>) {
        let mut frontier = frontier_for(strategy);
        for entry in seeds {
            let priority = self.unexplored_action_count(&entry.state);
            frontier.push(entry, priority);
        }

        while let Some(FrontierEntry { state, depth, context }) = frontier.next() {
            if !self.within_budgets() {
                info!(strategy = %strategy, "budgets exhausted, stopping");
                break;
            }
            if depth >= self.config.max_depth {
                continue;
            }

            let discovered = self.explore_from_state(&state, depth, &context).await;

            match strategy {
                Strategy::Dfs => {
                    // Reversed push keeps expansion left-to-right.
                    for found in discovered.iter().rev() {
                        if found.newly_visited {
                            frontier.push(
                                FrontierEntry::new(
                                    found.state.clone(),
                                    depth + 1,
                                    found.context.clone(),
                                ),
                                0,
                            );
                        }
                    }
                }
                Strategy::Greedy => {
                    for found in &discovered {
                        if found.newly_visited {
                            let priority = self.unexplored_action_count(&found.state);
                            frontier.push(
                                FrontierEntry::new(
                                    found.state.clone(),
                                    depth + 1,
                                    found.context.clone(),
                                ),
                                priority,
                            );
                        }
                    }
                }
                _ => {
                    // BFS: enqueue new states; re-enqueue visited ones that
                    // still have untried actions.
                    for found in &discovered {
                        if found.newly_visited || self.has_unexplored_action(&found.state) {
                            frontier.push(
                                FrontierEntry::new(
                                    found.state.clone(),
                                    depth + 1,
                                    found.context.clone(),
                                ),
                                0,
                            );
                        }
                    }
                }
            }
        }
    }

    // Random walk: capped iterations, uniform choice among untried
    // actions, reset to a random visited state when stuck.
    async fn run_random(&mut self, initial_state: State, initial_context: ExplorationContext) {
        let mut rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_iterations = self.config.max_states.saturating_mul(2);

        let mut current = initial_state.clone();
        let mut context = initial_context.clone();
        let mut depth: u32 = 0;

        for _ in 0..max_iterations {
            if !self.within_budgets() {
                break;
            }
            if depth >= self.config.max_depth {
                current = initial_state.clone();
                context = initial_context.clone();
                depth = 0;
                continue;
            }

            let untried: Vec<Action> = current
                .available_actions
                .iter()
                .filter(|a| self.should_explore_action(a))
                .filter(|a| !self.transition_attempted(&current.id, a))
                .cloned()
                .collect();

            if untried.is_empty() {
                // Nothing left here; jump somewhere already visited.
                let ids: Vec<&StateId> = self.graph.states.keys().collect();
                if ids.is_empty() {
                    break;
                }
                let id = ids[rng.gen_range(0..ids.len())].clone();
                current = self.graph.states[&id].clone();
                context = self.state_contexts.get(&id).cloned().unwrap_or_default();
                depth = 0;
                continue;
            }

            let action = untried[rng.gen_range(0..untried.len())].clone();
            match self.execute_action(&action, &current, &context).await {
                Some(found) => {
                    for new_action in &found.state.available_actions {
                        self.discovered_actions.insert(new_action.clone());
                    }
                    current = found.state;
                    context = found.context;
                    depth += 1;
                }
                None => continue,
            }
        }
    }

    // ── expansion ───────────────────────────────────────────────────

    /// Execute every admissible, untried action of `state` and return
    /// the discoveries. Budgets are re-checked before and after each
    /// action.
    pub async fn explore_from_state(
        &mut self,
        state: &State,
        depth: u32,
        context: &ExplorationContext,
    ) -> Vec<DiscoveredTransition> {
        let mut discovered = Vec::new();

        if depth >= self.config.max_depth {
            debug!(state = %state.id, depth, "max depth reached");
            return discovered;
        }
        if !self.within_budgets() {
            return discovered;
        }
        self.current_depth = self.current_depth.max(depth);

        // Sibling actions see what earlier siblings extracted, so a
        // create-then-read pair on the same state actually chains.
        let mut cursor = context.branch();

        for action in state.available_actions.clone() {
            if !self.should_explore_action(&action) {
                continue;
            }
            if self.transition_attempted(&state.id, &action) {
                continue;
            }

            if let Some(found) = self.execute_action(&action, state, &cursor).await {
                for new_action in &found.state.available_actions {
                    self.discovered_actions.insert(new_action.clone());
                }
                cursor = found.context.branch();
                discovered.push(found);
            }

            if !self.within_budgets() {
                break;
            }
        }

        discovered
    }

    /// Execute one action from `from_state`: substitute placeholders,
    /// call the executor, extract context, detect (or synthesize) the
    /// destination state, and record the transition.
    ///
    /// Returns `None` only when placeholder substitution fails; the
    /// action then lands in the skipped set and nothing is recorded.
    pub async fn execute_action(
        &mut self,
        action: &Action,
        from_state: &State,
        context: &ExplorationContext,
    ) -> Option<DiscoveredTransition> {
        let concrete = if action.endpoint_has_placeholders() {
            match substitute_path_params(&action.endpoint, context) {
                Some(endpoint) => action.with_endpoint(endpoint),
                None => {
                    debug!(action = %action, "context cannot resolve placeholders, skipping");
                    self.skipped_actions.insert(action.clone());
                    return None;
                }
            }
        } else {
            action.clone()
        };

        let started = Instant::now();
        let mut status_code: Option<u16> = None;
        let mut response_body: Option<Value> = None;
        let mut success = true;
        let mut error: Option<String> = None;

        match self.executor.execute(&concrete).await {
            Ok(response) => {
                status_code = Some(response.status_code);
                if response.is_error() {
                    success = false;
                    error = Some(format!("HTTP {}", response.status_code));
                    let severity = if response.status_code >= 500 {
                        IssueSeverity::High
                    } else {
                        IssueSeverity::Medium
                    };
                    self.record_issue(
                        severity,
                        format!("Action {concrete} returned {}", response.status_code),
                        Some(from_state.id.clone()),
                        Some(concrete.clone()),
                        Some("Check if the endpoint requires authentication or different parameters"),
                        Some("http"),
                        Some(response.body.clone()),
                    );
                }
                response_body = Some(response.body);
            }
            Err(ExecutorError::Timeout(after)) => {
                success = false;
                error = Some(format!("timed out after {after:?}"));
                self.record_issue(
                    IssueSeverity::Medium,
                    format!("Timeout executing {concrete}"),
                    Some(from_state.id.clone()),
                    Some(concrete.clone()),
                    Some("Consider increasing request timeout"),
                    Some("timeout"),
                    None,
                );
            }
            Err(ExecutorError::Transport(message)) => {
                success = false;
                error = Some(message.clone());
                warn!(action = %concrete, %message, "executor failure");
                self.record_issue(
                    IssueSeverity::High,
                    format!("Failed to execute {concrete}: {message}"),
                    Some(from_state.id.clone()),
                    Some(concrete.clone()),
                    None,
                    Some("executor"),
                    None,
                );
            }
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let body = response_body.clone().unwrap_or_else(|| Value::Object(Default::default()));

        // Extraction reads the template endpoint so placeholder segments
        // drop out of key inference.
        let mut branch_context = context.branch();
        extract_context(&body, &action.endpoint, &mut branch_context);

        let mut result_state = self
            .detector
            .as_mut()
            .and_then(|detector| detector.detect(&body, Some(&action.endpoint), status_code))
            .unwrap_or_else(|| fallback_state(&concrete, &body, status_code, success));

        let newly_visited = !self.visited_states.contains(&result_state.id);
        if newly_visited {
            if !branch_context.is_empty() {
                result_state.name = generate_state_name(&branch_context, &body);
            }
            result_state
                .properties
                .entry("success".to_string())
                .or_insert(ScalarValue::Bool(success));
            result_state.metadata.context = branch_context.snapshot();
            self.graph.add_state(result_state.clone());
            self.visited_states.insert(result_state.id.clone());
            self.state_contexts
                .insert(result_state.id.clone(), branch_context.clone());
        }

        let transition = Transition {
            from_state: from_state.id.clone(),
            action: concrete,
            to_state: result_state.id.clone(),
            response: response_body,
            status_code,
            duration_ms,
            success,
            error,
            discovered_at: Utc::now(),
        };
        self.graph.add_transition(transition.clone());
        self.visited_transitions.insert((
            from_state.id.clone(),
            action.transition_label(),
            result_state.id.clone(),
        ));
        self.executed_actions.insert(action.clone());

        Some(DiscoveredTransition {
            state: result_state,
            transition,
            context: branch_context,
            newly_visited,
        })
    }

    // ── admission and budgets ───────────────────────────────────────

    // Engine-level admission uses cheap substring/prefix checks; the
    // parser already applied the regex filters.
    fn should_explore_action(&self, action: &Action) -> bool {
        let endpoint = &action.endpoint;
        for pattern in &self.config.exclude_patterns {
            if endpoint.contains(pattern.as_str()) || endpoint.starts_with(pattern.as_str()) {
                return false;
            }
        }
        if self.config.include_patterns.is_empty() {
            return true;
        }
        self.config
            .include_patterns
            .iter()
            .any(|p| endpoint.contains(p.as_str()) || endpoint.starts_with(p.as_str()))
    }

    fn transition_attempted(&self, from: &StateId, action: &Action) -> bool {
        let label = action.transition_label();
        self.visited_transitions
            .iter()
            .any(|(f, l, _)| f == from && *l == label)
    }

    fn has_unexplored_action(&self, state: &State) -> bool {
        state
            .available_actions
            .iter()
            .any(|a| !self.transition_attempted(&state.id, a))
    }

    // Visited states that still have untried actions, paired with their
    // first-seen contexts, for reseeding a follow-up phase.
    fn unexhausted_seeds(&self) -> Vec<FrontierEntry> {
        self.graph
            .states
            .values()
            .filter(|state| self.has_unexplored_action(state))
            .map(|state| {
                let context = self
                    .state_contexts
                    .get(&state.id)
                    .cloned()
                    .unwrap_or_default();
                FrontierEntry::new(state.clone(), 0, context)
            })
            .collect()
    }

    fn unexplored_action_count(&self, state: &State) -> usize {
        state
            .available_actions
            .iter()
            .filter(|a| !self.transition_attempted(&state.id, a))
            .count()
    }

    fn within_budgets(&self) -> bool {
        if self.visited_states.len() >= self.config.max_states {
            return false;
        }
        if self.visited_transitions.len() >= self.config.max_transitions {
            return false;
        }
        if self.current_depth >= self.config.max_depth {
            return false;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn record_issue(
        &mut self,
        severity: IssueSeverity,
        error: String,
        state: Option<StateId>,
        action: Option<Action>,
        suggestion: Option<&str>,
        category: Option<&str>,
        response_data: Option<Value>,
    ) {
        self.issues.push(Issue {
            severity,
            state,
            action,
            error,
            suggestion: suggestion.map(String::from),
            category: category.map(String::from),
            response_data,
            discovered_at: Utc::now(),
        });
    }

    // ── results ─────────────────────────────────────────────────────

    /// Graph well-formedness: every transition endpoint must be a known
    /// state. Violations abort the run.
    fn verify_graph(&self) -> Result<(), EngineError> {
        for transition in &self.graph.transitions {
            for endpoint in [&transition.from_state, &transition.to_state] {
                if !self.graph.states.contains_key(endpoint) {
                    return Err(EngineError::InvariantViolation(format!(
                        "transition references unknown state {endpoint}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Coverage accounting over the run's own bookkeeping.
    #[must_use]
    pub fn coverage_report(&self) -> CoverageReport {
        let endpoints_discovered: BTreeSet<&str> = self
            .discovered_actions
            .iter()
            .map(|a| a.endpoint.as_str())
            .collect();
        let endpoints_tested: BTreeSet<&str> = self
            .executed_actions
            .iter()
            .map(|a| a.endpoint.as_str())
            .collect();

        let coverage_percent = if endpoints_discovered.is_empty() {
            0.0
        } else {
            (endpoints_tested.len() as f64 * 100.0 / endpoints_discovered.len() as f64).min(100.0)
        };

        let mut uncovered_actions: Vec<Action> = self
            .discovered_actions
            .iter()
            .filter(|a| !self.executed_actions.contains(*a))
            .cloned()
            .collect();
        uncovered_actions.sort_by_key(Action::transition_label);

        let mut state_breakdown: BTreeMap<String, usize> = BTreeMap::new();
        for state in self.graph.states.values() {
            // An absent outcome is not a success.
            let successful = state
                .properties
                .get("success")
                .is_some_and(ScalarValue::is_truthy);
            let bucket = if successful { "success" } else { "error" };
            *state_breakdown.entry(bucket.to_string()).or_insert(0) += 1;
        }

        let mut transition_breakdown: BTreeMap<String, usize> = BTreeMap::new();
        for transition in &self.graph.transitions {
            let bucket = if transition.success { "success" } else { "failed" };
            *transition_breakdown.entry(bucket.to_string()).or_insert(0) += 1;
        }

        CoverageReport {
            states_found: self.visited_states.len(),
            transitions_found: self.visited_transitions.len(),
            endpoints_discovered: endpoints_discovered.len(),
            endpoints_tested: endpoints_tested.len(),
            coverage_percent,
            uncovered_actions,
            state_breakdown,
            transition_breakdown,
        }
    }

    /// The graph built so far.
    #[must_use]
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// Issues recorded so far.
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Actions dropped because their placeholders never resolved.
    pub fn skipped_actions(&self) -> impl Iterator<Item = &Action> {
        self.skipped_actions.iter()
    }

    /// The first-seen branch context of a state.
    #[must_use]
    pub fn context_for(&self, state_id: &str) -> Option<&ExplorationContext> {
        self.state_contexts.get(state_id)
    }

    /// Clear all run state for a fresh exploration.
    pub fn reset(&mut self) {
        self.graph = StateGraph::new();
        self.issues.clear();
        self.visited_states.clear();
        self.visited_transitions.clear();
        self.discovered_actions.clear();
        self.executed_actions.clear();
        self.skipped_actions.clear();
        self.state_contexts.clear();
        self.current_depth = 0;
        self.deadline = None;
    }
}

// Synthesize a state when no detector is installed or it declined: an
// error id for failures, a keys-hash id for successes, with available
// actions seeded from HATEOAS links in the response.
fn fallback_state(
    action: &Action,
    body: &Value,
    status_code: Option<u16>,
    success: bool,
) -> State {
    let endpoint_tag = action.endpoint.replace('/', "_");

    let mut state = if !success {
        let code = status_code.map_or_else(|| "none".to_string(), |c| c.to_string());
        State::new(
            format!("error_{code}_{endpoint_tag}"),
            format!("Error State ({code})"),
        )
    } else {
        // Identity always carries the endpoint; a `type`/`state` string
        // only enriches the label.
        let mut keys: Vec<&str> = body
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        let digest = Sha256::digest(keys.join(",").as_bytes());
        let hash = format!("{digest:x}");
        let name = match body
            .get("type")
            .or_else(|| body.get("state"))
            .and_then(Value::as_str)
        {
            Some(kind) => format!("State: {kind}"),
            None => format!("State after {action}"),
        };
        State::new(format!("state_{endpoint_tag}_{}", &hash[..8]), name)
    };

    if let Some(code) = status_code {
        state
            .properties
            .insert("status_code".into(), i64::from(code).into());
    }
    state.properties.insert("success".into(), success.into());
    state
        .properties
        .insert("from_action".into(), action.to_string().into());
    state.available_actions = extract_link_actions(body);
    if let Some(object) = body.as_object() {
        state.metadata.response_keys = object.keys().cloned().collect();
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sx_core::HttpMethod;

    #[test]
    fn fallback_error_state_ids_carry_code_and_endpoint() {
        let action = Action::new(HttpMethod::Delete, "/todos/7");
        let state = fallback_state(&action, &json!({}), Some(404), false);
        assert_eq!(state.id, "error_404__todos_7");
        assert_eq!(state.name, "Error State (404)");
        assert_eq!(state.properties.get("success"), Some(&false.into()));
    }

    #[test]
    fn fallback_success_state_uses_endpoint_and_keys_hash() {
        let action = Action::new(HttpMethod::Get, "/orders/1");
        let typed = fallback_state(&action, &json!({"type": "order"}), Some(200), true);
        // The type labels the state but never replaces the identity.
        assert_eq!(typed.name, "State: order");
        assert!(typed.id.starts_with("state__orders_1_"));

        let elsewhere = fallback_state(
            &Action::new(HttpMethod::Get, "/carts/2"),
            &json!({"type": "order"}),
            Some(200),
            true,
        );
        assert_ne!(typed.id, elsewhere.id);

        let hashed_a = fallback_state(&action, &json!({"a": 1, "b": 2}), Some(200), true);
        let hashed_b = fallback_state(&action, &json!({"b": 9, "a": 0}), Some(200), true);
        // Same key set, same id; values do not matter for the fallback.
        assert_eq!(hashed_a.id, hashed_b.id);
        assert!(hashed_a.id.starts_with("state__orders_1_"));
    }

    #[test]
    fn fallback_state_seeds_actions_from_links() {
        let action = Action::new(HttpMethod::Get, "/a");
        let body = json!({"_links": {"self": {"href": "/a"}, "next": {"href": "/b"}}});
        let state = fallback_state(&action, &body, Some(200), true);
        assert_eq!(state.available_actions.len(), 1);
        assert_eq!(state.available_actions[0].endpoint, "/b");
    }
}
