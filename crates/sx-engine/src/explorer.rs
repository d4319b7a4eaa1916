// SPDX-License-Identifier: MIT OR Apache-2.0
//! The high-level orchestrator: parser, detector, engine, executor.

use crate::engine::ExplorationEngine;
use crate::strategy::Strategy;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use sx_core::{
    Action, CoverageReport, ExplorationConfig, ExplorationResult, Issue, State, StateGraph,
};
use sx_detect::StateDetector;
use sx_executor::{ActionExecutor, ExecutorError, HttpExecutor};
use sx_spec::{SpecError, SpecInput, SpecParser};
use tracing::info;

/// Coordinates one exploration workflow: endpoint discovery, state
/// detection, traversal, and result assembly.
///
/// # Examples
///
/// ```no_run
/// use sx_core::ExplorationConfig;
/// use sx_engine::{StateExplorer, Strategy};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut explorer = StateExplorer::new(
///     "http://localhost:8080",
///     ExplorationConfig::default(),
///     Strategy::Bfs,
/// )?;
/// let result = explorer.explore_spec(std::path::Path::new("openapi.yaml")).await?;
/// println!(
///     "{} states, {:.1}% coverage",
///     result.coverage.states_found, result.coverage.coverage_percent
/// );
/// # Ok(())
/// # }
/// ```
pub struct StateExplorer {
    base_url: String,
    config: ExplorationConfig,
    engine: ExplorationEngine,
    state_key_fields: Vec<String>,
    initial_state: Option<State>,
    result: Option<ExplorationResult>,
}

impl StateExplorer {
    /// An explorer over the built-in HTTP executor.
    pub fn new(
        base_url: impl Into<String>,
        config: ExplorationConfig,
        strategy: Strategy,
    ) -> Result<Self, ExecutorError> {
        let base_url = base_url.into();
        let executor = Arc::new(HttpExecutor::new(base_url.as_str(), &config)?);
        Ok(Self::with_executor(base_url, config, strategy, executor))
    }

    /// An explorer over an injected executor (tests, replay, recording).
    #[must_use]
    pub fn with_executor(
        base_url: impl Into<String>,
        config: ExplorationConfig,
        strategy: Strategy,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let engine = ExplorationEngine::new(config.clone(), strategy, executor);
        StateExplorer {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config,
            engine,
            state_key_fields: Vec::new(),
            initial_state: None,
            result: None,
        }
    }

    /// Add a response field that participates in state identity.
    pub fn add_state_key_field(&mut self, field: impl Into<String>) {
        self.state_key_fields.push(field.into());
    }

    /// Start exploration from this state instead of the default
    /// `Initial` state.
    pub fn set_initial_state(&mut self, state: State) {
        self.initial_state = Some(state);
    }

    /// Change the traversal strategy for subsequent runs.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.engine.set_strategy(strategy);
    }

    /// Parse a spec document and explore its endpoints.
    ///
    /// Only spec-level failures (unreadable input, missing version
    /// field, invalid filter pattern) surface as errors; everything that
    /// goes wrong during traversal lands in the result's issues.
    pub async fn explore_spec(
        &mut self,
        input: impl Into<SpecInput>,
    ) -> Result<ExplorationResult, SpecError> {
        let mut parser =
            SpecParser::new(&self.config)?.with_base_url(self.base_url.clone());
        let actions = parser.parse(input)?;
        info!(actions = actions.len(), "spec parsed into seed actions");
        Ok(self.explore(Some(actions)).await)
    }

    /// Run the full exploration and assemble the result. Never fails:
    /// fatal engine errors are captured on the result with
    /// `success = false`.
    pub async fn explore(&mut self, initial_actions: Option<Vec<Action>>) -> ExplorationResult {
        let started_at = Utc::now();
        let timer = Instant::now();

        let mut detector = StateDetector::new();
        for field in &self.state_key_fields {
            detector.add_state_key_field(field.clone());
        }
        self.engine.set_detector(detector);

        let initial_state = self.initial_state.clone().unwrap_or_else(|| {
            let mut state = State::new("initial", "Initial");
            state.properties.insert(
                "authenticated".into(),
                self.config.auth_token.is_some().into(),
            );
            state
        });

        let (error, success) = match self.engine.explore(initial_state, initial_actions).await {
            Ok(_) => (None, true),
            Err(e) => (Some(e.to_string()), false),
        };

        let finished_at = Utc::now();
        let result = ExplorationResult {
            graph: self.engine.graph().clone(),
            issues: self.engine.issues().to_vec(),
            coverage: self.engine.coverage_report(),
            started_at,
            finished_at,
            duration: timer.elapsed(),
            config: self.config.clone(),
            error,
            success,
        };
        self.result = Some(result.clone());
        result
    }

    /// The latest result, if any run has completed.
    #[must_use]
    pub fn result(&self) -> Option<&ExplorationResult> {
        self.result.as_ref()
    }

    /// The latest run's graph.
    #[must_use]
    pub fn graph(&self) -> Option<&StateGraph> {
        self.result.as_ref().map(|r| &r.graph)
    }

    /// The latest run's issues.
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        self.result.as_ref().map_or(&[], |r| r.issues.as_slice())
    }

    /// The latest run's coverage.
    #[must_use]
    pub fn coverage(&self) -> Option<&CoverageReport> {
        self.result.as_ref().map(|r| &r.coverage)
    }

    /// Forget the previous run entirely.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.initial_state = None;
        self.result = None;
    }
}
