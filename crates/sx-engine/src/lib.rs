// SPDX-License-Identifier: MIT OR Apache-2.0
//! sx-engine
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The graph-building exploration engine.
//!
//! An [`ExplorationEngine`](engine::ExplorationEngine) drives an injected
//! executor over a frontier of `(state, depth, context)` entries,
//! records every transition into a [`sx_core::StateGraph`], and enforces
//! the four budgets (states, transitions, depth, wall time).
//! [`StateExplorer`](explorer::StateExplorer) is the orchestrator tying
//! the spec parser, detector, executor, and engine together.

/// The exploration engine proper.
pub mod engine;
/// The high-level orchestrator.
pub mod explorer;
/// Frontier implementations behind the strategy choice.
pub mod strategy;

pub use engine::{DiscoveredTransition, ExplorationEngine};
pub use explorer::StateExplorer;
pub use strategy::Strategy;

use serde_json::Value;
use sx_core::State;
use thiserror::Error;

/// Fatal engine failures. Per-action failures never surface here; they
/// become issues on the result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The run produced an internally inconsistent graph and was aborted.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Turns a response into a state. Implemented by
/// [`sx_detect::StateDetector`]; returning `None` makes the engine
/// synthesize a fallback state from the raw response.
pub trait ResponseDetector: Send {
    /// Detect the state represented by `response`.
    fn detect(
        &mut self,
        response: &Value,
        endpoint: Option<&str>,
        status_code: Option<u16>,
    ) -> Option<State>;
}

impl ResponseDetector for sx_detect::StateDetector {
    fn detect(
        &mut self,
        response: &Value,
        endpoint: Option<&str>,
        status_code: Option<u16>,
    ) -> Option<State> {
        let method = None;
        let _ = status_code;
        Some(self.detect_state(response, endpoint, method))
    }
}
