// SPDX-License-Identifier: MIT OR Apache-2.0
//! Coverage accounting and the final exploration result.

use crate::{Action, ExplorationConfig, Issue, IssueSeverity, StateGraph};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How much of the discovered surface was actually exercised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageReport {
    /// Distinct states visited.
    pub states_found: usize,
    /// Distinct transitions recorded.
    pub transitions_found: usize,
    /// Unique endpoints across every discovered action.
    pub endpoints_discovered: usize,
    /// Unique endpoints across executed actions.
    pub endpoints_tested: usize,
    /// `100 · tested / discovered`, clamped to `[0, 100]`.
    pub coverage_percent: f64,
    /// Discovered actions that were never executed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncovered_actions: Vec<Action>,
    /// States bucketed by outcome category.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_breakdown: BTreeMap<String, usize>,
    /// Transitions bucketed by outcome.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transition_breakdown: BTreeMap<String, usize>,
}

/// The single externally visible output of an exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationResult {
    /// The discovered state graph.
    pub graph: StateGraph,
    /// Everything that went wrong along the way.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    /// Coverage metrics computed at termination.
    pub coverage: CoverageReport,
    /// When exploration started.
    pub started_at: DateTime<Utc>,
    /// When exploration finished.
    pub finished_at: DateTime<Utc>,
    /// Total wall-clock duration.
    #[serde(rename = "duration_seconds", with = "duration_secs_f64")]
    pub duration: Duration,
    /// The configuration the run used.
    pub config: ExplorationConfig,
    /// Fatal error, if the run aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False only when a fatal error aborted the run. Budget expiry is a
    /// clean termination, not a failure.
    pub success: bool,
}

impl ExplorationResult {
    /// All critical-severity issues.
    #[must_use]
    pub fn critical_issues(&self) -> Vec<&Issue> {
        self.issues_with_severity(IssueSeverity::Critical)
    }

    /// Issues filtered by severity.
    #[must_use]
    pub fn issues_with_severity(&self, severity: IssueSeverity) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect()
    }

    /// Issue counts bucketed by severity.
    #[must_use]
    pub fn issue_breakdown(&self) -> BTreeMap<IssueSeverity, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }
}

/// Serde helper — `Duration` as fractional seconds.
mod duration_secs_f64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_secs_f64().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let secs: f64 = f64::deserialize(de)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
