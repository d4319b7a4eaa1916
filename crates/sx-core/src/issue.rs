// SPDX-License-Identifier: MIT OR Apache-2.0
//! Issues discovered during exploration.

use crate::{Action, StateId};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Severity of a discovered issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Informational finding.
    Info,
    /// Minor problem.
    Low,
    /// Client-side failure (4xx) or timeout.
    Medium,
    /// Server-side failure (5xx) or executor crash.
    High,
    /// Must-fix finding.
    Critical,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueSeverity::Info => "info",
            IssueSeverity::Low => "low",
            IssueSeverity::Medium => "medium",
            IssueSeverity::High => "high",
            IssueSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A problem observed while exploring: a failing action, a timeout, or an
/// anomaly worth a human look.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    /// How bad it is.
    pub severity: IssueSeverity,
    /// State in which the issue occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateId>,
    /// Action that triggered the issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// What went wrong.
    pub error: String,
    /// Suggested fix or investigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Issue category (`http`, `timeout`, `executor`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Response payload relevant for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
    /// When the issue was recorded.
    pub discovered_at: DateTime<Utc>,
}
