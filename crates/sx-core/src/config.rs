// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration for an exploration run, with validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Budgets, filters, and transport options for one `explore` call.
///
/// All limits are hard: exploration terminates as soon as any of the
/// state / transition / depth / wall-clock budgets trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Terminate branches beyond this depth.
    pub max_depth: u32,
    /// Terminate when this many distinct states have been visited.
    pub max_states: usize,
    /// Terminate when this many distinct transitions have been recorded.
    pub max_transitions: usize,
    /// Hard wall-clock budget for the entire exploration.
    #[serde(rename = "timeout_seconds", with = "duration_secs")]
    pub timeout: Duration,
    /// Per-request ceiling enforced by the executor.
    #[serde(rename = "request_timeout_seconds", with = "duration_secs")]
    pub request_timeout: Duration,
    /// Regexes an endpoint must match (at least one) to be explored.
    /// Empty means no constraint.
    pub include_patterns: Vec<String>,
    /// Regexes that remove an endpoint unconditionally.
    pub exclude_patterns: Vec<String>,
    /// Bearer token added as `Authorization: Bearer <token>` by the
    /// built-in executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Extra request headers merged into every call.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Passed through to the HTTP client.
    pub follow_redirects: bool,
    /// Passed through to the HTTP client.
    pub verify_ssl: bool,
    /// Seed for the random-walk strategy; `None` draws from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        ExplorationConfig {
            max_depth: 10,
            max_states: 100,
            max_transitions: 500,
            timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            auth_token: None,
            headers: BTreeMap::new(),
            follow_redirects: true,
            verify_ssl: true,
            random_seed: None,
        }
    }
}

/// Serde helper — `Duration` as integer seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_secs().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let secs: u64 = u64::deserialize(de)?;
        Ok(Duration::from_secs(secs))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Severity level for a configuration warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    /// Informational note.
    Info,
    /// Something likely unintended.
    Warning,
    /// Invalid configuration that will cause problems.
    Error,
}

/// A single configuration warning produced by
/// [`ExplorationConfig::validate`].
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// Field that triggered the warning (e.g. `"max_depth"`).
    pub field: String,
    /// Human-readable description of the issue.
    pub message: String,
    /// How severe this issue is.
    pub severity: WarningSeverity,
}

impl ExplorationConfig {
    /// Validate the configuration and return all detected warnings.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.max_depth == 0 {
            warnings.push(error("max_depth", "max_depth must be greater than 0"));
        }
        if self.max_states == 0 {
            warnings.push(error("max_states", "max_states must be greater than 0"));
        }
        if self.max_transitions == 0 {
            warnings.push(error(
                "max_transitions",
                "max_transitions must be greater than 0",
            ));
        }
        if self.timeout.is_zero() {
            warnings.push(error("timeout_seconds", "overall timeout must be non-zero"));
        }
        if self.request_timeout.is_zero() {
            warnings.push(error(
                "request_timeout_seconds",
                "per-request timeout must be non-zero",
            ));
        }
        if self.request_timeout > self.timeout {
            warnings.push(ConfigWarning {
                field: "request_timeout_seconds".into(),
                message: "per-request timeout exceeds the overall budget".into(),
                severity: WarningSeverity::Warning,
            });
        }

        for (field, patterns) in [
            ("include_patterns", &self.include_patterns),
            ("exclude_patterns", &self.exclude_patterns),
        ] {
            for pattern in patterns {
                if pattern.trim().is_empty() {
                    warnings.push(ConfigWarning {
                        field: field.into(),
                        message: "empty pattern matches every endpoint".into(),
                        severity: WarningSeverity::Warning,
                    });
                } else if let Err(err) = Regex::new(pattern) {
                    warnings.push(error(field, format!("invalid regex `{pattern}`: {err}")));
                }
            }
        }

        warnings
    }
}

fn error(field: &str, message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        field: field.into(),
        message: message.into(),
        severity: WarningSeverity::Error,
    }
}
