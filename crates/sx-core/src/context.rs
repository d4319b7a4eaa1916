// SPDX-License-Identifier: MIT OR Apache-2.0
//! The id/token bag accumulated along one exploration branch.

use crate::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Insertion-tracked mapping of normalized keys to scalar values.
///
/// Two views are maintained: [`data`](ExplorationContext::data) holds
/// everything known on this branch, while
/// [`extracted_keys`](ExplorationContext::extracted_keys) holds only what
/// the most recent extraction pass added. [`branch`](ExplorationContext::branch)
/// duplicates the data but clears the extraction tracking, so each child
/// branch observes its own additions.
///
/// # Examples
///
/// ```
/// use sx_core::ExplorationContext;
///
/// let mut ctx = ExplorationContext::new();
/// ctx.insert("todo_id", 42i64.into());
///
/// let mut child = ctx.branch();
/// child.insert("attachment_id", "abc-123".into());
///
/// assert!(ctx.contains("todo_id"));
/// assert!(!ctx.contains("attachment_id"));
/// assert_eq!(child.extracted_keys().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorationContext {
    data: BTreeMap<String, ScalarValue>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    extracted: BTreeSet<String>,
}

impl ExplorationContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`, recording it as freshly extracted.
    pub fn insert(&mut self, key: impl Into<String>, value: ScalarValue) {
        let key = key.into();
        self.extracted.insert(key.clone());
        self.data.insert(key, value);
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.data.get(key)
    }

    /// Whether a binding exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// All bound keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Keys added since this context was created or branched.
    pub fn extracted_keys(&self) -> impl Iterator<Item = &str> {
        self.extracted.iter().map(String::as_str)
    }

    /// Duplicate the data for a child branch; the copy starts with empty
    /// extraction tracking.
    #[must_use]
    pub fn branch(&self) -> Self {
        ExplorationContext {
            data: self.data.clone(),
            extracted: BTreeSet::new(),
        }
    }

    /// Bind every entry of `other` into this context.
    pub fn merge(&mut self, other: impl IntoIterator<Item = (String, ScalarValue)>) {
        for (key, value) in other {
            self.insert(key, value);
        }
    }

    /// Read-only view of everything known.
    #[must_use]
    pub fn data(&self) -> &BTreeMap<String, ScalarValue> {
        &self.data
    }

    /// An owned snapshot of the data, for stamping into state metadata.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, ScalarValue> {
        self.data.clone()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bindings exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
