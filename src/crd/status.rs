//! # Token Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the Token resource
///
/// Written once at the end of every reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    /// Current phase of reconciliation
    /// Values: Ready, Failed
    #[serde(default)]
    pub phase: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Instant at which the issued token becomes due for rotation (RFC3339)
    #[serde(default)]
    pub next_refresh_time: Option<String>,
    /// Last time the token was re-issued by proactive rotation (RFC3339)
    #[serde(default)]
    pub last_rotation_time: Option<String>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl TokenStatus {
    /// The `Ready` condition, if any
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == "Ready")
    }
}
