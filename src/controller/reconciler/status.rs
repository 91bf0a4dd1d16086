//! # Status Reporter
//!
//! Writes the outcome of a reconciliation attempt to the `Token` status.
//!
//! Exactly one write is attempted per attempt, after the pipeline, whether it
//! failed or not. A `Token` that disappeared in the meantime is not an error.
//!
//! The status patch is skipped when only `lastReconcileTime` would change, so a
//! steady token does not emit a watch event (and another reconcile) per attempt.

use crate::controller::reconciler::errors::TokenError;
use crate::crd::{Condition, Token, TokenStatus};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::debug;

pub const PHASE_READY: &str = "Ready";
pub const PHASE_FAILED: &str = "Failed";
pub const REASON_SUCCEEDED: &str = "ReconciliationSucceeded";
pub const REASON_FAILED: &str = "ReconciliationFailed";

/// Observed result of one reconciliation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Failure message of the pipeline, `None` on success
    pub failure: Option<String>,
    pub observed_at: DateTime<Utc>,
    /// Refresh threshold of the current token, when known
    pub next_refresh: Option<DateTime<Utc>>,
    /// Set when this attempt re-issued the token
    pub rotated_at: Option<DateTime<Utc>>,
}

impl StatusReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Writes [`StatusReport`]s
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// # Errors
    ///
    /// [`TokenError::StatusWrite`] when the status subresource cannot be patched.
    async fn report(&self, token: &Token, report: &StatusReport) -> Result<(), TokenError>;
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compute the new status from the previous one and a report
///
/// `lastTransitionTime` of the `Ready` condition only moves when its status flips.
/// `nextRefreshTime` and `lastRotationTime` keep their previous values when the
/// report does not carry new ones.
#[must_use]
pub fn build_status(
    previous: Option<&TokenStatus>,
    generation: Option<i64>,
    report: &StatusReport,
) -> TokenStatus {
    let (phase, ready, reason) = if report.is_success() {
        (PHASE_READY, "True", REASON_SUCCEEDED)
    } else {
        (PHASE_FAILED, "False", REASON_FAILED)
    };

    let previous_ready = previous.and_then(TokenStatus::ready_condition);
    let last_transition_time = match previous_ready {
        Some(c) if c.status == ready => c.last_transition_time.clone(),
        _ => Some(rfc3339(report.observed_at)),
    };

    let message = report
        .failure
        .clone()
        .unwrap_or_else(|| "Token secret is up to date".to_string());

    TokenStatus {
        phase: Some(phase.to_string()),
        conditions: vec![Condition {
            r#type: "Ready".to_string(),
            status: ready.to_string(),
            last_transition_time,
            reason: Some(reason.to_string()),
            message: Some(message),
        }],
        observed_generation: generation,
        last_reconcile_time: Some(rfc3339(report.observed_at)),
        next_refresh_time: report
            .next_refresh
            .map(rfc3339)
            .or_else(|| previous.and_then(|s| s.next_refresh_time.clone())),
        last_rotation_time: report
            .rotated_at
            .map(rfc3339)
            .or_else(|| previous.and_then(|s| s.last_rotation_time.clone())),
    }
}

/// Whether `next` differs from `previous` in anything but `lastReconcileTime`
#[must_use]
pub fn status_needs_write(previous: Option<&TokenStatus>, next: &TokenStatus) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let previous = TokenStatus {
        last_reconcile_time: None,
        ..previous.clone()
    };
    let next = TokenStatus {
        last_reconcile_time: None,
        ..next.clone()
    };
    previous != next
}

/// [`StatusReporter`] that merge-patches the status subresource
#[derive(Clone)]
pub struct KubeStatusReporter {
    client: Client,
}

impl std::fmt::Debug for KubeStatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStatusReporter").finish_non_exhaustive()
    }
}

impl KubeStatusReporter {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusReporter for KubeStatusReporter {
    async fn report(&self, token: &Token, report: &StatusReport) -> Result<(), TokenError> {
        let namespace = token.namespace_or_default();
        let name = token.name_or_unknown();
        let api: Api<Token> = Api::namespaced(self.client.clone(), namespace);

        let status = build_status(token.status.as_ref(), token.metadata.generation, report);
        if !status_needs_write(token.status.as_ref(), &status) {
            debug!(
                "Status of Token {}/{} is unchanged, skipping update",
                namespace, name
            );
            return Ok(());
        }
        let patch = serde_json::json!({ "status": status });

        match api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(
                    "Token {}/{} was deleted during reconciliation, skipping status update",
                    namespace, name
                );
                Ok(())
            }
            Err(e) => Err(TokenError::StatusWrite {
                source: Box::new(e),
            }),
        }
    }
}
