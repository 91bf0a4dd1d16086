//! # Error Policy
//!
//! Backoff for failed reconciliations and classification of watch stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError, RequeueTrigger};
use crate::crd::Token;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed token with per-resource Fibonacci backoff
///
/// The requeue schedule pushed during the failed attempt is ignored here.
pub fn handle_reconciliation_error(
    token: Arc<Token>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = token.object_key();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        token = %key,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    observability::metrics::increment_reconciliation_errors();

    let (backoff_seconds, error_count) = {
        let mut states = ctx
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.clone()).or_insert_with(|| {
            BackoffState::new(
                ctx.config.error_backoff_min_minutes,
                ctx.config.error_backoff_max_minutes,
            )
        });
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    };

    info!(
        "Retrying {} in {}s (error count: {})",
        key, backoff_seconds, error_count
    );

    observability::metrics::increment_requeues(RequeueTrigger::ErrorBackoff.as_str());
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// How the watch loop should treat a stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401: credentials or RBAC changed
    Unauthorized,
    /// 410: resource version too old, the watch re-lists
    Expired,
    /// 429 or storage re-initializing
    Throttled,
    /// 404: object or CRD missing
    NotFound,
    Other,
}

/// Classify a watch stream error by its debug rendering
///
/// 404 is checked before 401 because not-found errors can mention `WatchFailed`.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");

    if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Handle a watch stream error
///
/// Returns `true` to keep the stream item and `false` to drop it and let the
/// watch restart. May sleep before returning.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> bool {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!("Watch authentication failed (401 Unauthorized), RBAC may have been revoked");
            error!("   kubectl auth can-i list tokens.token-management.microscaler.io --all-namespaces --as=system:serviceaccount:<namespace>:token-controller");
            warn!(
                "Waiting {}s before retrying watch...",
                watch_restart_delay.as_secs()
            );
            tokio::time::sleep(watch_restart_delay).await;
            false
        }
        WatchErrorKind::Expired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
            false
        }
        WatchErrorKind::Throttled => {
            let current = backoff_ms.load(Ordering::Relaxed);
            warn!(
                "API server throttling or storage reinitializing (429), backing off for {}ms",
                current
            );
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            false
        }
        WatchErrorKind::NotFound => {
            warn!("Resource not found (404), it may have been deleted: {}", error_string);
            true
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(watch_restart_delay).await;
            false
        }
    }
}
