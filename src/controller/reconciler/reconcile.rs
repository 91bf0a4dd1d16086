//! # Reconciliation Entry Point
//!
//! Glue between `kube_runtime::Controller` and [`Reconciler::sync`].
//!
//! On success the most recent requeue push for the token becomes the
//! controller's `Action`. Failures are left to the error policy, which applies
//! Fibonacci backoff regardless of what was pushed.

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::Token;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Reconcile one `Token`
///
/// # Errors
///
/// Returns [`ReconcilerError::Sync`] with every failure of the attempt.
pub async fn reconcile(token: Arc<Token>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let key = token.object_key();

    info!("Reconciling Token {}", key);
    observability::metrics::increment_reconciliations();

    let result = ctx.sync(&token).await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    result?;

    ctx.reset_backoff(&key);

    let action = match ctx.schedule().take(&key) {
        Some(entry) => {
            let after = entry.remaining();
            debug!("Next reconcile of {} in {}s", key, after.as_secs());
            Action::requeue(after)
        }
        None => Action::await_change(),
    };
    Ok(action)
}
