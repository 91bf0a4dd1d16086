//! # Token Sync
//!
//! One reconciliation attempt for a `Token`.
//!
//! ## Flow
//!
//! 1. Deleted tokens are left alone: no requeue push, no writes
//! 2. Compute the refresh threshold of the current token and push the next wake-up
//!    (the configured fallback when it cannot be computed)
//! 3. Run [`PIPELINE`] in order, stopping at the first failing step:
//!    - **Secret**: create the token secret when it does not exist
//!    - **Refresh**: re-issue the token once `lifetime / 5` before expiry
//! 4. Write the status, whatever the pipeline did, and merge its error with the
//!    pipeline's
//!
//! The entry computation treats an expired token as "cannot compute" while the
//! Refresh step treats it as "rotation due".

use crate::constants::REFRESH_MARGIN_DIVISOR;
use crate::controller::reconciler::errors::{
    finalize_always, AggregateError, StepError, SyncStep, TokenError,
};
use crate::controller::reconciler::schedule::clamp_to_zero;
use crate::controller::reconciler::status::StatusReport;
use crate::controller::reconciler::types::{Reconciler, RequeueTrigger};
use crate::controller::token::{build_token_secret, parse_expiration, TokenArtifact};
use crate::crd::Token;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// Ordered pipeline steps
pub const PIPELINE: [SyncStep; 2] = [SyncStep::Secret, SyncStep::Refresh];

/// Facts gathered during one attempt that end up in the status
#[derive(Debug, Default)]
struct SyncRun {
    next_refresh: Option<DateTime<Utc>>,
    rotated_at: Option<DateTime<Utc>>,
}

/// Instant at which a token expiring at `exp` becomes due for rotation
///
/// # Errors
///
/// Returns [`TokenError::InvalidSpec`] when the margin does not fit a `chrono::Duration`
/// or the threshold falls outside the representable range.
pub fn refresh_threshold(
    exp: DateTime<Utc>,
    lifetime: Duration,
) -> Result<DateTime<Utc>, TokenError> {
    let margin = chrono::Duration::from_std(lifetime / REFRESH_MARGIN_DIVISOR)
        .map_err(|e| TokenError::InvalidSpec(format!("lifetime out of range: {e}")))?;
    exp.checked_sub_signed(margin).ok_or_else(|| {
        TokenError::InvalidSpec(format!(
            "lifetime {}s is too large to compute a refresh threshold",
            lifetime.as_secs()
        ))
    })
}

impl Reconciler {
    /// Reconcile one token
    ///
    /// # Errors
    ///
    /// Returns every step failure of this attempt, including a failed status write.
    #[instrument(skip_all, fields(token = %token.object_key()))]
    pub async fn sync(&self, token: &Token) -> Result<(), AggregateError> {
        if token.is_deleting() {
            debug!("Token is being deleted, skipping");
            return Ok(());
        }

        let key = token.object_key();
        self.push_entry_schedule(token, &key).await;

        let mut run = SyncRun::default();
        let outcome = self.run_pipeline(token, &key, &mut run).await;

        let run = &run;
        let result = finalize_always(outcome, move |failure| {
            self.write_status(token, failure, run)
        })
        .await;

        if let Err(e) = &result {
            warn!("Token sync failed: {}", e);
        }
        result
    }

    async fn push_entry_schedule(&self, token: &Token, key: &str) {
        let threshold = match self.expiration_time(token).await {
            Ok(Some(exp)) => token
                .lifetime()
                .map_err(|e| TokenError::InvalidSpec(e.to_string()))
                .and_then(|lifetime| refresh_threshold(exp, lifetime))
                .map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match threshold {
            Ok(Some(threshold)) => {
                let after = clamp_to_zero(threshold - self.clock.now());
                self.push(key, after, RequeueTrigger::Expiration);
            }
            Ok(None) => {
                debug!("Token has no expiration, refresh is due now");
                self.push(key, Duration::ZERO, RequeueTrigger::Expiration);
            }
            Err(e) => {
                let fallback = self.config.expiration_fallback_requeue();
                info!(
                    "Could not compute token expiration ({}), requeue in {}s",
                    e,
                    fallback.as_secs()
                );
                self.push(key, fallback, RequeueTrigger::Fallback);
            }
        }
    }

    async fn run_pipeline(
        &self,
        token: &Token,
        key: &str,
        run: &mut SyncRun,
    ) -> Result<(), StepError> {
        for step in PIPELINE {
            let result = match step {
                SyncStep::Secret => self.sync_secret(token).await,
                SyncStep::Refresh => self.refresh(token, key, run).await,
                // Written by the finalizer after the pipeline
                SyncStep::Status => Ok(()),
            };

            if let Err(e) = result {
                metrics::increment_step_errors(step.as_str(), e.reason());
                return Err(StepError::new(step, e));
            }
        }
        Ok(())
    }

    /// Create the token secret when it does not exist yet
    async fn sync_secret(&self, token: &Token) -> Result<(), TokenError> {
        let artifact = self.build_artifact(token).await?;
        let outcome = self
            .cancellable(self.artifacts.upsert(&artifact, false))
            .await?;
        metrics::increment_artifact_upserts(outcome.as_str());
        debug!(
            "Secret {}/{}: {}",
            artifact.namespace(),
            artifact.name(),
            outcome.as_str()
        );
        Ok(())
    }

    /// Re-issue the token once its refresh threshold is reached
    async fn refresh(&self, token: &Token, key: &str, run: &mut SyncRun) -> Result<(), TokenError> {
        if !token.spec.refresh {
            debug!("Refresh disabled, skipping");
            return Ok(());
        }

        let exp = match self.expiration_time(token).await {
            Ok(exp) => exp,
            Err(e) if e.is_expired() => {
                info!("Token is expired, re-issuing: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let lifetime = token
            .lifetime()
            .map_err(|e| TokenError::InvalidSpec(e.to_string()))?;
        let now = self.clock.now();

        let threshold = match exp {
            Some(exp) => {
                let threshold = refresh_threshold(exp, lifetime)?;
                self.push(key, clamp_to_zero(threshold - now), RequeueTrigger::Expiration);
                run.next_refresh = Some(threshold);
                threshold
            }
            None => now,
        };

        if now < threshold {
            debug!("Refresh not due until {}", threshold.to_rfc3339());
            return Ok(());
        }

        let artifact = self.build_artifact(token).await?;
        let outcome = self
            .cancellable(self.artifacts.upsert(&artifact, true))
            .await?;
        metrics::increment_artifact_upserts(outcome.as_str());
        metrics::increment_rotations();

        let next = refresh_threshold(artifact.expires_at, lifetime)?;
        self.push(key, clamp_to_zero(next - now), RequeueTrigger::Rotation);
        run.next_refresh = Some(next);
        run.rotated_at = Some(now);

        info!(
            "Re-issued token in secret {}/{}, next refresh at {}",
            artifact.namespace(),
            artifact.name(),
            next.to_rfc3339()
        );
        Ok(())
    }

    /// Expiration of the token currently stored in the token secret
    async fn expiration_time(&self, token: &Token) -> Result<Option<DateTime<Utc>>, TokenError> {
        let raw = self
            .cancellable(
                self.resolver
                    .resolve(token.namespace_or_default(), &token.secret_ref()),
            )
            .await?;
        let signing_key = self.signing_key(token).await?;
        Ok(parse_expiration(&raw, &signing_key, self.clock.now())?)
    }

    async fn signing_key(&self, token: &Token) -> Result<Zeroizing<Vec<u8>>, TokenError> {
        let (key_ref, namespace) = token.signing_key_ref();
        self.cancellable(self.resolver.resolve(&namespace, &key_ref))
            .await
    }

    async fn build_artifact(&self, token: &Token) -> Result<TokenArtifact, TokenError> {
        let signing_key = self.signing_key(token).await?;
        build_token_secret(token, &signing_key, self.clock.now())
    }

    async fn write_status(
        &self,
        token: &Token,
        failure: Option<String>,
        run: &SyncRun,
    ) -> Result<(), TokenError> {
        let report = StatusReport {
            failure,
            observed_at: self.clock.now(),
            next_refresh: run.next_refresh,
            rotated_at: run.rotated_at,
        };
        let result = self.cancellable(self.status.report(token, &report)).await;
        if result.is_err() {
            metrics::increment_status_write_errors();
        }
        result
    }

    fn push(&self, key: &str, after: Duration, trigger: RequeueTrigger) {
        debug!(
            "Requeue {} in {}s ({})",
            key,
            after.as_secs(),
            trigger.as_str()
        );
        metrics::increment_requeues(trigger.as_str());
        self.schedule.push(key, after);
    }

    /// Run `fut` unless shutdown is requested first
    async fn cancellable<T, F>(&self, fut: F) -> Result<T, TokenError>
    where
        F: Future<Output = Result<T, TokenError>>,
    {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(TokenError::Cancelled),
            result = fut => result,
        }
    }
}
