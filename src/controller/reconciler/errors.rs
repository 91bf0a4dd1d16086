//! # Errors
//!
//! Error taxonomy for token reconciliation.
//!
//! Every failure inside a reconciliation is a [`TokenError`]. Pipeline steps wrap
//! their failure in a [`StepError`] that carries the step name, and the attempt as
//! a whole reports an [`AggregateError`] holding one or more step errors.

use crate::controller::token::ClaimError;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Boxed source error for failures that originate in the API client
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("secret {namespace}/{name} has no data key '{key}'")]
    SecretKeyMissing {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("secret {namespace}/{name} is unavailable: {source}")]
    SecretUnavailable {
        namespace: String,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Claims(#[from] ClaimError),

    #[error("invalid token spec: {0}")]
    InvalidSpec(String),

    #[error("failed to build token secret: {0}")]
    ArtifactBuild(String),

    #[error("failed to sync secret {namespace}/{name}: {source}")]
    ArtifactSync {
        namespace: String,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to write token status: {source}")]
    StatusWrite {
        #[source]
        source: BoxError,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl TokenError {
    /// Signature was valid but the token is past its expiration
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Claims(e) if e.is_expired())
    }

    /// Resolution failed because the referenced secret or key does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TokenError::SecretNotFound { .. } | TokenError::SecretKeyMissing { .. }
        )
    }

    /// Short label used for the `reason` of failure metrics
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::SecretNotFound { .. } => "secret-not-found",
            TokenError::SecretKeyMissing { .. } => "secret-key-missing",
            TokenError::SecretUnavailable { .. } => "secret-unavailable",
            TokenError::Claims(_) => "claims",
            TokenError::InvalidSpec(_) => "invalid-spec",
            TokenError::ArtifactBuild(_) => "artifact-build",
            TokenError::ArtifactSync { .. } => "artifact-sync",
            TokenError::StatusWrite { .. } => "status-write",
            TokenError::Cancelled => "cancelled",
        }
    }
}

/// Named stages of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    /// Materialize the token secret when it does not exist yet
    Secret,
    /// Re-issue the token once its refresh threshold is reached
    Refresh,
    /// Final status write after a successful pipeline
    Status,
}

impl SyncStep {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::Secret => "Secret",
            SyncStep::Refresh => "Refresh",
            SyncStep::Status => "Status",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`TokenError`] labelled with the step it happened in
#[derive(Debug, Error)]
#[error("[{step}]: {source}")]
pub struct StepError {
    pub step: SyncStep,
    #[source]
    pub source: TokenError,
}

impl StepError {
    #[must_use]
    pub fn new(step: SyncStep, source: TokenError) -> Self {
        Self { step, source }
    }
}

/// One or more step errors from a single reconciliation attempt
///
/// Never empty; use [`aggregate`] to build one.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<StepError>,
}

impl AggregateError {
    #[must_use]
    pub fn errors(&self) -> &[StepError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<StepError> {
        self.errors
    }

    /// Whether any step failed with the given step label
    #[must_use]
    pub fn contains_step(&self, step: SyncStep) -> bool {
        self.errors.iter().any(|e| e.step == step)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "{single}"),
            errors => {
                f.write_str("[")?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Merge zero or more step errors
///
/// # Errors
///
/// Returns an [`AggregateError`] when `errors` is not empty.
pub fn aggregate(errors: Vec<StepError>) -> Result<(), AggregateError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AggregateError { errors })
    }
}

/// Run `finalize` after `outcome` no matter what, and merge both results
///
/// `finalize` receives the failure message of `outcome`, if any. A finalizer
/// failure is labelled with the failing step, or [`SyncStep::Status`] when the
/// pipeline succeeded.
///
/// # Errors
///
/// Returns every failure of the pipeline and of the finalizer, pipeline first.
pub async fn finalize_always<F, Fut>(
    outcome: Result<(), StepError>,
    finalize: F,
) -> Result<(), AggregateError>
where
    F: FnOnce(Option<String>) -> Fut,
    Fut: Future<Output = Result<(), TokenError>>,
{
    let failure = outcome.as_ref().err().map(ToString::to_string);
    let label = outcome.as_ref().err().map_or(SyncStep::Status, |e| e.step);
    let finalized = finalize(failure).await;

    let mut errors = Vec::with_capacity(2);
    if let Err(e) = outcome {
        errors.push(e);
    }
    if let Err(source) = finalized {
        errors.push(StepError::new(label, source));
    }
    aggregate(errors)
}
