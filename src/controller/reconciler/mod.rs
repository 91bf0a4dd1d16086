//! # Reconciler
//!
//! Credential lifecycle reconciliation for `Token` resources.
//!
//! The reconciler:
//! - Materializes the token secret when it does not exist
//! - Computes when the current token expires and schedules its own next run
//! - Re-issues the token once `lifetime / 5` before expiry
//! - Writes the outcome to the `Token` status after every attempt
//!
//! All cluster I/O goes through the [`SecretResolver`], [`ArtifactStore`] and
//! [`StatusReporter`] seams so the pipeline can run against in-memory fakes.

pub mod artifact;
pub mod errors;
pub mod reconcile;
pub mod resolver;
pub mod schedule;
pub mod status;
pub mod sync;
pub mod types;
pub mod validation;

pub use artifact::{ArtifactStore, KubeArtifactStore, UpsertOutcome};
pub use errors::{aggregate, finalize_always, AggregateError, StepError, SyncStep, TokenError};
pub use reconcile::reconcile;
pub use resolver::{KubeSecretResolver, SecretResolver};
pub use schedule::{clamp_to_zero, RequeueStore, ScheduleEntry, ScheduleStore};
pub use status::{
    build_status, status_needs_write, KubeStatusReporter, StatusReport, StatusReporter,
};
pub use sync::{refresh_threshold, PIPELINE};
pub use types::{
    BackoffState, Clock, Reconciler, ReconcilerError, ReconcilerParts, RequeueTrigger,
    SystemClock,
};
