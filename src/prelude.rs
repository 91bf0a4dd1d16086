//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use token_controller::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, AggregateError, ArtifactStore, Clock, Reconciler, ReconcilerError,
    ReconcilerParts, RequeueStore, ScheduleStore, SecretResolver, StatusReport, StatusReporter,
    StepError, SyncStep, SystemClock, TokenError, UpsertOutcome,
};

pub use crate::controller::token::{ClaimError, TokenArtifact};

pub use crate::config::{ControllerConfig, ServerConfig, SharedControllerConfig};
