//! # Types
//!
//! Core types for the reconciler.

use crate::config::SharedControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::artifact::{ArtifactStore, KubeArtifactStore};
use crate::controller::reconciler::errors::AggregateError;
use crate::controller::reconciler::resolver::{KubeSecretResolver, SecretResolver};
use crate::controller::reconciler::schedule::{RequeueStore, ScheduleStore};
use crate::controller::reconciler::status::{KubeStatusReporter, StatusReporter};
use chrono::{DateTime, Utc};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    Sync(#[from] AggregateError),
}

/// Why a requeue was pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueTrigger {
    /// Computed from the current token's refresh threshold
    Expiration,
    /// Expiration could not be computed
    Fallback,
    /// Refresh threshold of a token that was just re-issued
    Rotation,
    /// Fibonacci backoff after a failed reconciliation
    ErrorBackoff,
}

impl RequeueTrigger {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RequeueTrigger::Expiration => "expiration",
            RequeueTrigger::Fallback => "fallback",
            RequeueTrigger::Rotation => "rotation",
            RequeueTrigger::ErrorBackoff => "error-backoff",
        }
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] reading the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Collaborators a [`Reconciler`] is assembled from
pub struct ReconcilerParts {
    pub resolver: Arc<dyn SecretResolver>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub status: Arc<dyn StatusReporter>,
    pub schedule: Arc<dyn RequeueStore>,
    pub clock: Arc<dyn Clock>,
    pub config: SharedControllerConfig,
    /// Cancelled on shutdown; every blocking call observes it
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for ReconcilerParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerParts")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub struct Reconciler {
    pub(crate) resolver: Arc<dyn SecretResolver>,
    pub(crate) artifacts: Arc<dyn ArtifactStore>,
    pub(crate) status: Arc<dyn StatusReporter>,
    pub(crate) schedule: Arc<dyn RequeueStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub config: SharedControllerConfig,
    pub shutdown: CancellationToken,
    // Backoff state per resource (identified by namespace/name), owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Build a reconciler talking to the cluster through `client`
    #[must_use]
    pub fn new(client: Client, config: SharedControllerConfig, shutdown: CancellationToken) -> Self {
        let field_manager = config.field_manager.clone();
        Self::from_parts(ReconcilerParts {
            resolver: Arc::new(KubeSecretResolver::new(client.clone())),
            artifacts: Arc::new(KubeArtifactStore::new(client.clone(), field_manager)),
            status: Arc::new(KubeStatusReporter::new(client)),
            schedule: Arc::new(ScheduleStore::new()),
            clock: Arc::new(SystemClock),
            config,
            shutdown,
        })
    }

    #[must_use]
    pub fn from_parts(parts: ReconcilerParts) -> Self {
        Self {
            resolver: parts.resolver,
            artifacts: parts.artifacts,
            status: parts.status,
            schedule: parts.schedule,
            clock: parts.clock,
            config: parts.config,
            shutdown: parts.shutdown,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The requeue schedule this reconciler pushes to
    #[must_use]
    pub fn schedule(&self) -> &Arc<dyn RequeueStore> {
        &self.schedule
    }

    /// Forget the error backoff of a resource after it reconciled successfully
    pub fn reset_backoff(&self, key: &str) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(state) = states.get_mut(key) {
            state.reset();
        }
    }
}
