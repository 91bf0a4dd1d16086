//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `token_controller_reconciliations_total` - Total number of reconciliations
//! - `token_controller_reconciliation_errors_total` - Failed reconciliations
//! - `token_controller_reconciliation_duration_seconds` - Duration of reconciliations
//! - `token_controller_step_errors_total` - Pipeline step failures by step and reason
//! - `token_controller_artifact_upserts_total` - Token secret upserts by outcome
//! - `token_controller_rotations_total` - Tokens re-issued before expiry
//! - `token_controller_requeues_total` - Requeue pushes by trigger
//! - `token_controller_status_write_errors_total` - Failed status writes

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "token_controller_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "token_controller_reconciliation_errors_total",
        "Total number of failed reconciliations",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "token_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static STEP_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "token_controller_step_errors_total",
            "Total number of pipeline step failures by step and reason",
        ),
        &["step", "reason"],
    )
    .expect("Failed to create STEP_ERRORS_TOTAL metric - this should never happen")
});

static ARTIFACT_UPSERTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "token_controller_artifact_upserts_total",
            "Total number of token secret upserts by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create ARTIFACT_UPSERTS_TOTAL metric - this should never happen")
});

static ROTATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "token_controller_rotations_total",
        "Total number of tokens re-issued before expiry",
    )
    .expect("Failed to create ROTATIONS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "token_controller_requeues_total",
            "Total number of requeue pushes by trigger",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static STATUS_WRITE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "token_controller_status_write_errors_total",
        "Total number of failed status writes",
    )
    .expect("Failed to create STATUS_WRITE_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate metric names"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(STEP_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_UPSERTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_WRITE_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_step_errors(step: &str, reason: &str) {
    STEP_ERRORS_TOTAL.with_label_values(&[step, reason]).inc();
}

pub fn increment_artifact_upserts(outcome: &str) {
    ARTIFACT_UPSERTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_rotations() {
    ROTATIONS_TOTAL.inc();
}

pub fn increment_requeues(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

pub fn increment_status_write_errors() {
    STATUS_WRITE_ERRORS_TOTAL.inc();
}

/// Encode every registered metric in the Prometheus text format
///
/// # Errors
///
/// Returns an error when encoding fails.
pub fn gather_text() -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
