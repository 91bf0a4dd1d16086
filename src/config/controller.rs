//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS, DEFAULT_ERROR_BACKOFF_MAX_MINUTES,
    DEFAULT_ERROR_BACKOFF_MIN_MINUTES, DEFAULT_EXPIRATION_FALLBACK_REQUEUE_SECS,
    DEFAULT_FIELD_MANAGER, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
    DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue pushed when a token's expiration cannot be computed (seconds)
    /// Keeps the token on a self-rescheduling cycle while the token or signing
    /// key secret is unavailable
    pub expiration_fallback_requeue_secs: u64,
    /// Fibonacci backoff lower bound for failed reconciliations (minutes)
    pub error_backoff_min_minutes: u64,
    /// Fibonacci backoff upper bound for failed reconciliations (minutes)
    pub error_backoff_max_minutes: u64,
    /// Exponential backoff starting value for watch stream errors (milliseconds)
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value for watch stream errors (milliseconds)
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Maximum concurrent reconciliations
    /// Reconciliations of the same token never overlap regardless of this value
    pub max_concurrent_reconciliations: u16,
    /// Field manager for server-side apply of issued Secrets and status patches
    pub field_manager: String,
    /// Namespace where the controller is deployed
    pub controller_namespace: String,
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            expiration_fallback_requeue_secs: DEFAULT_EXPIRATION_FALLBACK_REQUEUE_SECS,
            error_backoff_min_minutes: DEFAULT_ERROR_BACKOFF_MIN_MINUTES,
            error_backoff_max_minutes: DEFAULT_ERROR_BACKOFF_MAX_MINUTES,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            controller_namespace: "microscaler-system".to_string(),
            log_level: "info".to_string(),
            enable_metrics: true,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            expiration_fallback_requeue_secs: env_var_or_default(
                "EXPIRATION_FALLBACK_REQUEUE_SECS",
                defaults.expiration_fallback_requeue_secs,
            ),
            error_backoff_min_minutes: env_var_or_default(
                "ERROR_BACKOFF_MIN_MINUTES",
                defaults.error_backoff_min_minutes,
            ),
            error_backoff_max_minutes: env_var_or_default(
                "ERROR_BACKOFF_MAX_MINUTES",
                defaults.error_backoff_max_minutes,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", defaults.backoff_start_ms),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", defaults.backoff_max_ms),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            field_manager: env_var_or_default_str("FIELD_MANAGER", &defaults.field_manager),
            controller_namespace: env_var_or_default_str(
                "POD_NAMESPACE",
                &defaults.controller_namespace,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", &defaults.log_level),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", defaults.enable_metrics),
        }
    }

    /// Requeue pushed when the expiration cannot be computed
    #[must_use]
    pub fn expiration_fallback_requeue(&self) -> Duration {
        Duration::from_secs(self.expiration_fallback_requeue_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}
