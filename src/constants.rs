//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the `Token` custom resource
pub const API_GROUP: &str = "token-management.microscaler.io";

/// Field manager used for server-side apply and status patches
pub const DEFAULT_FIELD_MANAGER: &str = "token-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Requeue used when the token expiration cannot be computed (seconds)
pub const DEFAULT_EXPIRATION_FALLBACK_REQUEUE_SECS: u64 = 30;

/// Fibonacci error backoff lower bound (minutes)
pub const DEFAULT_ERROR_BACKOFF_MIN_MINUTES: u64 = 1;

/// Fibonacci error backoff upper bound (minutes)
pub const DEFAULT_ERROR_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default number of tokens reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default token lifetime when `spec.lifetime` is omitted
pub const DEFAULT_TOKEN_LIFETIME: &str = "15m";

/// Longest accepted `spec.lifetime` (365 days)
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 86_400;

/// Default data key of the issued Secret
pub const DEFAULT_TOKEN_SECRET_KEY: &str = "auth-token";

/// Suffix appended to the token name for the default Secret name
pub const DEFAULT_TOKEN_SECRET_SUFFIX: &str = "jwt";

/// Proactive rotation happens once this fraction of the lifetime is left (1/5)
pub const REFRESH_MARGIN_DIVISOR: u32 = 5;

/// Annotation carrying the SHA-256 fingerprint of the signing key
pub const ANNOTATION_JWT_HS256_KEY_HASH: &str =
    "token-management.microscaler.io/jwt-hs256-key-hash";

/// Label naming the owning `Token`
pub const LABEL_TOKEN_NAME: &str = "token-management.microscaler.io/token";

/// Annotation written by `tokenctl reconcile` to trigger a reconciliation
pub const ANNOTATION_RECONCILE_REQUESTED_AT: &str =
    "token-management.microscaler.io/reconcile-requested-at";
