//! # Runtime
//!
//! Controller process lifecycle.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the `kube_runtime::Controller` loop with restart handling
//! - `error_policy`: backoff for failed reconciliations and watch error classification

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
