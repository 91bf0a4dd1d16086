//! # Controller
//!
//! Core controller modules for the Token Controller.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `reconciler`: Credential lifecycle reconciliation
//! - `server`: HTTP server for metrics and health checks
//! - `token`: Token minting, claim parsing and secret construction

pub mod backoff;
pub mod reconciler;
pub mod server;
pub mod token;
