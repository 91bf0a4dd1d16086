//! Token Controller Library
//!
//! Issues HS256-signed tokens into Kubernetes Secrets and re-issues them before
//! they expire.
//!
//! ## Quick Start
//!
//! ```rust
//! use token_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
