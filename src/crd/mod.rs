//! # Custom Resource Definitions
//!
//! CRD types for the Token Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Token` specification, secret references and default values
//! - `status.rs` - Status types for tracking reconciliation state

mod spec;
mod status;

// Re-export all public types
pub use spec::{default_lifetime, default_true, JwtKeyRef, SecretKeyRef, Token, TokenSpec};
pub use status::{Condition, TokenStatus};
