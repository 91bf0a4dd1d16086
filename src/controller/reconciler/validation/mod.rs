//! # Validation
//!
//! Validates Token resources and Kubernetes duration strings.

mod duration;
mod kubernetes;
mod token;

pub use duration::parse_kubernetes_duration;
pub use kubernetes::{
    validate_kubernetes_name, validate_kubernetes_namespace, validate_secret_data_key,
};
pub use token::validate_token;
