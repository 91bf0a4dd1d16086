//! # Token Validation
//!
//! Validates `Token` resources before anything is minted for them.

use crate::constants::MAX_TOKEN_LIFETIME_SECS;
use crate::crd::Token;
use anyhow::Result;

use super::duration::parse_kubernetes_duration;
use super::kubernetes::{
    validate_kubernetes_name, validate_kubernetes_namespace, validate_secret_data_key,
};

/// Validate a Token resource
pub fn validate_token(token: &Token) -> Result<()> {
    if token.spec.username.trim().is_empty() {
        return Err(anyhow::anyhow!("username is required but is empty"));
    }

    let key_ref = &token.spec.jwt_hs256_key_ref;
    validate_kubernetes_name(&key_ref.name, "jwtHs256KeyRef.name")?;
    validate_secret_data_key(&key_ref.key, "jwtHs256KeyRef.key")?;
    if let Some(namespace) = &key_ref.namespace {
        validate_kubernetes_namespace(namespace, "jwtHs256KeyRef.namespace")?;
    }

    let secret_ref = token.secret_ref();
    validate_kubernetes_name(&secret_ref.name, "secretRef.name")?;
    validate_secret_data_key(&secret_ref.key, "secretRef.key")?;

    let lifetime = parse_kubernetes_duration(&token.spec.lifetime)
        .map_err(|e| anyhow::anyhow!("Invalid lifetime '{}': {e}", token.spec.lifetime))?;
    if lifetime.as_secs() > MAX_TOKEN_LIFETIME_SECS {
        return Err(anyhow::anyhow!(
            "Invalid lifetime '{}': must not exceed {}s",
            token.spec.lifetime,
            MAX_TOKEN_LIFETIME_SECS
        ));
    }

    Ok(())
}
