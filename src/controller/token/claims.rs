//! # Token Claims
//!
//! Minting and expiration parsing for HS256-signed tokens.
//!
//! Signature validation always happens before the expiration is looked at, so a
//! [`ClaimError::Expired`] means "authentic but past its `exp`". Expiry is
//! checked against the caller's clock rather than the system clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Claim parsing failures
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Signature is valid but `exp` lies in the past
    #[error("token is expired (exp {exp})")]
    Expired { exp: DateTime<Utc> },
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl ClaimError {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, ClaimError::Expired { .. })
    }
}

/// Claims carried by issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issued-at (unix timestamp seconds)
    pub iat: i64,
    /// Expiry (unix timestamp seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// User name the token authenticates as
    #[serde(default)]
    pub sun: String,
}

/// Result of minting a token
#[derive(Debug, Clone)]
pub struct MintedToken {
    /// Compact JWS
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mint an HS256 token for `username` valid for `lifetime` from `now`
///
/// # Errors
///
/// Returns [`ClaimError::Signing`] when the lifetime is out of range or signing fails.
pub fn mint_token(
    signing_key: &[u8],
    username: &str,
    lifetime: Duration,
    now: DateTime<Utc>,
) -> Result<MintedToken, ClaimError> {
    let lifetime = chrono::Duration::from_std(lifetime)
        .map_err(|e| ClaimError::Signing(format!("lifetime out of range: {e}")))?;
    // `exp` is whole seconds, so the reported expiry must be too
    let expires_at = now
        .checked_add_signed(lifetime)
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp.timestamp(), 0))
        .ok_or_else(|| ClaimError::Signing("expiration overflows".to_string()))?;

    let claims = TokenClaims {
        iat: now.timestamp(),
        exp: Some(expires_at.timestamp()),
        sun: username.to_string(),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .map_err(|e| ClaimError::Signing(e.to_string()))?;

    Ok(MintedToken { token, expires_at })
}

/// Parse the expiration of a signed token
///
/// Returns `Some(exp)` for a valid token whose `exp` is not in the past,
/// `None` for a valid token without an `exp` claim.
///
/// # Errors
///
/// [`ClaimError::InvalidSignature`] when the signature does not match
/// `signing_key`, [`ClaimError::Expired`] when `exp < now`, and
/// [`ClaimError::Malformed`] for anything that is not a decodable HS256 token.
pub fn parse_expiration(
    token: &[u8],
    signing_key: &[u8],
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ClaimError> {
    let token = std::str::from_utf8(token)
        .map_err(|e| ClaimError::Malformed(format!("token is not valid UTF-8: {e}")))?
        .trim();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(signing_key),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => ClaimError::InvalidSignature,
        _ => ClaimError::Malformed(e.to_string()),
    })?;

    let Some(exp) = data.claims.exp else {
        return Ok(None);
    };

    let exp = DateTime::<Utc>::from_timestamp(exp, 0)
        .ok_or_else(|| ClaimError::Malformed(format!("exp {exp} is out of range")))?;

    if exp < now {
        return Err(ClaimError::Expired { exp });
    }

    Ok(Some(exp))
}
