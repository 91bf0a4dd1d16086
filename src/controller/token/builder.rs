//! # Token Secret Builder
//!
//! Builds the `Secret` that carries a freshly minted token.

use crate::constants::{ANNOTATION_JWT_HS256_KEY_HASH, DEFAULT_FIELD_MANAGER, LABEL_TOKEN_NAME};
use crate::controller::reconciler::errors::TokenError;
use crate::controller::reconciler::validation::validate_token;
use crate::controller::token::claims::mint_token;
use crate::crd::Token;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::Resource;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A built token secret together with the expiration of the token inside it
#[derive(Debug, Clone)]
pub struct TokenArtifact {
    pub secret: Secret,
    pub expires_at: DateTime<Utc>,
}

impl TokenArtifact {
    #[must_use]
    pub fn name(&self) -> &str {
        self.secret.metadata.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.secret.metadata.namespace.as_deref().unwrap_or_default()
    }
}

/// Hex SHA-256 of the signing key, recorded on the secret so key changes are visible
#[must_use]
pub fn signing_key_hash(signing_key: &[u8]) -> String {
    format!("{:x}", Sha256::digest(signing_key))
}

/// Mint a token for `token` and wrap it in its secret
///
/// # Errors
///
/// [`TokenError::InvalidSpec`] when the token spec does not validate and
/// [`TokenError::ArtifactBuild`] when the key is empty or signing fails.
pub fn build_token_secret(
    token: &Token,
    signing_key: &[u8],
    now: DateTime<Utc>,
) -> Result<TokenArtifact, TokenError> {
    validate_token(token).map_err(|e| TokenError::InvalidSpec(e.to_string()))?;

    if signing_key.is_empty() {
        return Err(TokenError::ArtifactBuild("signing key is empty".to_string()));
    }

    let lifetime = token
        .lifetime()
        .map_err(|e| TokenError::InvalidSpec(e.to_string()))?;
    let minted = mint_token(signing_key, &token.spec.username, lifetime, now)
        .map_err(|e| TokenError::ArtifactBuild(e.to_string()))?;

    let secret_ref = token.secret_ref();
    let token_name = token.name_or_unknown();

    let labels = BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "token".to_string()),
        (
            "app.kubernetes.io/managed-by".to_string(),
            DEFAULT_FIELD_MANAGER.to_string(),
        ),
        (
            "app.kubernetes.io/instance".to_string(),
            token_name.to_string(),
        ),
        (LABEL_TOKEN_NAME.to_string(), token_name.to_string()),
    ]);
    let annotations = BTreeMap::from([(
        ANNOTATION_JWT_HS256_KEY_HASH.to_string(),
        signing_key_hash(signing_key),
    )]);

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(secret_ref.name),
            namespace: Some(token.namespace_or_default().to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: token.controller_owner_ref(&()).map(|o| vec![o]),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            secret_ref.key,
            ByteString(minted.token.into_bytes()),
        )])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };

    Ok(TokenArtifact {
        secret,
        expires_at: minted.expires_at,
    })
}
