//! # Token Spec
//!
//! Main CRD specification types and default values.

use crate::constants::{
    DEFAULT_TOKEN_LIFETIME, DEFAULT_TOKEN_SECRET_KEY, DEFAULT_TOKEN_SECRET_SUFFIX,
};
use crate::controller::reconciler::validation::parse_kubernetes_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token Custom Resource Definition
///
/// A `Token` issues an HS256-signed JWT into a Kubernetes Secret and keeps it
/// valid by re-issuing it once 80% of its lifetime has elapsed.
///
/// # Example
///
/// ```yaml
/// apiVersion: token-management.microscaler.io/v1beta1
/// kind: Token
/// metadata:
///   name: slurm-admin
///   namespace: slurm
/// spec:
///   username: admin
///   lifetime: 1h
///   refresh: true
///   jwtHs256KeyRef:
///     name: slurm-jwt-hs256-key
///     key: jwt_hs256.key
///   secretRef:
///     name: slurm-admin-jwt
///     key: auth-token
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Token",
    group = "token-management.microscaler.io",
    version = "v1beta1",
    namespaced,
    status = "crate::crd::TokenStatus",
    shortname = "tok",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Next Refresh", "type":"string", "jsonPath":".status.nextRefreshTime"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpec {
    /// Reference to the HS256 signing key used to mint and validate the token
    pub jwt_hs256_key_ref: JwtKeyRef,
    /// User name embedded in the token claims
    pub username: String,
    /// Nominal validity window of an issued token
    /// Format: Kubernetes duration string (e.g., "15m", "1h", "1d")
    /// Default: "15m"
    #[serde(default = "default_lifetime")]
    pub lifetime: String,
    /// Re-issue the token before it expires
    /// When false the Secret is created once and never rotated
    /// Default: true
    #[serde(default = "default_true")]
    pub refresh: bool,
    /// Secret (and data key) that receives the issued token
    /// Default: name "<token-name>-jwt", key "auth-token"
    #[serde(default)]
    pub secret_ref: Option<SecretKeyRef>,
}

/// Reference to a single data key of a Secret in the same namespace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Name of the Secret
    pub name: String,
    /// Data key within the Secret
    pub key: String,
}

/// Reference to the signing key Secret, optionally in another namespace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JwtKeyRef {
    /// Name of the Secret
    pub name: String,
    /// Data key within the Secret
    pub key: String,
    /// Namespace of the Secret (defaults to the Token namespace)
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Token {
    /// Namespace of the token, "default" when unset
    #[must_use]
    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Name of the token, "unknown" when unset
    #[must_use]
    pub fn name_or_unknown(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Stable "namespace/name" key used by the requeue schedule and backoff state
    #[must_use]
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.namespace_or_default(), self.name_or_unknown())
    }

    /// Whether the token is being deleted
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Secret that holds the issued token, with defaults applied
    #[must_use]
    pub fn secret_ref(&self) -> SecretKeyRef {
        self.spec.secret_ref.clone().unwrap_or_else(|| SecretKeyRef {
            name: format!("{}-{}", self.name_or_unknown(), DEFAULT_TOKEN_SECRET_SUFFIX),
            key: DEFAULT_TOKEN_SECRET_KEY.to_string(),
        })
    }

    /// Signing key reference and the namespace it resolves in
    #[must_use]
    pub fn signing_key_ref(&self) -> (SecretKeyRef, String) {
        let key_ref = &self.spec.jwt_hs256_key_ref;
        let namespace = key_ref
            .namespace
            .clone()
            .unwrap_or_else(|| self.namespace_or_default().to_string());
        (
            SecretKeyRef {
                name: key_ref.name.clone(),
                key: key_ref.key.clone(),
            },
            namespace,
        )
    }

    /// Parsed `spec.lifetime`
    ///
    /// # Errors
    ///
    /// Returns an error when the lifetime is not a valid Kubernetes duration.
    pub fn lifetime(&self) -> anyhow::Result<Duration> {
        parse_kubernetes_duration(&self.spec.lifetime)
    }
}

/// Default value for token lifetime
#[must_use]
pub fn default_lifetime() -> String {
    DEFAULT_TOKEN_LIFETIME.to_string()
}

/// Default value for boolean true
#[must_use]
pub fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn token(secret_ref: Option<SecretKeyRef>, key_namespace: Option<&str>) -> Token {
        let mut token = Token::new(
            "admin",
            TokenSpec {
                jwt_hs256_key_ref: JwtKeyRef {
                    name: "jwt-key".to_string(),
                    key: "jwt_hs256.key".to_string(),
                    namespace: key_namespace.map(str::to_string),
                },
                username: "admin".to_string(),
                lifetime: default_lifetime(),
                refresh: true,
                secret_ref,
            },
        );
        token.metadata = ObjectMeta {
            name: Some("admin".to_string()),
            namespace: Some("slurm".to_string()),
            ..Default::default()
        };
        token
    }

    #[test]
    fn test_secret_ref_defaults_to_token_name() {
        let token = token(None, None);
        assert_eq!(
            token.secret_ref(),
            SecretKeyRef {
                name: "admin-jwt".to_string(),
                key: "auth-token".to_string(),
            }
        );
    }

    #[test]
    fn test_signing_key_namespace_defaults_to_token_namespace() {
        let (_, namespace) = token(None, None).signing_key_ref();
        assert_eq!(namespace, "slurm");

        let (key_ref, namespace) = token(None, Some("auth")).signing_key_ref();
        assert_eq!(namespace, "auth");
        assert_eq!(key_ref.name, "jwt-key");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(token(None, None).object_key(), "slurm/admin");
    }

    #[test]
    fn test_spec_defaults_from_json() {
        let spec: TokenSpec = serde_json::from_value(serde_json::json!({
            "jwtHs256KeyRef": { "name": "jwt-key", "key": "jwt_hs256.key" },
            "username": "admin"
        }))
        .expect("spec should deserialize");
        assert_eq!(spec.lifetime, "15m");
        assert!(spec.refresh);
        assert!(spec.secret_ref.is_none());
    }

    #[test]
    fn test_lifetime_parses() {
        let token = token(None, None);
        assert_eq!(token.lifetime().unwrap(), Duration::from_secs(900));
    }
}
