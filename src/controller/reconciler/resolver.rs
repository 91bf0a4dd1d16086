//! # Secret Reference Resolver
//!
//! Reads raw bytes out of a key of a Kubernetes `Secret`.

use crate::controller::reconciler::errors::TokenError;
use crate::crd::SecretKeyRef;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::debug;
use zeroize::Zeroizing;

/// Resolves a secret key reference to its raw bytes
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Return the bytes stored under `key_ref.key` of secret `key_ref.name` in `namespace`
    ///
    /// # Errors
    ///
    /// [`TokenError::SecretNotFound`], [`TokenError::SecretKeyMissing`] or
    /// [`TokenError::SecretUnavailable`] for transient API failures.
    async fn resolve(
        &self,
        namespace: &str,
        key_ref: &SecretKeyRef,
    ) -> Result<Zeroizing<Vec<u8>>, TokenError>;
}

/// [`SecretResolver`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretResolver {
    client: Client,
}

impl std::fmt::Debug for KubeSecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretResolver").finish_non_exhaustive()
    }
}

impl KubeSecretResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Extract `key` from a fetched secret, preferring `data` over `stringData`
#[must_use]
pub fn secret_key_bytes(secret: &Secret, key: &str) -> Option<Zeroizing<Vec<u8>>> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| Zeroizing::new(value.0.clone()))
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|value| Zeroizing::new(value.as_bytes().to_vec()))
        })
}

#[async_trait]
impl SecretResolver for KubeSecretResolver {
    async fn resolve(
        &self,
        namespace: &str,
        key_ref: &SecretKeyRef,
    ) -> Result<Zeroizing<Vec<u8>>, TokenError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let secret = match secrets.get(&key_ref.name).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("Secret {}/{} not found", namespace, key_ref.name);
                return Err(TokenError::SecretNotFound {
                    namespace: namespace.to_string(),
                    name: key_ref.name.clone(),
                });
            }
            Err(e) => {
                return Err(TokenError::SecretUnavailable {
                    namespace: namespace.to_string(),
                    name: key_ref.name.clone(),
                    source: Box::new(e),
                });
            }
        };

        secret_key_bytes(&secret, &key_ref.key).ok_or_else(|| TokenError::SecretKeyMissing {
            namespace: namespace.to_string(),
            name: key_ref.name.clone(),
            key: key_ref.key.clone(),
        })
    }
}
