//! # Artifact Synchronizer
//!
//! Idempotent upsert of the token secret.
//!
//! - **Default mode**: create the secret when it is absent, otherwise leave it alone
//! - **Forced mode**: server-side apply with `force`, overwriting whatever is there

use crate::controller::reconciler::errors::TokenError;
use crate::controller::token::TokenArtifact;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    /// The secret already existed and was left untouched
    Unchanged,
    Overwritten,
}

impl UpsertOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Unchanged => "unchanged",
            UpsertOutcome::Overwritten => "overwritten",
        }
    }
}

/// Writes token secrets
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upsert `artifact`; `force` overwrites an existing secret unconditionally
    ///
    /// # Errors
    ///
    /// [`TokenError::ArtifactSync`] when the API rejects the write.
    async fn upsert(
        &self,
        artifact: &TokenArtifact,
        force: bool,
    ) -> Result<UpsertOutcome, TokenError>;
}

/// [`ArtifactStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeArtifactStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeArtifactStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeArtifactStore {
    #[must_use]
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for KubeArtifactStore {
    async fn upsert(
        &self,
        artifact: &TokenArtifact,
        force: bool,
    ) -> Result<UpsertOutcome, TokenError> {
        let namespace = artifact.namespace();
        let name = artifact.name();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let sync_error = |e: kube::Error| TokenError::ArtifactSync {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source: Box::new(e),
        };

        if force {
            let params = PatchParams::apply(&self.field_manager).force();
            secrets
                .patch(name, &params, &Patch::Apply(&artifact.secret))
                .await
                .map_err(sync_error)?;
            return Ok(UpsertOutcome::Overwritten);
        }

        if secrets.get_opt(name).await.map_err(sync_error)?.is_some() {
            return Ok(UpsertOutcome::Unchanged);
        }

        match secrets.create(&PostParams::default(), &artifact.secret).await {
            Ok(_) => Ok(UpsertOutcome::Created),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                debug!("Secret {}/{} was created concurrently", namespace, name);
                Ok(UpsertOutcome::Unchanged)
            }
            Err(e) => Err(sync_error(e)),
        }
    }
}
