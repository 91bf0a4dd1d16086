//! # Reconcile Command
//!
//! Command to trigger reconciliation of a Token resource.

use anyhow::{Context, Result};
use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use serde_json::json;
use token_controller::constants::ANNOTATION_RECONCILE_REQUESTED_AT;
use token_controller::crd::Token;

/// Trigger reconciliation by updating an annotation
///
/// Any change to the Token wakes the controller; the annotation carries the
/// request time so repeated requests always change the object.
pub async fn reconcile_command(
    client: Client,
    name: String,
    namespace: Option<String>,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<Token> = Api::namespaced(client, ns);

    let requested_at = chrono::Utc::now().to_rfc3339();
    let patch = json!({
        "metadata": {
            "annotations": {
                ANNOTATION_RECONCILE_REQUESTED_AT: requested_at
            }
        }
    });

    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("Failed to annotate Token '{ns}/{name}'"))?;

    println!("Reconciliation requested for Token '{ns}/{name}' at {requested_at}");
    Ok(())
}
