//! # Status Command
//!
//! Command to show detailed status of a Token resource.

use anyhow::{Context, Result};
use kube::{api::Api, Client};
use token_controller::crd::Token;

/// Show detailed status of a Token resource
pub async fn status_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");

    println!("Status for Token '{ns}/{name}'");
    println!();

    let api: Api<Token> = Api::namespaced(client, ns);

    let token = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get Token '{ns}/{name}'"))?;

    println!("Resource Information:");
    println!("  Name: {}", token.name_or_unknown());
    println!("  Namespace: {}", token.namespace_or_default());
    if let Some(uid) = &token.metadata.uid {
        println!("  UID: {uid}");
    }

    let secret_ref = token.secret_ref();
    let (key_ref, key_namespace) = token.signing_key_ref();
    println!();
    println!("Spec:");
    println!("  Username: {}", token.spec.username);
    println!("  Lifetime: {}", token.spec.lifetime);
    println!("  Refresh: {}", token.spec.refresh);
    println!("  Secret: {}/{} (key '{}')", token.namespace_or_default(), secret_ref.name, secret_ref.key);
    println!("  Signing Key: {key_namespace}/{} (key '{}')", key_ref.name, key_ref.key);

    let Some(status) = &token.status else {
        println!();
        println!("Status: No status available (resource may not have been reconciled yet)");
        return Ok(());
    };

    println!();
    println!("Status:");
    if let Some(phase) = &status.phase {
        println!("  Phase: {phase}");
    }
    if let Some(observed_generation) = status.observed_generation {
        println!("  Observed Generation: {observed_generation}");
    }
    if let Some(last_reconcile_time) = &status.last_reconcile_time {
        println!("  Last Reconcile Time: {last_reconcile_time}");
    }
    if let Some(next_refresh_time) = &status.next_refresh_time {
        println!("  Next Refresh Time: {next_refresh_time}");
    }
    if let Some(last_rotation_time) = &status.last_rotation_time {
        println!("  Last Rotation Time: {last_rotation_time}");
    }

    if !status.conditions.is_empty() {
        println!();
        println!("Conditions:");
        for condition in &status.conditions {
            println!("  {}: {}", condition.r#type, condition.status);
            if let Some(reason) = &condition.reason {
                println!("    Reason: {reason}");
            }
            if let Some(message) = &condition.message {
                println!("    Message: {message}");
            }
            if let Some(last_transition_time) = &condition.last_transition_time {
                println!("    Last Transition: {last_transition_time}");
            }
        }
    }

    Ok(())
}
