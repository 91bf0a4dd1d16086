//! # List Command
//!
//! Command to list Token resources.

use anyhow::{Context, Result};
use kube::{api::Api, Client};
use token_controller::crd::Token;

/// List Token resources in one namespace or all of them
pub async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<Token> = if let Some(ns) = &namespace {
        println!("Listing Token resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing Token resources in all namespaces...");
        Api::all(client)
    };

    let tokens = api
        .list(&kube::api::ListParams::default())
        .await
        .context("Failed to list Token resources")?;

    if tokens.items.is_empty() {
        println!("No Token resources found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<10} {:<8} {:<26}",
        "NAME", "NAMESPACE", "LIFETIME", "READY", "NEXT REFRESH"
    );
    println!("{}", "-".repeat(97));

    for token in tokens.items {
        let name = token.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = token.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let lifetime = token.spec.lifetime.as_str();

        let ready = token
            .status
            .as_ref()
            .and_then(|s| s.ready_condition())
            .map_or("Unknown", |c| if c.status == "True" { "True" } else { "False" });

        let next_refresh = if token.spec.refresh {
            token
                .status
                .as_ref()
                .and_then(|s| s.next_refresh_time.clone())
                .unwrap_or_else(|| "-".to_string())
        } else {
            "disabled".to_string()
        };

        println!("{name:<30} {ns:<20} {lifetime:<10} {ready:<8} {next_refresh:<26}");
    }

    Ok(())
}
