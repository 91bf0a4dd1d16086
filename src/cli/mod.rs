//! # tokenctl
//!
//! Command-line interface for the Token Controller.
//!
//! ## Usage
//!
//! ```bash
//! # List tokens in all namespaces
//! tokenctl list
//!
//! # List tokens in one namespace
//! tokenctl list --namespace slurm
//!
//! # Show status of a token
//! tokenctl status slurm-admin --namespace slurm
//!
//! # Trigger reconciliation of a token
//! tokenctl reconcile slurm-admin --namespace slurm
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;

mod list;
mod reconcile;
mod status;

/// Token Controller CLI
#[derive(Parser)]
#[command(name = "tokenctl")]
#[command(
    about = "Token Controller CLI",
    long_about = None,
    after_help = "\
Examples:
  tokenctl list
  tokenctl status slurm-admin --namespace slurm
  tokenctl reconcile slurm-admin --namespace slurm
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (all namespaces for `list` when omitted, "default" otherwise)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List Token resources
    List,
    /// Show status of a Token resource
    Status {
        /// Name of the Token resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Trigger reconciliation of a Token resource
    Reconcile {
        /// Name of the Token resource
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::List => list::list_command(client, cli.namespace).await,
        Commands::Status { name } => status::status_command(client, name, cli.namespace).await,
        Commands::Reconcile { name } => {
            reconcile::reconcile_command(client, name, cli.namespace).await
        }
    }
}
