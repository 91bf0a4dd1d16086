//! # Initialization
//!
//! Controller startup: rustls provider, tracing, metrics, HTTP server and
//! Kubernetes client.

use crate::config::{load_config, ServerConfig, SharedControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::Token;
use crate::observability;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub tokens: Api<Token>,
    pub secrets: Api<Secret>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub controller_config: SharedControllerConfig,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Returns an error when the rustls provider, metrics, HTTP server or
/// Kubernetes client cannot be set up.
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let (controller_config, server_config) = load_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("token_controller={}", controller_config.log_level).into()
            }),
        )
        .init();

    info!("Starting Token Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Controller namespace: {}, field manager: {}, max concurrent reconciliations: {}",
        controller_config.controller_namespace,
        controller_config.field_manager,
        controller_config.max_concurrent_reconciliations
    );

    if controller_config.enable_metrics {
        observability::metrics::register_metrics().context("Failed to register metrics")?;
    }

    let server_state = Arc::new(ServerState::new());
    let server_port = server_config.metrics_port;
    let server_task_state = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_task_state).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let tokens: Api<Token> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client.clone());

    let controller_config = Arc::new(controller_config);
    let shutdown = CancellationToken::new();
    let reconciler = Arc::new(Reconciler::new(
        client,
        Arc::clone(&controller_config),
        shutdown.clone(),
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        tokens,
        secrets,
        reconciler,
        server_state,
        controller_config,
        shutdown,
    })
}

/// Wait for the HTTP server to bind before reconciling anything
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
