//! # Watch Loop
//!
//! Runs `kube_runtime::Controller` over `Token` resources and the Secrets they
//! own, restarting the watch when the stream fails or ends.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Token;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Label selector matching Secrets issued by this controller
const MANAGED_SECRETS_SELECTOR: &str = "app.kubernetes.io/managed-by=token-controller";

/// Run the controller until a shutdown signal arrives
///
/// On SIGINT/SIGTERM the readiness probe turns unhealthy and `shutdown` is
/// cancelled, which makes in-flight reconciliations return promptly.
///
/// # Errors
///
/// Currently never fails; the watch is restarted instead.
pub async fn run_watch_loop(
    tokens: Api<Token>,
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    let backoff_ms = Arc::new(AtomicU64::new(controller_config.backoff_start_ms));

    let signal_shutdown = shutdown.clone();
    let signal_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown...");
        signal_state.set_ready(false);
        signal_shutdown.cancel();
    });

    while !shutdown.is_cancelled() {
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );
        info!("Starting controller watch loop...");
        let filter_config = Arc::clone(&controller_config);
        let filter_backoff = Arc::clone(&backoff_ms);

        Controller::new(tokens.clone(), watcher::Config::default().any_semantic())
            .owns(
                secrets.clone(),
                watcher::Config::default().labels(MANAGED_SECRETS_SELECTOR),
            )
            .with_config(
                controller::Config::default()
                    .concurrency(controller_config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(
                reconcile,
                handle_reconciliation_error,
                Arc::clone(&reconciler),
            )
            .filter_map(move |item| {
                let config = Arc::clone(&filter_config);
                let backoff = Arc::clone(&filter_backoff);
                async move {
                    match &item {
                        Ok((object, _)) => {
                            backoff.store(config.backoff_start_ms, Ordering::Relaxed);
                            debug!("Reconciled {}", object.name);
                            Some(item)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                config.backoff_max_ms,
                                config.watch_restart_delay_duration(),
                            )
                            .await
                            .then_some(item)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
