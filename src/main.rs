//! # Token Controller
//!
//! Kubernetes controller that keeps HS256 auth tokens in Secrets valid.
//!
//! For every `Token` resource the controller:
//!
//! 1. **Issues** a signed token into the referenced Secret when it does not exist
//! 2. **Tracks expiry** by validating the stored token against the signing key
//! 3. **Rotates** the token once 80% of its lifetime has elapsed
//! 4. **Schedules itself** so rotation happens without an external trigger
//! 5. **Reports** the outcome of every attempt in the `Token` status

use anyhow::Result;
use token_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.tokens,
        init.secrets,
        init.reconciler,
        init.server_state,
        init.controller_config,
        init.shutdown,
    )
    .await
}
