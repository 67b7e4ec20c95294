//! Shroud-Relay node entry point.
//!
//! Startup failures (bad configuration, unresolvable key material, store
//! upcheck failure) terminate the process with exit code 2 so supervisors
//! can tell them apart from runtime crashes.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_runtime::{NodeConfig, RelayNode};

/// Exit code for unrecoverable startup failures.
const EXIT_STARTUP_FAILURE: u8 = 2;

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SR_CONFIG").ok())
        .unwrap_or_else(|| "shroud-relay.toml".to_string())
        .into()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let path = config_path();
    let config = match NodeConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e:#}");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    let node = match RelayNode::build(config).await {
        Ok(node) => node,
        Err(e) => {
            error!("failed to build node: {e:#}");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    if !node.upcheck() {
        error!("transaction store upcheck failed");
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    if let Err(e) = node.start().await {
        error!("failed to start node: {e:#}");
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    info!("node is running; press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }

    node.shutdown().await;
    ExitCode::SUCCESS
}
