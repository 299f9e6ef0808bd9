//! `fab-node`: runs one Fabrico node until Ctrl+C or a fatal consensus error.
//!
//! Usage: `fab-node [--config <path>]`. Logging follows `RUST_LOG`
//! (default `info`).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use node_runtime::{FabricationNode, NodeConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn config_path() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args.next().context("--config needs a path")?;
                path = Some(PathBuf::from(value));
            }
            other => bail!("unknown argument {other:?}; usage: fab-node [--config <path>]"),
        }
    }
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = NodeConfig::load(config_path()?.as_deref()).context("loading configuration")?;
    let node = FabricationNode::start(config)
        .await
        .context("starting node")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl+C")?;
            info!("Shutdown requested");
            node.shutdown();
        }
        fatal = node.fatal() => {
            node.shutdown();
            if let Some(diagnostic) = fatal {
                error!("Node halted: {}", diagnostic);
                bail!("consensus invariant violated: {diagnostic}");
            }
        }
    }
    Ok(())
}
