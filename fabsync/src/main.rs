//! fabsyncd: fabric sync daemon.
//!
//! Loads declarative resource definitions from a manifest directory and
//! converges the remote control plane onto them on a fixed interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fabsync::cache::ResolutionCache;
use fabsync::daemon::SyncDaemon;
use fabsync_api::{ControlPlane, HttpControlPlane};

/// Fabric sync daemon
#[derive(Parser, Debug)]
#[command(name = "fabsyncd", version, about)]
struct Args {
    /// Control-plane base URL
    #[arg(long, default_value = "https://localhost:8443")]
    endpoint: String,

    /// Control-plane API token
    #[arg(long, env = "FABSYNC_TOKEN", hide_env_values = true, default_value = "")]
    token: String,

    /// Directory holding resource manifests
    #[arg(long, default_value = "/etc/fabsync/manifests")]
    manifest_dir: PathBuf,

    /// Reconcile interval in seconds
    #[arg(long, default_value = "15")]
    poll_interval: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    request_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fabsync=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting fabsyncd");
    info!("Control plane: {}", args.endpoint);

    let api: Arc<dyn ControlPlane> = Arc::new(
        HttpControlPlane::new(
            &args.endpoint,
            &args.token,
            Duration::from_secs(args.request_timeout),
        )
        .context("building control-plane client")?,
    );
    let cache = Arc::new(ResolutionCache::new(api.clone()));
    let daemon = SyncDaemon::new(
        api,
        cache,
        args.manifest_dir,
        Duration::from_secs(args.poll_interval),
    );

    tokio::select! {
        result = daemon.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    }
}
