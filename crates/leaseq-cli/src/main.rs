use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use leaseq_core::impls::FileSnapshotStore;
use leaseq_core::ports::{Clock, SystemClock, UlidGenerator};
use leaseq_core::{QueueService, ReaperLoop, Server, ServerConfig};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "leaseq")]
#[command(about = "Lease-based task queue server", long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    ip: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the snapshot file
    #[arg(short = 'c', long)]
    checkpoint_dir: Option<PathBuf>,

    /// Lease duration in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Largest accepted payload in bytes
    #[arg(long)]
    max_payload_len: Option<usize>,

    /// Background sweep period in milliseconds (0 disables it)
    #[arg(long)]
    sweep_interval_ms: Option<u64>,

    /// Quiet time in milliseconds before an unterminated request is answered
    #[arg(long)]
    idle_timeout_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(ip) = self.ip {
            config.bind_addr = ip;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.checkpoint_dir {
            config.storage_dir = dir;
        }
        if let Some(secs) = self.timeout {
            config.lease_duration_secs = secs;
        }
        if let Some(max) = self.max_payload_len {
            config.max_payload_len = max;
        }
        if let Some(ms) = self.sweep_interval_ms {
            config.sweep_interval_ms = ms;
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.idle_timeout_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = args.into_config()?;
    tracing::info!(?config, "starting leaseq");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = QueueService::open(
        config.store_settings(),
        Arc::clone(&clock),
        Arc::new(UlidGenerator::new(clock)),
        Arc::new(FileSnapshotStore::new(&config.storage_dir)),
    )
    .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("ctrl-c received");
        let _ = shutdown_tx.send(true);
    });

    let reaper = config.sweep_interval().map(|interval| {
        let reaper = ReaperLoop::new(service.clone(), interval);
        tokio::spawn(reaper.run(wait_for_shutdown(shutdown_rx.clone())))
    });

    let server = Server::bind(&config.listen_addr(), service, config.max_line_len())
        .await?
        .with_idle_timeout(config.idle_timeout());
    server.run(wait_for_shutdown(shutdown_rx)).await?;

    if let Some(handle) = reaper {
        handle.await?;
    }
    tracing::info!("stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A dropped sender also counts as shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
}
