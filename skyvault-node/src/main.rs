//! SkyVault Devnet Daemon
//!
//! Runs a self-contained network:
//! - A local proof-of-work chain and a pool of in-memory hosts
//! - Funded renter and miner nodes
//! - Background mining on every miner until shutdown
//! - Periodic status logging and an optional Prometheus endpoint

use clap::Parser;
use futures::future::join_all;
use skyvault_node::{init_metrics, install_exporter, GroupParams, NodeConfig, NodeGroup};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyvaultd")]
#[command(about = "SkyVault devnet daemon")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "skyvault.toml")]
    config: PathBuf,

    /// Download directory (overrides config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Metrics HTTP port (overrides config file)
    #[arg(short, long)]
    metrics_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("SkyVault node starting...");

    // Priority: CLI args > environment > config file > defaults
    let config = NodeConfig::load_or_default(&cli.config)
        .with_env_overrides()
        .with_overrides(cli.data_dir, cli.metrics_port);

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
        return Err(e.into());
    }

    info!(
        node_name = %config.node.name,
        data_dir = ?config.node.data_dir,
        maturity_delay = config.consensus.maturity_delay,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        install_exporter(config.metrics.port)?;
    }
    init_metrics();

    let group = NodeGroup::new(GroupParams::from(&config.devnet), &config).await?;

    let cancel = CancellationToken::new();
    let miners: Vec<_> = group
        .miners()
        .iter()
        .map(|node| node.spawn_miner(cancel.child_token()))
        .collect();
    info!(miners = miners.len(), "Background mining started");

    info!("========================================");
    info!("  SkyVault Node Running");
    info!("========================================");
    info!("  Name:        {}", config.node.name);
    info!("  Hosts:       {}", group.host_network().host_ids().len());
    info!("  Renters:     {}", group.renters().len());
    info!("  Miners:      {}", group.miners().len());
    info!("  Height:      {}", group.chain().height());
    info!("  Data dir:    {}", config.node.data_dir.display());
    if config.metrics.enabled {
        info!(
            "  Metrics:     http://0.0.0.0:{}/metrics",
            config.metrics.port
        );
    }
    info!("========================================");
    info!("Press Ctrl+C to shut down");

    let status_interval = Duration::from_secs(config.node.status_interval_secs.max(1));
    tokio::select! {
        _ = report_status(&group, status_interval) => {}
        _ = shutdown_signal() => {}
    }

    cancel.cancel();
    for result in join_all(miners).await {
        if let Err(e) = result {
            error!(error = %e, "Miner task panicked");
        }
    }

    info!("SkyVault node shutdown complete");
    Ok(())
}

async fn report_status(group: &NodeGroup, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;

        let pruned: usize = group
            .renters()
            .iter()
            .filter_map(|node| node.renter().ok())
            .map(|renter| renter.prune_jobs())
            .sum();

        for node in group.nodes() {
            match (node.spendable_balance().await, node.immature_balance().await) {
                (Ok(spendable), Ok(immature)) => info!(
                    node = node.name(),
                    height = group.chain().height(),
                    spendable,
                    immature,
                    "Node status"
                ),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(node = node.name(), error = %e, "Failed to read balance")
                }
            }
        }

        info!(
            active_contracts = group.host_network().active_contracts(),
            stored_shards = group.host_network().stored_shards(),
            pruned_jobs = pruned,
            "Host network status"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
