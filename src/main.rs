use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stackconn_client::{DialerMode, init_dialer_mode};
use stackconn_core::Target;
use stackconn_core::bootstrap::{build_factory, create_credentials};
use stackconn_core::config::{Config, ForwardRule};

/// Connect to an Elasticsearch cluster running in Kubernetes and report its health.
#[derive(Debug, Parser)]
#[command(name = "stackconn", version)]
struct Cli {
    /// Name of the Elasticsearch cluster (stack) to reach.
    #[arg(long)]
    cluster: String,

    /// Namespace the cluster runs in.
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Path to the TOML config file.
    #[arg(long, env = "STACKCONN_CONFIG", default_value = "config/stackconn.toml")]
    config: PathBuf,

    /// Reach services through local port-forwards (dev use only: exposes
    /// cluster services on local ports).
    #[arg(long)]
    auto_port_forward: bool,

    /// Established port-forward, `<service>:<port>=<local addr>`. Repeatable.
    #[arg(long = "forward", value_name = "RULE")]
    forwards: Vec<ForwardRule>,

    /// Vault backend override (`env` or `age`).
    #[arg(long)]
    vault: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if cli.auto_port_forward {
        config.dialer.auto_port_forward = true;
    }
    config.dialer.forwards.extend(cli.forwards);
    if let Some(backend) = cli.vault {
        config.vault.backend = backend;
    }
    config.validate()?;

    // Fixed before any client exists; never changed afterwards.
    let mode = config.dialer_mode();
    if let Err(existing) = init_dialer_mode(mode) {
        anyhow::bail!("dialer mode already initialized to {existing:?}");
    }
    if mode == DialerMode::Forwarding && config.dialer.forwards.is_empty() {
        tracing::warn!("auto port-forward enabled but no forwards configured");
    }

    let credentials = create_credentials(&config.vault)?;
    let factory = build_factory(&config)?;
    let target = Target::new(cli.cluster, cli.namespace);

    let client = factory
        .new_client(&target, &credentials)
        .await
        .with_context(|| format!("failed to create client for cluster {}", target.cluster_name))?;

    let health = client
        .cluster_health()
        .await
        .with_context(|| format!("health check against {} failed", client.address()))?;

    tracing::info!(
        cluster = %health.cluster_name,
        status = %health.status,
        nodes = health.number_of_nodes,
        "cluster health"
    );
    println!("{} {} ({} nodes)", health.cluster_name, health.status, health.number_of_nodes);
    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
