//! Atlas Exporter binary
//!
//! Exposes the measurements of a MongoDB Atlas project for Prometheus.

use anyhow::Context;
use atlas_exporter::{
    AtlasConfig, CollectorRegistry, ExporterConfig, HttpAtlasClient, Reconciler, WebConfig,
    DEFAULT_RECONCILE_INTERVAL_SECS,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "atlas_exporter")]
#[command(about = "Prometheus exporter for MongoDB Atlas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
struct Cli {
    /// Address to serve metrics on
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:9905")]
    listen_address: String,

    /// Atlas API public key
    #[arg(long = "atlas.public-key", env = "ATLAS_PUBLIC_KEY")]
    public_key: String,

    /// Atlas API private key
    #[arg(long = "atlas.private-key", env = "ATLAS_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Atlas project id
    #[arg(long = "atlas.project-id", env = "ATLAS_PROJECT_ID")]
    project_id: String,

    /// Cluster to export, repeatable; all clusters when omitted
    #[arg(long = "atlas.cluster")]
    clusters: Vec<String>,

    /// Atlas API base URL
    #[arg(
        long = "atlas.base-url",
        env = "ATLAS_BASE_URL",
        default_value = atlas_exporter::config::DEFAULT_ATLAS_BASE_URL
    )]
    base_url: String,

    /// Seconds between two process listings
    #[arg(long, env = "RECONCILE_INTERVAL", default_value_t = DEFAULT_RECONCILE_INTERVAL_SECS)]
    reconcile_interval: u64,

    /// Log level
    #[arg(
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug"]
    )]
    log_level: String,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn config(&self) -> anyhow::Result<ExporterConfig> {
        let web = WebConfig::from_listen_address(&self.listen_address)?;
        let atlas = AtlasConfig::new(&self.public_key, &self.private_key, &self.project_id)
            .with_base_url(&self.base_url)
            .with_clusters(self.clusters.clone());

        let config = ExporterConfig::new(web, atlas)
            .with_reconcile_interval(Duration::from_secs(self.reconcile_interval));
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = cli.config().context("invalid configuration")?;
    info!(
        project = %config.atlas.project_id,
        clusters = ?config.atlas.clusters,
        interval = ?config.reconcile_interval,
        "starting atlas exporter"
    );

    let client = Arc::new(HttpAtlasClient::new(config.atlas.clone()).context("failed to build Atlas client")?);
    let registry = Arc::new(CollectorRegistry::new());
    let reconciler = Reconciler::new(client, registry.clone()).context("failed to set up reconciler")?;

    let interval = config.reconcile_interval;
    let reconciling = tokio::spawn(async move { reconciler.run(interval).await });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("shutting down");
    };

    let served = atlas_exporter::start_web_server(config.web, registry, shutdown).await;
    reconciling.abort();
    served.context("web server failed")?;

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let builder = FmtSubscriber::builder()
        .with_env_filter(log_filter(&cli.log_level, rust_log.as_deref()))
        .with_target(false);

    if cli.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.compact().finish())?;
    }

    Ok(())
}

/// `RUST_LOG` wins when set and valid; `--log-level` applies otherwise.
fn log_filter(log_level: &str, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(log_level))
}
