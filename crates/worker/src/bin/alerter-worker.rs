//! alerter-worker: runs the enabled polling alerters.
//!
//! Subscribes to:
//! - `alerts.trigger.changed`: trigger change batches
//!
//! Publishes (when `--health-endpoint` is set):
//! - `alerts.worker.health`: periodic heartbeats

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use alerter_bus::{EventPublisher, Transport, WorkerBuilder, WorkerRunner, ZmqChangeFeed, ZmqPublisher};
use alerter_core::{load_dotenv, Properties};
use alerter_scheduler::Collaborators;
use alerter_worker::{registry, AlerterWorker, HttpDefinitions, HttpSink, ALERTERS};

const WORKER_NAME: &str = "alerter-worker";

// ── CLI ─────────────────────────────────────────────────────────────

/// Polls external telemetry systems for every tagged trigger.
#[derive(Parser, Debug)]
#[command(name = "alerter-worker", version, about)]
struct Cli {
    /// TOML file of global properties (`[alerts]` table).
    #[arg(long, env = "ALERTS_PROPERTIES")]
    properties: Option<PathBuf>,

    /// Base URL of the trigger definitions service.
    #[arg(long, env = "ALERTS_DEFINITIONS_URL", default_value = "http://localhost:8080")]
    definitions_url: String,

    /// Base URL of the record ingestion service.
    #[arg(long, env = "ALERTS_SINK_URL", default_value = "http://localhost:8080")]
    sink_url: String,

    /// ZeroMQ endpoint publishing trigger changes (`tcp://host:port` or `ipc://name`).
    #[arg(long, env = "ALERTS_FEED_ENDPOINT", default_value = "tcp://127.0.0.1:5560")]
    feed_endpoint: String,

    /// ZeroMQ endpoint receiving heartbeats. No heartbeats when unset.
    #[arg(long, env = "ALERTS_HEALTH_ENDPOINT")]
    health_endpoint: Option<String>,

    /// Heartbeat interval in seconds.
    #[arg(long, env = "ALERTS_HEALTH_INTERVAL", default_value_t = 30)]
    health_interval: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "ALERTS_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let properties = Properties::load_optional(cli.properties.as_deref())?;
    properties.log_summary();

    let feed_transport: Transport = cli.feed_endpoint.parse()?;
    let feed = Arc::new(ZmqChangeFeed::connect(&feed_transport).await?);
    feed.start().await?;

    let collaborators = Collaborators {
        definitions: Arc::new(HttpDefinitions::new(&cli.definitions_url)?),
        feed: feed.clone(),
        sink: Arc::new(HttpSink::new(&cli.sink_url)?),
        properties: Arc::new(properties),
    };
    let alerters = registry::build_enabled(ALERTERS, &collaborators)?;
    let worker = Arc::new(AlerterWorker::new(WORKER_NAME, alerters));

    let publisher: Option<Arc<dyn EventPublisher>> = match &cli.health_endpoint {
        Some(endpoint) => {
            let transport: Transport = endpoint.parse()?;
            Some(Arc::new(ZmqPublisher::connect(&transport).await?))
        }
        None => None,
    };

    let runner_config = WorkerBuilder::new(WORKER_NAME)
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .build();

    info!(definitions = %cli.definitions_url, sink = %cli.sink_url, feed = %feed_transport, "alerter-worker starting");
    let result = WorkerRunner::run(worker, publisher, runner_config, None).await;
    feed.stop().await;
    result?;
    info!("alerter-worker exited cleanly");

    Ok(())
}
