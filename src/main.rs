//! starload: loads one sales extract into the warehouse star schema.
//!
//! The triggering object is given either as a storage notification JSON file
//! (`--event`) or directly with `--bucket` and `--name`.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use starload::error::{
    AddressParseSnafu, ConfigSnafu, EventError, InvalidEventSnafu, MetricsSnafu,
    MissingEventSnafu, PipelineError,
};
use starload::{Config, StorageEvent, metrics, run_pipeline};

/// Sales extract to star schema loader.
#[derive(Parser, Debug)]
#[command(name = "starload")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a storage notification JSON file with `bucket` and `name`.
    #[arg(short, long, conflicts_with_all = ["bucket", "name"])]
    event: Option<PathBuf>,

    /// Bucket the object arrived in.
    #[arg(long, requires = "name")]
    bucket: Option<String>,

    /// Object key within the bucket.
    #[arg(long, requires = "bucket")]
    name: Option<String>,

    /// Warehouse root, overriding `sink.path` from the configuration.
    #[arg(long)]
    sink_path: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration and event without processing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("starload starting");

    let config = build_config(&args)?;
    let event = build_event(&args).context(InvalidEventSnafu)?;

    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!(
            "Source: {}/{}",
            config.source.container_url(&event.bucket),
            event.name
        );
        info!("Sink: {}", config.sink.path);
        info!("Namespace: {}", config.sink.namespace);
        info!("Null keys: {:?}", config.transform.null_keys);
        info!("Configuration is valid");
        return Ok(());
    }

    let stats = run_pipeline(config, &event).await?;

    info!("Pipeline completed successfully");
    info!("  Rows read: {}", stats.rows_read);
    for table in &stats.tables {
        info!("  {}: {} rows", table.table_id, table.rows);
    }
    info!("  Tables written: {}", stats.tables_written());
    info!("  Bytes written: {}", stats.bytes_written());

    Ok(())
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).context(ConfigSnafu)?,
        None => Config::default(),
    };
    if let Some(sink_path) = &args.sink_path {
        config.sink.path = sink_path.clone();
    }
    config.validate().context(ConfigSnafu)?;
    Ok(config)
}

/// Resolve the trigger event from arguments.
fn build_event(args: &Args) -> Result<StorageEvent, EventError> {
    match (&args.event, &args.bucket, &args.name) {
        (Some(path), _, _) => StorageEvent::from_file(path),
        (None, Some(bucket), Some(name)) => StorageEvent::new(bucket.as_str(), name.as_str()),
        _ => MissingEventSnafu.fail(),
    }
}
