//! mongo-collectd - MongoDB statistics for collectd
//!
//! Runs as a collectd exec plugin (PUTVAL lines on stdout) or as a
//! standalone Prometheus endpoint.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use mongo_collectd::cli::Cli;
use mongo_collectd::collector::MongoSource;
use mongo_collectd::config::{Config, OutputFormat};
use mongo_collectd::metrics::PollMetrics;
use mongo_collectd::plugin::{self, ReadPlugin};
use mongo_collectd::scheduler::{self, shutdown_signal, PollOutcome};
use mongo_collectd::server::{self, AppState};
use mongo_collectd::sink::{MetricSink, PutvalSink, Snapshot, SnapshotSink};
use mongo_collectd::transformer::PrometheusFormatter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    mongo_collectd::init_logging(&cli.log_level.to_string(), cli.log_format)?;

    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply_overrides(&mut config)?;
    config.validate()?;

    if cli.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        plugin = config.collect.plugin.as_str(),
        "Starting mongo-collectd"
    );

    let source = MongoSource::new(&config.mongodb).context("Failed to create MongoDB client")?;
    info!(address = %source.address(), "MongoDB client ready");

    let mut plugin = plugin::build(
        config.collect.plugin,
        Arc::new(source),
        &config.mongodb,
        &config.collect,
    );
    let interval = Duration::from_secs(config.collect.interval_secs);
    let metrics = PollMetrics::new();

    match config.output.format {
        OutputFormat::Putval => {
            let hostname = resolve_hostname(&config);
            let mut sink = PutvalSink::new(io::stdout(), hostname, config.collect.interval_secs);

            if cli.once {
                return poll_once(plugin.as_mut(), &mut sink, &metrics).await;
            }

            scheduler::run(plugin.as_mut(), &mut sink, metrics, interval, shutdown_signal()).await
        }
        OutputFormat::Prometheus => {
            let snapshot = Snapshot::new();
            let mut sink = SnapshotSink::new(plugin.name(), snapshot.clone());

            if cli.once {
                poll_once(plugin.as_mut(), &mut sink, &metrics).await?;
                print!("{}", PrometheusFormatter::new().format_samples(&snapshot.samples()));
                return Ok(());
            }

            let state = AppState {
                config: Arc::new(config),
                snapshot,
                metrics: metrics.clone(),
            };

            tokio::try_join!(
                scheduler::run(plugin.as_mut(), &mut sink, metrics, interval, shutdown_signal()),
                server::run(state, shutdown_signal()),
            )?;
            Ok(())
        }
    }
}

async fn poll_once(
    plugin: &mut dyn ReadPlugin,
    sink: &mut dyn MetricSink,
    metrics: &PollMetrics,
) -> Result<()> {
    match scheduler::poll_once(plugin, sink, metrics).await? {
        PollOutcome::Submitted(_) => Ok(()),
        PollOutcome::Failed => anyhow::bail!("Poll of {} failed", plugin.name()),
    }
}

/// `--hostname`/`COLLECTD_HOSTNAME`, then the config file, then the system name
fn resolve_hostname(config: &Config) -> String {
    if let Some(hostname) = &config.output.hostname {
        return hostname.clone();
    }

    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!(error = %e, "Could not determine host name, using 'localhost'");
            "localhost".to_string()
        }
    }
}
