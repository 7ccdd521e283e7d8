//! Fixed-interval polling loop
//!
//! Polls run one at a time: the next tick is only awaited once the previous
//! poll and its submission have finished.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::metrics::PollMetrics;
use crate::plugin::ReadPlugin;
use crate::sink::MetricSink;

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Samples were handed to the sink
    Submitted(usize),
    /// The poll failed; nothing was submitted
    Failed,
}

/// Poll once and submit the samples
///
/// A failed poll is logged and counted, not returned: the next tick retries.
///
/// # Errors
/// Only a sink failure is an error.
pub async fn poll_once(
    plugin: &mut dyn ReadPlugin,
    sink: &mut dyn MetricSink,
    metrics: &PollMetrics,
) -> Result<PollOutcome, SinkError> {
    let name = plugin.name();
    let start = Instant::now();

    match plugin.read().await {
        Ok(samples) => {
            sink.submit(&samples)?;
            let elapsed = start.elapsed();
            metrics.record_success(name, elapsed.as_secs_f64(), samples.len());
            debug!(
                plugin = name,
                samples = samples.len(),
                duration_ms = elapsed.as_millis() as u64,
                "Samples submitted"
            );
            Ok(PollOutcome::Submitted(samples.len()))
        }
        Err(e) => {
            metrics.record_failure(name, start.elapsed().as_secs_f64());
            warn!(plugin = name, error = %e, "Poll failed, retrying next interval");
            Ok(PollOutcome::Failed)
        }
    }
}

/// Poll every `interval` until `shutdown` resolves
///
/// The first poll happens immediately.
pub async fn run<F>(
    plugin: &mut dyn ReadPlugin,
    sink: &mut dyn MetricSink,
    metrics: PollMetrics,
    interval: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        plugin = plugin.name(),
        interval_secs = interval.as_secs(),
        "Polling started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(plugin = plugin.name(), "Polling stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                poll_once(plugin, sink, &metrics)
                    .await
                    .context("Failed to submit samples")?;
            }
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectResult;
    use crate::error::CollectorError;
    use crate::transformer::{Sample, SampleBatch};
    use async_trait::async_trait;

    struct Scripted {
        results: Vec<bool>,
        reads: usize,
    }

    #[async_trait]
    impl ReadPlugin for Scripted {
        fn name(&self) -> &'static str {
            "mongodb"
        }

        async fn read(&mut self) -> CollectResult<Vec<Sample>> {
            let ok = self.results.get(self.reads).copied().unwrap_or(true);
            self.reads += 1;
            if !ok {
                return Err(CollectorError::missing("serverStatus", "uptime"));
            }
            let mut batch = SampleBatch::at("mongodb", 1.0);
            batch.submit("27017", "uptime", "value", self.reads as f64);
            Ok(batch.into_samples())
        }
    }

    #[tokio::test]
    async fn test_poll_once_submits() {
        let mut plugin = Scripted {
            results: vec![true],
            reads: 0,
        };
        let mut sink: Vec<Sample> = Vec::new();
        let metrics = PollMetrics::new();

        let outcome = poll_once(&mut plugin, &mut sink, &metrics).await.unwrap();

        assert_eq!(outcome, PollOutcome::Submitted(1));
        assert_eq!(sink.len(), 1);
        assert_eq!(metrics.plugin("mongodb").success_total.get(), 1);
    }

    #[tokio::test]
    async fn test_poll_once_failure_submits_nothing() {
        let mut plugin = Scripted {
            results: vec![false],
            reads: 0,
        };
        let mut sink: Vec<Sample> = Vec::new();
        let metrics = PollMetrics::new();

        let outcome = poll_once(&mut plugin, &mut sink, &metrics).await.unwrap();

        assert_eq!(outcome, PollOutcome::Failed);
        assert!(sink.is_empty());
        assert_eq!(metrics.plugin("mongodb").failure_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let mut plugin = Scripted {
            results: vec![true, false, true],
            reads: 0,
        };
        let mut sink: Vec<Sample> = Vec::new();
        let metrics = PollMetrics::new();

        let shutdown = tokio::time::sleep(Duration::from_millis(2500));
        run(
            &mut plugin,
            &mut sink,
            metrics.clone(),
            Duration::from_secs(1),
            shutdown,
        )
        .await
        .unwrap();

        // ticks at 0s, 1s and 2s
        assert_eq!(plugin.reads, 3);
        assert_eq!(sink.len(), 2);
        assert_eq!(metrics.plugin("mongodb").failure_total.get(), 1);
    }
}
