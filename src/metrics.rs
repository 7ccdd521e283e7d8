//! Poller self-observability
//!
//! Exposed next to the MongoDB samples on the Prometheus endpoint:
//!
//! - `mongo_collectd_poll_success_total{plugin="..."}`
//! - `mongo_collectd_poll_failure_total{plugin="..."}`
//! - `mongo_collectd_poll_duration_seconds_sum{plugin="..."}` and `_count`
//! - `mongo_collectd_last_poll_samples{plugin="..."}`
//! - `mongo_collectd_last_success_timestamp_seconds{plugin="..."}`
//! - `mongo_collectd_uptime_seconds`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use crate::transformer::{now, MetricType, PrometheusMetric};

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// f64 gauge stored as bits
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn set(&self, v: f64) {
        self.value.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }

    pub fn add(&self, v: f64) {
        // fetch_update only fails when the closure returns None
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + v).to_bits())
            });
    }
}

/// Counters for one plugin
#[derive(Debug, Default)]
pub struct PluginMetrics {
    pub success_total: Counter,
    pub failure_total: Counter,
    pub duration_seconds_sum: Gauge,
    pub duration_count: Counter,
    pub last_samples: Gauge,
    pub last_success_timestamp: Gauge,
}

impl PluginMetrics {
    fn observe_duration(&self, seconds: f64) {
        self.duration_seconds_sum.add(seconds);
        self.duration_count.inc();
    }
}

/// Registry shared between the scheduler and the HTTP server
#[derive(Debug, Clone)]
pub struct PollMetrics {
    plugins: Arc<RwLock<HashMap<String, Arc<PluginMetrics>>>>,
    started: Instant,
}

impl Default for PollMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PollMetrics {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(RwLock::new(HashMap::new())),
            started: Instant::now(),
        }
    }

    /// Metrics for `plugin`, created on first use
    pub fn plugin(&self, plugin: &str) -> Arc<PluginMetrics> {
        {
            let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(metrics) = plugins.get(plugin) {
                return Arc::clone(metrics);
            }
        }

        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(plugins.entry(plugin.to_string()).or_default())
    }

    pub fn record_success(&self, plugin: &str, duration_seconds: f64, samples: usize) {
        let metrics = self.plugin(plugin);
        metrics.success_total.inc();
        metrics.observe_duration(duration_seconds);
        metrics.last_samples.set(samples as f64);
        metrics.last_success_timestamp.set(now());
    }

    pub fn record_failure(&self, plugin: &str, duration_seconds: f64) {
        let metrics = self.plugin(plugin);
        metrics.failure_total.inc();
        metrics.observe_duration(duration_seconds);
    }

    /// Snapshot as Prometheus metrics, sorted by plugin name
    pub fn to_prometheus_metrics(&self) -> Vec<PrometheusMetric> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = plugins.keys().collect();
        names.sort();

        let mut per_series: Vec<Vec<PrometheusMetric>> = vec![Vec::new(); 6];

        for name in names {
            let m = &plugins[name];
            let series = [
                ("poll_success_total", MetricType::Counter, "Successful polls", m.success_total.get() as f64),
                ("poll_failure_total", MetricType::Counter, "Failed polls", m.failure_total.get() as f64),
                (
                    "poll_duration_seconds_sum",
                    MetricType::Counter,
                    "Total time spent polling",
                    m.duration_seconds_sum.get(),
                ),
                (
                    "poll_duration_seconds_count",
                    MetricType::Counter,
                    "Number of timed polls",
                    m.duration_count.get() as f64,
                ),
                (
                    "last_poll_samples",
                    MetricType::Gauge,
                    "Samples submitted by the last successful poll",
                    m.last_samples.get(),
                ),
                (
                    "last_success_timestamp_seconds",
                    MetricType::Gauge,
                    "Unix time of the last successful poll",
                    m.last_success_timestamp.get(),
                ),
            ];

            for (slot, (suffix, metric_type, help, value)) in per_series.iter_mut().zip(series) {
                slot.push(
                    PrometheusMetric::new(format!("mongo_collectd_{}", suffix), value)
                        .with_type(metric_type)
                        .with_help(help)
                        .with_label("plugin", name.as_str()),
                );
            }
        }

        let mut metrics: Vec<PrometheusMetric> = per_series.into_iter().flatten().collect();
        metrics.push(
            PrometheusMetric::new(
                "mongo_collectd_uptime_seconds",
                self.started.elapsed().as_secs_f64(),
            )
            .with_type(MetricType::Gauge)
            .with_help("Seconds since the collector started"),
        );
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(metrics: &[PrometheusMetric], name: &str, plugin: &str) -> Option<f64> {
        metrics
            .iter()
            .find(|m| m.name == name && m.labels.get("plugin").map(String::as_str) == Some(plugin))
            .map(|m| m.value)
    }

    #[test]
    fn test_counter_and_gauge() {
        let counter = Counter::default();
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);

        let gauge = Gauge::default();
        gauge.set(1.5);
        gauge.add(0.25);
        assert_eq!(gauge.get(), 1.75);
    }

    #[test]
    fn test_record_success_and_failure() {
        let metrics = PollMetrics::new();
        metrics.record_success("mongodb", 0.2, 42);
        metrics.record_failure("mongodb", 0.1);
        metrics.record_success("mongodb", 0.3, 40);

        let plugin = metrics.plugin("mongodb");
        assert_eq!(plugin.success_total.get(), 2);
        assert_eq!(plugin.failure_total.get(), 1);
        assert_eq!(plugin.duration_count.get(), 3);
        assert!((plugin.duration_seconds_sum.get() - 0.6).abs() < 1e-9);
        assert_eq!(plugin.last_samples.get(), 40.0);
        assert!(plugin.last_success_timestamp.get() > 0.0);
    }

    #[test]
    fn test_plugin_is_shared() {
        let metrics = PollMetrics::new();
        let clone = metrics.clone();
        clone.record_failure("mongodb_replset", 0.0);
        assert_eq!(metrics.plugin("mongodb_replset").failure_total.get(), 1);
    }

    #[test]
    fn test_to_prometheus_metrics() {
        let metrics = PollMetrics::new();
        metrics.record_success("mongodb", 0.5, 10);
        metrics.record_failure("mongodb_replset", 0.5);

        let exported = metrics.to_prometheus_metrics();

        assert_eq!(value(&exported, "mongo_collectd_poll_success_total", "mongodb"), Some(1.0));
        assert_eq!(
            value(&exported, "mongo_collectd_poll_failure_total", "mongodb_replset"),
            Some(1.0)
        );
        assert_eq!(value(&exported, "mongo_collectd_last_poll_samples", "mongodb"), Some(10.0));
        assert!(exported.iter().any(|m| m.name == "mongo_collectd_uptime_seconds"));

        // series of the same name stay adjacent
        let names: Vec<&str> = exported.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names[0], names[1]);
    }
}
