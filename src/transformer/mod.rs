//! Command responses to collectd samples
//!
//! Each submodule turns one kind of command response into [`Sample`]s,
//! pushing them into a [`SampleBatch`]. A batch is only handed to a sink once
//! the whole poll succeeded.

pub mod db_stats;
pub mod formatter;
pub mod oplog;
pub mod replset;
pub mod server_status;

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub use formatter::{MetricType, PrometheusFormatter, PrometheusMetric, PutvalFormatter};

/// One value submitted to collectd
///
/// Identified the way collectd identifies values:
/// `plugin[-plugin_instance]/type[-type_instance]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub plugin: String,
    pub plugin_instance: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_instance: String,
    pub value: f64,
    /// Seconds since the Unix epoch
    pub time: f64,
}

/// Samples gathered during a single poll
#[derive(Debug)]
pub struct SampleBatch {
    plugin: &'static str,
    time: f64,
    samples: Vec<Sample>,
}

impl SampleBatch {
    /// Start a batch stamped with the current time
    pub fn new(plugin: &'static str) -> Self {
        Self::at(plugin, now())
    }

    /// Start a batch stamped with an explicit time
    pub fn at(plugin: &'static str, time: f64) -> Self {
        Self {
            plugin,
            time,
            samples: Vec::new(),
        }
    }

    /// Add one value
    pub fn submit(&mut self, plugin_instance: &str, type_name: &str, type_instance: &str, value: f64) {
        self.samples.push(Sample {
            plugin: self.plugin.to_string(),
            plugin_instance: plugin_instance.to_string(),
            type_name: type_name.to_string(),
            type_instance: type_instance.to_string(),
            value,
            time: self.time,
        });
    }

    /// Add a value if it is present
    pub fn submit_opt(
        &mut self,
        plugin_instance: &str,
        type_name: &str,
        type_instance: &str,
        value: Option<f64>,
    ) {
        if let Some(value) = value {
            self.submit(plugin_instance, type_name, type_instance, value);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Current time in seconds since the Unix epoch
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
pub(crate) fn find<'a>(samples: &'a [Sample], type_name: &str, type_instance: &str) -> Option<&'a Sample> {
    samples
        .iter()
        .find(|s| s.type_name == type_name && s.type_instance == type_instance)
}
