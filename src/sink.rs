//! Destinations for completed polls
//!
//! A sink receives the samples of one successful poll at a time.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::SinkError;
use crate::transformer::{PutvalFormatter, Sample};

/// Receives the samples of each successful poll
pub trait MetricSink: Send {
    fn submit(&mut self, samples: &[Sample]) -> Result<(), SinkError>;
}

/// Writes collectd exec plugin `PUTVAL` lines
pub struct PutvalSink<W: Write + Send> {
    writer: W,
    formatter: PutvalFormatter,
}

impl<W: Write + Send> PutvalSink<W> {
    pub fn new(writer: W, hostname: impl Into<String>, interval: u64) -> Self {
        Self {
            writer,
            formatter: PutvalFormatter::new(hostname, interval),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> MetricSink for PutvalSink<W> {
    fn submit(&mut self, samples: &[Sample]) -> Result<(), SinkError> {
        for sample in samples {
            writeln!(self.writer, "{}", self.formatter.format_line(sample))?;
        }
        // collectd reads line by line; don't leave a poll sitting in a buffer
        self.writer.flush()?;
        Ok(())
    }
}

/// Latest samples per plugin, read by the HTTP server
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    inner: Arc<RwLock<Vec<(String, Vec<Sample>)>>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the samples held for `plugin`
    pub fn replace(&self, plugin: &str, samples: Vec<Sample>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.iter_mut().find(|(name, _)| name == plugin) {
            Some((_, held)) => *held = samples,
            None => inner.push((plugin.to_string(), samples)),
        }
    }

    /// Copy of every held sample
    pub fn samples(&self) -> Vec<Sample> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.iter().flat_map(|(_, s)| s.iter().cloned()).collect()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.iter().all(|(_, s)| s.is_empty())
    }
}

/// Sink feeding a [`Snapshot`]
pub struct SnapshotSink {
    plugin: String,
    snapshot: Snapshot,
}

impl SnapshotSink {
    pub fn new(plugin: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            plugin: plugin.into(),
            snapshot,
        }
    }
}

impl MetricSink for SnapshotSink {
    fn submit(&mut self, samples: &[Sample]) -> Result<(), SinkError> {
        self.snapshot.replace(&self.plugin, samples.to_vec());
        Ok(())
    }
}

/// Collects every submission, for tests
impl MetricSink for Vec<Sample> {
    fn submit(&mut self, samples: &[Sample]) -> Result<(), SinkError> {
        self.extend_from_slice(samples);
        Ok(())
    }
}
