//! Derived metrics across polling cycles
//!
//! A few serverStatus values are monotonically increasing counters that are
//! only meaningful as a difference between two polls. [`TrackerState`] holds
//! the previous poll's raw values, one independent slot per quantity. The
//! `observe_*` methods are pure: they consume a state and a current reading
//! and return the next state together with the derived metric, if any.
//!
//! ```text
//! slot: None  --observe-->  Some(current)   (nothing / neutral value emitted)
//! slot: Some  --observe-->  Some(current)   (delta-based value emitted)
//! ```

/// Global lock counters, in microseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockSample {
    pub lock_time: f64,
    pub total_time: f64,
}

/// Index counters
///
/// `misses` may be reported as null by the server; it is then counted as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSample {
    pub accesses: i64,
    pub misses: Option<i64>,
}

/// A value computed from the current and previous polls
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetric {
    /// collectd type
    pub series: &'static str,
    /// collectd type instance
    pub instance: String,
    pub value: f64,
}

/// Previous-poll values for one monitored target
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerState {
    pub lock: Option<LockSample>,
    pub index: Option<IndexSample>,
}

impl TrackerState {
    /// Fresh state with every slot unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a global lock reading and derive the lock ratio
    pub fn observe_lock(self, current: LockSample) -> (Self, Option<DerivedMetric>) {
        let metric = lock_ratio(self.lock, current).map(|value| DerivedMetric {
            series: "percent",
            instance: "lock_ratio".to_string(),
            value,
        });

        (
            Self {
                lock: Some(current),
                ..self
            },
            metric,
        )
    }

    /// Record an index counter reading and derive the cache-miss ratio
    ///
    /// Always yields a metric; it is 0 whenever no valid delta exists.
    pub fn observe_index(self, current: IndexSample) -> (Self, DerivedMetric) {
        let metric = DerivedMetric {
            series: "cache_ratio",
            instance: "cache_misses".to_string(),
            value: cache_miss_ratio(self.index, current) as f64,
        };

        (
            Self {
                index: Some(current),
                ..self
            },
            metric,
        )
    }
}

/// Percentage of elapsed time the global lock was held between two polls
///
/// `None` on the first poll, and when the counters went backwards or total
/// time did not advance.
pub fn lock_ratio(previous: Option<LockSample>, current: LockSample) -> Option<f64> {
    let previous = previous?;

    if current.lock_time == previous.lock_time {
        return Some(0.0);
    }

    let lock_delta = current.lock_time - previous.lock_time;
    let total_delta = current.total_time - previous.total_time;

    if lock_delta < 0.0 || total_delta <= 0.0 {
        return None;
    }

    Some(lock_delta * 100.0 / total_delta)
}

/// Percentage of index accesses that missed the cache between two polls
pub fn cache_miss_ratio(previous: Option<IndexSample>, current: IndexSample) -> i64 {
    let accesses = previous
        .map(|p| current.accesses - p.accesses)
        .filter(|delta| *delta >= 0);

    let previous_misses = previous.and_then(|p| p.misses).unwrap_or(0);
    let misses = Some(current.misses.unwrap_or(0) - previous_misses).filter(|delta| *delta >= 0);

    match (accesses, misses) {
        (Some(accesses), Some(misses)) if accesses != 0 => {
            (misses as f64 * 100.0 / accesses as f64).floor() as i64
        }
        _ => 0,
    }
}

/// Seconds the connected member trails the primary
pub fn replication_lag(primary_optime: Option<i64>, self_optime: Option<i64>) -> Option<i64> {
    Some(primary_optime? - self_optime?)
}
