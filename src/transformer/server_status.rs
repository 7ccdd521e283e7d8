//! serverStatus samples
//!
//! The full profile walks every section the server reports; the simple
//! profile reports connections, network and opcounters only.

use mongodb::bson::{Bson, Document};

use super::SampleBatch;
use crate::collector::document::{as_f64, as_i64, document_at, flatten, number_at, version_at_least};
use crate::tracker::{IndexSample, LockSample, TrackerState};

/// serverStatus.metrics sections reported with lowercased names
const METRIC_SECTIONS: &[&str] = &["document", "operation", "queryExecutor", "record"];

/// Replication metric sections and the keys skipped in each
const REPL_SECTIONS: &[(&str, &[&str])] = &[
    ("executor", &["networkInterface", "shuttingDown"]),
    ("apply", &[]),
    ("network", &[]),
    ("preload", &[]),
    ("buffer", &[]),
];

const SIMPLE_OPCOUNTERS: &[&str] = &["getmore", "query", "insert", "update", "delete"];

/// Report every section of a serverStatus response
///
/// Returns the tracker state to keep for the next poll.
pub fn full(
    status: &Document,
    instance: &str,
    state: TrackerState,
    batch: &mut SampleBatch,
) -> TrackerState {
    batch.submit_opt(instance, "uptime", "value", number_at(status, "uptime"));

    if let Some(ops) = document_at(status, "opcounters") {
        for (op, value) in ops {
            if let Some(n) = as_f64(value) {
                batch.submit(instance, "total_operations", op, n);
                batch.submit(instance, "opcounters", op, n);
            }
        }
    }
    submit_flat(batch, instance, "opcounters_repl", document_at(status, "opcountersRepl"), &[]);

    for kind in ["resident", "virtual", "mapped"] {
        batch.submit_opt(instance, "memory", kind, number_at(status, &format!("mem.{}", kind)));
    }

    submit_flat(batch, instance, "asserts", document_at(status, "asserts"), &[]);
    batch.submit_opt(
        instance,
        "extra_info",
        "page_faults",
        number_at(status, "extra_info.page_faults"),
    );

    for kind in ["current", "available", "totalCreated"] {
        batch.submit_opt(
            instance,
            "connections",
            kind,
            number_at(status, &format!("connections.{}", kind)),
        );
    }

    if let Some(metrics) = document_at(status, "metrics") {
        server_metrics(metrics, instance, batch);
    }

    if let Some(network) = document_at(status, "network") {
        for kind in ["bytesIn", "bytesOut", "numRequests"] {
            batch.submit_opt(instance, "bytes", kind, network.get(kind).and_then(as_f64));
        }
    }

    let mut state = state;

    if let Some(global_lock) = document_at(status, "globalLock") {
        state = global_lock_samples(global_lock, instance, state, batch);
    }

    if let Some(locks) = document_at(status, "locks") {
        lock_samples(locks, instance, batch);
    }

    if document_at(status, "indexCounters").is_some() {
        let version = status.get_str("version").unwrap_or_default();
        let counters = if version_at_least(version, 2, 4) {
            document_at(status, "indexCounters")
        } else {
            document_at(status, "indexCounters.btree")
        };

        if let Some(sample) = counters.and_then(index_sample) {
            let (next, metric) = state.observe_index(sample);
            batch.submit(instance, metric.series, &metric.instance, metric.value);
            state = next;
        }
    }

    state
}

/// Report connections, network traffic and the main opcounters
pub fn simple(status: &Document, instance: &str, batch: &mut SampleBatch) {
    batch.submit_opt(
        instance,
        "cnx_count",
        "current",
        number_at(status, "connections.current"),
    );
    batch.submit_opt(
        instance,
        "cnx_created_delta",
        "created_per_second",
        number_at(status, "connections.totalCreated"),
    );

    for kind in ["bytesIn", "bytesOut"] {
        batch.submit_opt(
            instance,
            "network",
            &format!("{}_per_sec", kind),
            number_at(status, &format!("network.{}", kind)),
        );
    }

    for op in SIMPLE_OPCOUNTERS {
        batch.submit_opt(
            instance,
            "opcounters",
            &format!("{}_per_sec", op),
            number_at(status, &format!("opcounters.{}", op)),
        );
    }
}

/// Flatten a section into `<type>/<key>` samples, nested keys joined by `-`
fn submit_flat(
    batch: &mut SampleBatch,
    instance: &str,
    type_name: &str,
    section: Option<&Document>,
    skip: &[&str],
) {
    let Some(section) = section else {
        return;
    };

    for (key, value) in section {
        if skip.contains(&key.as_str()) {
            continue;
        }
        match value {
            Bson::Document(inner) => {
                for (name, n) in flatten(inner, "-") {
                    batch.submit(instance, type_name, &format!("{}-{}", key, name), n);
                }
            }
            other => batch.submit_opt(instance, type_name, key, as_f64(other)),
        }
    }
}

fn server_metrics(metrics: &Document, instance: &str, batch: &mut SampleBatch) {
    for section in METRIC_SECTIONS {
        if let Some(doc) = document_at(metrics, section) {
            let type_name = format!("metrics_{}", section.to_lowercase());
            for (name, n) in flatten(doc, "-") {
                batch.submit(instance, &type_name, &name.to_lowercase(), n);
            }
        }
    }

    batch.submit_opt(
        instance,
        "metrics_get_last_error",
        "wtimeouts",
        number_at(metrics, "getLastError.wtimeouts"),
    );
    if let Some(wtime) = document_at(metrics, "getLastError.wtime") {
        for (name, n) in flatten(wtime, "-") {
            batch.submit(instance, "metrics_get_last_error", &format!("wtime-{}", name), n);
        }
    }

    batch.submit_opt(
        instance,
        "metrics_cursor",
        "timed_out",
        number_at(metrics, "cursor.timedOut"),
    );
    if let Some(open) = document_at(metrics, "cursor.open") {
        for (name, n) in flatten(open, "-") {
            batch.submit(instance, "metrics_cursor", &format!("open-{}", name), n);
        }
    }

    if let Some(repl) = document_at(metrics, "repl") {
        for (section, skip) in REPL_SECTIONS {
            let type_name = format!("metrics_repl_{}", section);
            submit_flat(batch, instance, &type_name, document_at(repl, section), skip);
        }
    }

    if let Some(storage) = document_at(metrics, "storage") {
        for (engine, stats) in storage {
            if let Bson::Document(stats) = stats {
                let type_name = format!("metrics_storage_{}", engine);
                for (name, n) in flatten(stats, "-") {
                    batch.submit(instance, &type_name, &name, n);
                }
            }
        }
    }

    submit_flat(batch, instance, "metrics_ttl", document_at(metrics, "ttl"), &[]);
}

fn global_lock_samples(
    global_lock: &Document,
    instance: &str,
    state: TrackerState,
    batch: &mut SampleBatch,
) -> TrackerState {
    let lock_time = global_lock.get("lockTime").and_then(as_f64);
    let total_time = global_lock.get("totalTime").and_then(as_f64);

    if global_lock.contains_key("lockTime") {
        // servers before 3.2 report cumulative lock time
        let (Some(lock_time), Some(total_time)) = (lock_time, total_time) else {
            return state;
        };

        let (next, metric) = state.observe_lock(LockSample {
            lock_time,
            total_time,
        });
        if let Some(metric) = metric {
            batch.submit(instance, metric.series, &metric.instance, metric.value);
        }
        return next;
    }

    batch.submit_opt(instance, "global_lock", "total_time", total_time);
    for section in ["currentQueue", "activeClients"] {
        if let Some(doc) = document_at(global_lock, section) {
            let prefix = section.to_lowercase();
            for (name, n) in flatten(doc, "-") {
                batch.submit(instance, "global_lock", &format!("{}-{}", prefix, name), n);
            }
        }
    }

    state
}

fn lock_samples(locks: &Document, instance: &str, batch: &mut SampleBatch) {
    for (resource, stats) in locks {
        let Bson::Document(stats) = stats else {
            continue;
        };

        let type_name = if resource == "." {
            "locks".to_string()
        } else {
            format!("locks_{}", resource.to_lowercase())
        };

        for (counter, grouping) in stats {
            let Bson::Document(grouping) = grouping else {
                continue;
            };

            for (mode, value) in grouping {
                let instance_name = format!("{}-{}", counter.to_lowercase(), lock_mode_label(mode));
                batch.submit_opt(instance, &type_name, &instance_name, as_f64(value));
            }
        }
    }
}

fn lock_mode_label(mode: &str) -> &str {
    match mode {
        "r" => "intent-shared-read",
        "w" => "intent-excl-write",
        "R" => "shared-read",
        "W" => "excl-write",
        other => other,
    }
}

fn index_sample(counters: &Document) -> Option<IndexSample> {
    Some(IndexSample {
        accesses: counters.get("accesses").and_then(as_i64)?,
        misses: counters.get("misses").and_then(as_i64),
    })
}
