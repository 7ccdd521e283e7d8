//! dbStats and collStats samples

use mongodb::bson::Document;

use super::SampleBatch;
use crate::collector::document::{document_at, flatten, number_at};

/// plugin instance for per-database samples: `<port>-<database>`
pub fn instance(port: u16, database: &str) -> String {
    format!("{}-{}", port, database)
}

/// Object counts and file sizes from a dbStats response
pub fn database(stats: &Document, instance: &str, batch: &mut SampleBatch) {
    for (field, name) in [
        ("objects", "object_count"),
        ("collections", "collections"),
        ("numExtents", "num_extents"),
        ("indexes", "indexes"),
    ] {
        batch.submit_opt(instance, "counter", name, number_at(stats, field));
    }

    for (field, name) in [
        ("storageSize", "storage"),
        ("indexSize", "index"),
        ("dataSize", "data"),
    ] {
        batch.submit_opt(instance, "file_size", name, number_at(stats, field));
    }
}

/// WiredTiger cursor counters from a collStats response
pub fn collection(name: &str, stats: &Document, instance: &str, batch: &mut SampleBatch) {
    let Some(cursor) = document_at(stats, "wiredTiger.cursor") else {
        return;
    };

    for (key, value) in flatten(cursor, "-") {
        batch.submit(instance, "collection_stats", &format!("{}-{}", name, key), value);
    }
}
