//! Oplog window and size samples

use mongodb::bson::Document;

use super::SampleBatch;
use crate::collector::document::number_at;
use crate::collector::OplogBounds;

const MIB: f64 = 1024.0 * 1024.0;

/// Time span covered by the oplog
pub fn bounds(bounds: OplogBounds, batch: &mut SampleBatch) {
    let head = f64::from(bounds.head);
    let tail = f64::from(bounds.tail);

    batch.submit("", "oplog", "head_timestamp", head);
    batch.submit("", "oplog", "tail_timestamp", tail);
    batch.submit("", "oplog", "time_diff", tail - head);
}

/// Size figures from collStats on `local.oplog.rs`
pub fn stats(stats: &Document, batch: &mut SampleBatch) {
    batch.submit_opt("", "oplog", "items_total", number_at(stats, "count"));

    let size = number_at(stats, "size");
    batch.submit_opt("", "oplog", "current_size_bytes", size);
    batch.submit_opt("", "oplog", "storage_size_bytes", number_at(stats, "storageSize"));

    if let Some(max_size) = number_at(stats, "maxSize") {
        batch.submit("", "oplog", "log_size_mb", max_size / MIB);
    }

    if let Some(size) = size {
        batch.submit("", "oplog", "used_mb", ceil_hundredths(size / MIB));
    }
}

fn ceil_hundredths(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}
