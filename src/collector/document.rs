//! BSON document helpers
//!
//! Command responses are nested documents whose numeric leaves may be any of
//! several BSON number types. These helpers coerce them to plain numbers and
//! walk nested documents.

use mongodb::bson::{Bson, Document};

/// Coerce a BSON value to `f64`
///
/// Timestamps yield their seconds component, dates yield seconds since the
/// epoch, booleans yield 0 or 1.
pub fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(f) => Some(*f),
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => {
            if i.unsigned_abs() > (1u64 << 53) {
                tracing::debug!(
                    value = i,
                    "Large integer may lose precision when converted to f64"
                );
            }
            Some(*i as f64)
        }
        Bson::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Bson::Timestamp(ts) => Some(f64::from(ts.time)),
        Bson::DateTime(dt) => Some(dt.timestamp_millis() as f64 / 1000.0),
        _ => None,
    }
}

/// Coerce a BSON value to `i64`, truncating doubles
pub fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.is_finite() => Some(f.trunc() as i64),
        Bson::Boolean(b) => Some(i64::from(*b)),
        Bson::Timestamp(ts) => Some(i64::from(ts.time)),
        Bson::DateTime(dt) => Some(dt.timestamp_millis() / 1000),
        _ => None,
    }
}

/// Look up a dotted path (`"globalLock.currentQueue.total"`)
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Numeric value at a dotted path
pub fn number_at(doc: &Document, path: &str) -> Option<f64> {
    get_path(doc, path).and_then(as_f64)
}

/// Sub-document at a dotted path
pub fn document_at<'a>(doc: &'a Document, path: &str) -> Option<&'a Document> {
    match get_path(doc, path)? {
        Bson::Document(inner) => Some(inner),
        _ => None,
    }
}

/// Flatten every numeric leaf of a document into `(joined-key, value)` pairs
///
/// Keys of nested documents are joined with `separator`, depth first, in
/// document order. Strings, arrays and nulls are skipped.
pub fn flatten(doc: &Document, separator: &str) -> Vec<(String, f64)> {
    let mut result = Vec::new();
    flatten_inner(doc, "", separator, &mut result);
    result
}

fn flatten_inner(doc: &Document, prefix: &str, separator: &str, result: &mut Vec<(String, f64)>) {
    for (key, value) in doc {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", prefix, separator, key)
        };

        match value {
            Bson::Document(inner) => flatten_inner(inner, &name, separator, result),
            other => {
                if let Some(n) = as_f64(other) {
                    result.push((name, n));
                }
            }
        }
    }
}

/// Seconds component of a replica set member optime
///
/// Older servers report a bare `Timestamp`, newer ones `{ts: Timestamp, t: term}`.
pub fn optime_seconds(value: &Bson) -> Option<i64> {
    match value {
        Bson::Timestamp(ts) => Some(i64::from(ts.time)),
        Bson::Document(inner) => match inner.get("ts")? {
            Bson::Timestamp(ts) => Some(i64::from(ts.time)),
            _ => None,
        },
        _ => None,
    }
}

/// Compare a server version string against `major.minor`
///
/// Non-numeric suffixes (`"2.6.0-rc1"`) are ignored. An unparsable version
/// is treated as current, i.e. at least any requested version.
pub fn version_at_least(version: &str, major: u64, minor: u64) -> bool {
    let mut parts = version.split('.').map(|p| {
        p.chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<u64>()
    });

    match (parts.next(), parts.next()) {
        (Some(Ok(have_major)), Some(Ok(have_minor))) => (have_major, have_minor) >= (major, minor),
        (Some(Ok(have_major)), None) => have_major > major || (have_major == major && minor == 0),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, DateTime, Timestamp};

    #[test]
    fn test_as_f64_extreme_int64() {
        assert_eq!(as_f64(&Bson::Int64(i64::MIN)), Some(i64::MIN as f64));
        assert_eq!(as_f64(&Bson::Int64(i64::MAX)), Some(i64::MAX as f64));
    }

    #[test]
    fn test_as_f64_number_types() {
        assert_eq!(as_f64(&Bson::Int32(7)), Some(7.0));
        assert_eq!(as_f64(&Bson::Int64(1 << 40)), Some((1i64 << 40) as f64));
        assert_eq!(as_f64(&Bson::Double(2.5)), Some(2.5));
        assert_eq!(as_f64(&Bson::Boolean(true)), Some(1.0));
        assert_eq!(as_f64(&Bson::String("12".to_string())), None);
        assert_eq!(as_f64(&Bson::Null), None);
    }

    #[test]
    fn test_as_f64_time_types() {
        let ts = Bson::Timestamp(Timestamp {
            time: 1_700_000_000,
            increment: 3,
        });
        assert_eq!(as_f64(&ts), Some(1_700_000_000.0));

        let dt = Bson::DateTime(DateTime::from_millis(1_700_000_000_500));
        assert_eq!(as_f64(&dt), Some(1_700_000_000.5));
    }

    #[test]
    fn test_as_i64_truncates() {
        assert_eq!(as_i64(&Bson::Double(9.9)), Some(9));
        assert_eq!(as_i64(&Bson::Double(f64::NAN)), None);
        assert_eq!(as_i64(&Bson::Int32(-4)), Some(-4));
    }

    #[test]
    fn test_get_path() {
        let status = doc! {
            "globalLock": {
                "totalTime": 1000_i64,
                "currentQueue": { "total": 2, "readers": 1 }
            }
        };

        assert_eq!(number_at(&status, "globalLock.totalTime"), Some(1000.0));
        assert_eq!(number_at(&status, "globalLock.currentQueue.readers"), Some(1.0));
        assert!(get_path(&status, "globalLock.missing").is_none());
        assert!(get_path(&status, "globalLock.totalTime.deeper").is_none());
        assert!(document_at(&status, "globalLock.currentQueue").is_some());
        assert!(document_at(&status, "globalLock.totalTime").is_none());
    }

    #[test]
    fn test_flatten_nested() {
        let apply = doc! {
            "batches": { "num": 10, "totalMillis": 4 },
            "ops": 120_i64,
            "attemptsToBecomeSecondary": 1,
            "label": "ignored",
            "list": [1, 2]
        };

        let flat = flatten(&apply, "-");

        assert_eq!(
            flat,
            vec![
                ("batches-num".to_string(), 10.0),
                ("batches-totalMillis".to_string(), 4.0),
                ("ops".to_string(), 120.0),
                ("attemptsToBecomeSecondary".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn test_optime_seconds_both_layouts() {
        let bare = Bson::Timestamp(Timestamp {
            time: 500,
            increment: 1,
        });
        let ts = Timestamp {
            time: 480,
            increment: 1,
        };
        let wrapped = Bson::Document(doc! { "ts": ts, "t": 3_i64 });

        assert_eq!(optime_seconds(&bare), Some(500));
        assert_eq!(optime_seconds(&wrapped), Some(480));
        assert_eq!(optime_seconds(&Bson::Int32(5)), None);
    }

    #[test]
    fn test_version_at_least() {
        assert!(version_at_least("2.4.0", 2, 4));
        assert!(version_at_least("2.6.12", 2, 4));
        assert!(version_at_least("3.0.0-rc1", 2, 4));
        assert!(!version_at_least("2.2.7", 2, 4));
        assert!(!version_at_least("1.8", 2, 4));
        assert!(version_at_least("garbage", 2, 4));
    }
}
