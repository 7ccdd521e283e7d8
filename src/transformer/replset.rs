//! replSetGetStatus samples
//!
//! Members are labelled so that the connected member always reads as
//! `self-<port>` regardless of which host the collector runs on.

use mongodb::bson::{Bson, Document};
use once_cell::sync::Lazy;
use regex::Regex;

use super::SampleBatch;
use crate::collector::document::{as_f64, optime_seconds};
use crate::collector::CollectResult;
use crate::error::CollectorError;
use crate::tracker::replication_lag;

const COMMAND: &str = "replSetGetStatus";

static IPV4_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid IPv4 pattern"));

/// Label of a replica set member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLabel {
    pub name: String,
    pub port: String,
}

impl MemberLabel {
    /// Derive the label from the member's `host:port` name
    ///
    /// The connected member becomes `self-<port>`, IP-addressed members keep
    /// the full address, others are shortened to their first DNS label.
    pub fn new(member: &str, is_self: bool) -> Self {
        let (host, port) = member.rsplit_once(':').unwrap_or((member, "27017"));

        let name = if is_self {
            format!("self-{}", port)
        } else if IPV4_HOST.is_match(host) {
            format!("{}-{}", host, port)
        } else {
            let short = host.split('.').next().unwrap_or(host);
            format!("{}-{}", short, port)
        };

        Self {
            name,
            port: port.to_string(),
        }
    }
}

/// Report a replSetGetStatus response
///
/// Samples use the replica set name as plugin instance.
///
/// # Errors
/// Fails when `set`, `myState` or `members` is missing.
pub fn status(rs_status: &Document, batch: &mut SampleBatch) -> CollectResult<()> {
    let set = rs_status
        .get_str("set")
        .map_err(|_| CollectorError::missing(COMMAND, "set"))?;
    let my_state = rs_status
        .get("myState")
        .and_then(as_f64)
        .ok_or_else(|| CollectorError::missing(COMMAND, "myState"))?;
    let members = rs_status
        .get_array("members")
        .map_err(|_| CollectorError::missing(COMMAND, "members"))?;

    batch.submit(set, "my_state", "value", my_state);
    batch.submit_opt(set, "term", "value", rs_status.get("term").and_then(as_f64));
    batch.submit_opt(
        set,
        // existing collectd graphs key on this spelling
        "hearbeat_interval_ms",
        "value",
        rs_status.get("heartbeatIntervalMillis").and_then(as_f64),
    );
    batch.submit(set, "member", "count", members.len() as f64);

    let mut primary_optime = None;
    let mut self_optime = None;
    let mut self_port = None;

    for member in members {
        let Bson::Document(member) = member else {
            continue;
        };
        let Ok(name) = member.get_str("name") else {
            tracing::debug!(set = %set, "Skipping replica set member without a name");
            continue;
        };

        let is_primary = member.get_str("stateStr").map(|s| s == "PRIMARY").unwrap_or(false);
        let is_self = member.get_bool("self").unwrap_or(false);
        let label = MemberLabel::new(name, is_self);
        let n = &label.name;

        if is_self {
            self_port = Some(label.port.clone());
        }

        for (field, suffix) in [("uptime", "uptime"), ("state", "state"), ("health", "health")] {
            batch.submit_opt(
                set,
                "member",
                &format!("{}-{}", n, suffix),
                member.get(field).and_then(as_f64),
            );
        }

        batch.submit_opt(
            set,
            "member",
            &format!("{}.election_time", n),
            member.get("electionTime").and_then(as_f64),
        );

        if let Some(optime) = member.get("optime").and_then(optime_seconds) {
            batch.submit(set, "member", &format!("{}-optime_date", n), optime as f64);
            if is_primary {
                primary_optime = Some(optime);
            }
            if is_self {
                self_optime = Some(optime);
            }
        }

        for (field, suffix) in [
            ("lastHeartbeat", "last_heartbeat"),
            ("lastHeartbeatRecv", "last_heartbeat_recv"),
            ("pingMs", "ping_ms"),
        ] {
            batch.submit_opt(
                set,
                "member",
                &format!("{}-{}", n, suffix),
                member.get(field).and_then(as_f64),
            );
        }
    }

    if let (Some(lag), Some(port)) = (replication_lag(primary_optime, self_optime), self_port) {
        batch.submit(
            set,
            "member",
            &format!("self-{}-replication_lag", port),
            lag as f64,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::find;
    use mongodb::bson::{doc, DateTime, Timestamp};

    fn ts(time: u32) -> Timestamp {
        Timestamp { time, increment: 1 }
    }

    fn rs_status(self_optime: u32) -> Document {
        let primary_optime = ts(500);
        let own_optime = ts(self_optime);
        let election = ts(100);
        let heartbeat = DateTime::from_millis(1_700_000_000_000);

        doc! {
            "set": "rs0",
            "myState": 2,
            "term": 7_i64,
            "heartbeatIntervalMillis": 2000_i64,
            "members": [
                {
                    "name": "db1.example.com:27017",
                    "stateStr": "PRIMARY",
                    "state": 1,
                    "health": 1.0,
                    "uptime": 900,
                    "optime": { "ts": primary_optime, "t": 7_i64 },
                    "electionTime": election,
                    "lastHeartbeat": heartbeat,
                    "pingMs": 3_i64
                },
                {
                    "name": "db2.example.com:27018",
                    "stateStr": "SECONDARY",
                    "self": true,
                    "state": 2,
                    "health": 1.0,
                    "uptime": 800,
                    "optime": { "ts": own_optime, "t": 7_i64 }
                },
                {
                    "name": "10.0.0.7:27017",
                    "stateStr": "ARBITER",
                    "state": 7,
                    "health": 0.0,
                    "uptime": 0
                }
            ]
        }
    }

    #[test]
    fn test_member_labels() {
        assert_eq!(MemberLabel::new("db1.example.com:27017", false).name, "db1-27017");
        assert_eq!(MemberLabel::new("db1.example.com:27018", true).name, "self-27018");
        assert_eq!(MemberLabel::new("10.0.0.7:27017", false).name, "10.0.0.7-27017");
        assert_eq!(MemberLabel::new("10.0.0.7:27017", true).name, "self-27017");
        assert_eq!(MemberLabel::new("standalone", false).name, "standalone-27017");
    }

    #[test]
    fn test_status_samples() {
        let mut batch = SampleBatch::at("mongodb_replset", 0.0);
        status(&rs_status(480), &mut batch).unwrap();
        let samples = batch.into_samples();

        assert!(samples.iter().all(|s| s.plugin_instance == "rs0"));
        assert_eq!(find(&samples, "my_state", "value").unwrap().value, 2.0);
        assert_eq!(find(&samples, "term", "value").unwrap().value, 7.0);
        assert_eq!(find(&samples, "hearbeat_interval_ms", "value").unwrap().value, 2000.0);
        assert_eq!(find(&samples, "member", "count").unwrap().value, 3.0);
        assert_eq!(find(&samples, "member", "db1-27017-uptime").unwrap().value, 900.0);
        assert_eq!(find(&samples, "member", "db1-27017.election_time").unwrap().value, 100.0);
        assert_eq!(find(&samples, "member", "db1-27017-optime_date").unwrap().value, 500.0);
        assert_eq!(
            find(&samples, "member", "db1-27017-last_heartbeat").unwrap().value,
            1_700_000_000.0
        );
        assert_eq!(find(&samples, "member", "self-27018-state").unwrap().value, 2.0);
        assert_eq!(find(&samples, "member", "10.0.0.7-27017-health").unwrap().value, 0.0);
        assert!(find(&samples, "member", "10.0.0.7-27017-optime_date").is_none());
    }

    #[test]
    fn test_replication_lag_emitted() {
        let mut batch = SampleBatch::at("mongodb_replset", 0.0);
        status(&rs_status(480), &mut batch).unwrap();

        let lag = find(batch.samples(), "member", "self-27018-replication_lag").unwrap();
        assert_eq!(lag.value, 20.0);
    }

    #[test]
    fn test_replication_lag_requires_both_optimes() {
        let no_primary = doc! {
            "set": "rs0",
            "myState": 2,
            "members": [
                { "name": "db2:27017", "stateStr": "SECONDARY", "self": true, "optime": ts(480) }
            ]
        };

        let mut batch = SampleBatch::at("mongodb_replset", 0.0);
        status(&no_primary, &mut batch).unwrap();

        assert!(find(batch.samples(), "member", "self-27017-optime_date").is_some());
        assert!(batch.samples().iter().all(|s| !s.type_instance.ends_with("replication_lag")));
    }

    #[test]
    fn test_missing_identity_fields() {
        let mut batch = SampleBatch::at("mongodb_replset", 0.0);

        let err = status(&doc! { "myState": 1, "members": [] }, &mut batch).unwrap_err();
        assert!(matches!(err, CollectorError::MissingField { ref field, .. } if field == "set"));

        let err = status(&doc! { "set": "rs0", "myState": 1 }, &mut batch).unwrap_err();
        assert!(matches!(err, CollectorError::MissingField { ref field, .. } if field == "members"));
    }
}
