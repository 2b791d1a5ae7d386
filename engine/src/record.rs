// engine/src/record.rs
//! Trace record parsing.
//!
//! Every pipeline stage emits instrumentation lines of the form
//!
//! ```text
//! eventTracker,<label>,<timestamp>,<eventKind>,<namespace>,<name>,<objectType>,<resourceVersion>
//! ```
//!
//! interleaved with ordinary log output. [`parse_line`] turns one such line
//! into a [`TraceRecord`], ignores anything that is not instrumentation, and
//! rejects instrumentation lines that cannot be trusted.

use std::num::ParseIntError;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, Source};

/// First field of every instrumentation line.
pub const SENTINEL: &str = "eventTracker";

pub const DELIMITER: char = ',';

/// Sentinel, label, timestamp, event kind, namespace, name, type, version.
pub const FIELD_COUNT: usize = 8;

/// A sentinel-tagged line split into its fields, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub label: String,
    pub timestamp: String,
    pub event_kind: String,
    pub namespace: String,
    pub name: String,
    pub object_type: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("trace record has {found} fields, expected at least {expected}")]
    MissingFields { found: usize, expected: usize },
    #[error("invalid resourceVersion {value:?}: {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parses a single log line.
///
/// Returns `Ok(None)` for lines that do not start with [`SENTINEL`]; those
/// belong to unrelated log output. Fields past [`FIELD_COUNT`] are ignored.
pub fn parse_line(line: &str) -> Result<Option<TraceRecord>, RecordError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(DELIMITER).collect();

    if fields[0] != SENTINEL {
        return Ok(None);
    }
    if fields.len() < FIELD_COUNT {
        return Err(RecordError::MissingFields {
            found: fields.len(),
            expected: FIELD_COUNT,
        });
    }

    let raw_version = fields[7].trim();
    let version = raw_version
        .parse::<u64>()
        .map_err(|source| RecordError::InvalidVersion {
            value: raw_version.to_string(),
            source,
        })?;

    Ok(Some(TraceRecord {
        label: fields[1].to_string(),
        timestamp: fields[2].to_string(),
        event_kind: fields[3].to_string(),
        namespace: fields[4].to_string(),
        name: fields[5].to_string(),
        object_type: fields[6].to_string(),
        version,
    }))
}

/// A trace record whose label has been classified into a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub checkpoint: Checkpoint,
    pub source: Source,
    #[serde(flatten)]
    pub record: TraceRecord,
}

impl Event {
    pub fn version(&self) -> u64 {
        self.record.version
    }

    /// Total order used to keep sequences deterministic regardless of the
    /// order lines were read in.
    pub(crate) fn ordering_key(&self) -> (u64, &str, &str, &str, Source) {
        (
            self.record.version,
            self.record.timestamp.as_str(),
            self.record.label.as_str(),
            self.record.event_kind.as_str(),
            self.source,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_record() {
        let line = "eventTracker,watch_cache/processEvent,2018-03-19 10:00:01.5,ADDED,default,web-0,*core.Pod,1042";
        let record = parse_line(line).unwrap().expect("record");
        assert_eq!(record.label, "watch_cache/processEvent");
        assert_eq!(record.timestamp, "2018-03-19 10:00:01.5");
        assert_eq!(record.event_kind, "ADDED");
        assert_eq!(record.namespace, "default");
        assert_eq!(record.name, "web-0");
        assert_eq!(record.object_type, "*core.Pod");
        assert_eq!(record.version, 1042);
    }

    #[test]
    fn ignores_unrelated_output() {
        assert_eq!(parse_line("I0319 10:00:01 started watch").unwrap(), None);
        assert_eq!(parse_line("").unwrap(), None);
        // sentinel must match exactly
        assert_eq!(
            parse_line("EventTracker,cacher/send0,t,ADDED,ns,a,*core.Pod,1").unwrap(),
            None
        );
        assert_eq!(
            parse_line(" eventTracker,cacher/send0,t,ADDED,ns,a,*core.Pod,1").unwrap(),
            None
        );
    }

    #[test]
    fn short_record_is_malformed() {
        let err = parse_line("eventTracker,cacher/send0,t,ADDED").unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingFields {
                found: 4,
                expected: FIELD_COUNT
            }
        );
    }

    #[test]
    fn non_integer_version_is_malformed() {
        let err = parse_line("eventTracker,badVersion,t,ADDED,ns,a,*core.Pod,abc").unwrap_err();
        assert!(matches!(err, RecordError::InvalidVersion { ref value, .. } if value == "abc"));

        let err = parse_line("eventTracker,cacher/send0,t,ADDED,ns,a,*core.Pod,-3").unwrap_err();
        assert!(matches!(err, RecordError::InvalidVersion { .. }));

        let err = parse_line("eventTracker,cacher/send0,t,ADDED,ns,a,*core.Pod,").unwrap_err();
        assert!(matches!(err, RecordError::InvalidVersion { .. }));
    }

    #[test]
    fn tolerates_crlf_and_trailing_fields() {
        let record = parse_line("eventTracker,cacher/send1,t,MODIFIED,ns,a,*core.Pod,7,extra\r")
            .unwrap()
            .expect("record");
        assert_eq!(record.version, 7);

        let record = parse_line("eventTracker,cacher/send1,t,MODIFIED,ns,a,*core.Pod,8\r")
            .unwrap()
            .expect("record");
        assert_eq!(record.version, 8);
    }
}
