// engine/src/lib.rs
//! Watch-event version reconciliation.
//!
//! Reads the `eventTracker` instrumentation emitted along the api server's
//! watch path (etcd watcher, watch cache, cacher dispatch) and by its watch
//! clients, rebuilds for every tracked object the resourceVersions each
//! checkpoint observed, and reports every checkpoint that disagrees with the
//! chosen baseline.
//!
//! The pipeline is strictly forward:
//! [`ingest`] (lines to events) → [`bucket`] (events to per-entity
//! sequences) → [`diff`] (sequence against baseline) → [`report`].

use std::path::{Path, PathBuf};

pub mod bucket;
pub mod checkpoint;
pub mod config;
pub mod diff;
pub mod ingest;
pub mod logging;
pub mod record;
pub mod report;

pub use bucket::{bucket, BucketOptions, CheckpointSequence, Entity, EntityKey};
pub use checkpoint::{classify, Checkpoint, Consumer, SequencePolicy, Source};
pub use config::RunConfig;
pub use diff::{compare, Comparison, Discrepancy, DiscrepancyKind};
pub use ingest::{discover_sources, ingest_sources, IngestStats, Ingested, LogSource};
pub use record::{parse_line, Event, RecordError, TraceRecord};
pub use report::{build_report, DetailFilter, DetailMode, RunReport};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read log source {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no kube-apiserver.log found under {}", .0.display())]
    NoSources(PathBuf),
    #[error("unknown checkpoint {0:?}")]
    UnknownCheckpoint(String),
    #[error("cannot read configuration {}: {source}", .path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reconciles every log found under `root`.
pub fn check_log_dir(root: impl AsRef<Path>, config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let sources = discover_sources(root)?;
    let ingested = ingest_sources(&sources)?;
    Ok(check_events(&ingested.events, config, ingested.stats))
}

/// Reconciles already-ingested events.
pub fn check_events(events: &[Event], config: &RunConfig, stats: IngestStats) -> RunReport {
    let entities = bucket(events, &config.bucket_options());
    build_report(&entities, config, stats)
}
