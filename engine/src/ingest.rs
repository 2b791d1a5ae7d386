// engine/src/ingest.rs
//! Log discovery and ingestion.
//!
//! Two layouts are understood: the three component logs sitting directly in
//! the log root (single host), or one subdirectory per host each holding its
//! own copies. Files are read line by line; only instrumentation lines become
//! events.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::checkpoint::{classify, Source};
use crate::record::{parse_line, Event, RecordError};
use crate::{Error, Result};

/// Malformed records kept verbatim for the report; the rest are only counted.
pub const MALFORMED_SAMPLE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSource {
    pub source: Source,
    pub path: PathBuf,
}

/// Finds component logs under `root`, at most one directory level down.
///
/// Fails with [`Error::NoSources`] when no api-server log exists, since
/// there is nothing to reconcile against without one.
pub fn discover_sources(root: impl AsRef<Path>) -> Result<Vec<LogSource>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::SourceUnavailable {
            path: root.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "log root is not a directory",
            ),
        });
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop while walking logs"));
            Error::SourceUnavailable { path, source }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if let Some(source) = Source::from_log_file_name(&file_name) {
            tracing::info!(path = %entry.path().display(), %source, "found log");
            sources.push(LogSource {
                source,
                path: entry.into_path(),
            });
        }
    }

    if !sources.iter().any(|log| log.source == Source::ApiServer) {
        return Err(Error::NoSources(root.to_path_buf()));
    }
    for source in [Source::Scheduler, Source::ControllerManager] {
        if !sources.iter().any(|log| log.source == source) {
            tracing::warn!(
                root = %root.display(),
                file = source.log_file_name(),
                "no log found; its watch-handler checkpoint will be empty"
            );
        }
    }

    Ok(sources)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalformedRecord {
    pub origin: String,
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub files_read: usize,
    pub lines_read: u64,
    /// Lines without the instrumentation sentinel.
    pub ignored_lines: u64,
    /// Instrumentation lines that parsed and classified.
    pub events: u64,
    pub malformed_records: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed_samples: Vec<MalformedRecord>,
    /// Instrumentation lines whose label did not classify, per `source:label`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unclassified: BTreeMap<String, u64>,
}

impl IngestStats {
    pub fn unclassified_records(&self) -> u64 {
        self.unclassified.values().sum()
    }

    fn record_malformed(&mut self, origin: &str, line: usize, error: &RecordError) {
        tracing::warn!(origin, line, %error, "skipping malformed trace record");
        self.malformed_records += 1;
        if self.malformed_samples.len() < MALFORMED_SAMPLE_LIMIT {
            self.malformed_samples.push(MalformedRecord {
                origin: origin.to_string(),
                line,
                error: error.to_string(),
            });
        }
    }
}

/// Everything read from the logs of one run.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub events: Vec<Event>,
    pub stats: IngestStats,
}

impl Ingested {
    /// Parses and classifies every line of `text` as coming from `source`.
    /// `origin` names the input in warnings and samples.
    pub fn ingest_str(&mut self, text: &str, source: Source, origin: &str) {
        for (number, line) in text.lines().enumerate() {
            self.ingest_line(line, source, origin, number + 1);
        }
    }

    /// Reads one log file. An unreadable file is fatal for the run.
    pub fn ingest_file(&mut self, log: &LogSource) -> Result<()> {
        let unavailable = |source: std::io::Error| Error::SourceUnavailable {
            path: log.path.clone(),
            source,
        };
        let file = File::open(&log.path).map_err(unavailable)?;
        self.ingest_reader(file, log.source, &log.path.display().to_string())
            .map_err(unavailable)?;
        self.stats.files_read += 1;
        Ok(())
    }

    /// Bytes that are not valid UTF-8 are replaced rather than failing the
    /// read; they only ever appear in non-instrumentation output.
    pub fn ingest_reader(
        &mut self,
        reader: impl Read,
        source: Source,
        origin: &str,
    ) -> std::io::Result<()> {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut number = 0usize;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            number += 1;
            let line = String::from_utf8_lossy(&buf);
            let line = line.strip_suffix('\n').unwrap_or(&line);
            self.ingest_line(line, source, origin, number);
        }
        Ok(())
    }

    fn ingest_line(&mut self, line: &str, source: Source, origin: &str, number: usize) {
        self.stats.lines_read += 1;
        let record = match parse_line(line) {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.stats.ignored_lines += 1;
                return;
            }
            Err(error) => {
                self.stats.record_malformed(origin, number, &error);
                return;
            }
        };

        match classify(&record.label, source) {
            Some(checkpoint) => {
                self.stats.events += 1;
                self.events.push(Event {
                    checkpoint,
                    source,
                    record,
                });
            }
            None => {
                tracing::debug!(
                    origin,
                    line = number,
                    label = %record.label,
                    "unclassified checkpoint label"
                );
                *self
                    .stats
                    .unclassified
                    .entry(format!("{source}:{}", record.label))
                    .or_insert(0) += 1;
            }
        }
    }
}

/// Reads every discovered log in order.
pub fn ingest_sources(sources: &[LogSource]) -> Result<Ingested> {
    let mut ingested = Ingested::default();
    for log in sources {
        ingested.ingest_file(log)?;
    }
    tracing::info!(
        files = ingested.stats.files_read,
        events = ingested.stats.events,
        malformed = ingested.stats.malformed_records,
        unclassified = ingested.stats.unclassified_records(),
        "ingested logs"
    );
    Ok(ingested)
}
