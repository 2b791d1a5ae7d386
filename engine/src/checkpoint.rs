// engine/src/checkpoint.rs
//! Pipeline checkpoints and the classifier that maps raw trace labels onto
//! them.
//!
//! The classifier is the only place label strings are interpreted. Anything
//! it does not recognise is reported back as `None` and counted by the
//! caller; it never fails a run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Which log a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    ApiServer,
    Scheduler,
    ControllerManager,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::ApiServer, Source::Scheduler, Source::ControllerManager];

    pub fn log_file_name(self) -> &'static str {
        match self {
            Source::ApiServer => "kube-apiserver.log",
            Source::Scheduler => "kube-scheduler.log",
            Source::ControllerManager => "kube-controller-manager.log",
        }
    }

    pub fn from_log_file_name(file_name: &str) -> Option<Source> {
        Source::ALL
            .into_iter()
            .find(|source| source.log_file_name() == file_name)
    }

    /// The downstream consumer this source represents, if any.
    pub fn consumer(self) -> Option<Consumer> {
        match self {
            Source::ApiServer => None,
            Source::Scheduler => Some(Consumer::Scheduler),
            Source::ControllerManager => Some(Consumer::ControllerManager),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::ApiServer => "api-server",
            Source::Scheduler => "scheduler",
            Source::ControllerManager => "controller-manager",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watch client downstream of the api server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Consumer {
    Scheduler,
    ControllerManager,
}

impl Consumer {
    pub fn as_str(self) -> &'static str {
        match self {
            Consumer::Scheduler => "scheduler",
            Consumer::ControllerManager => "controller-manager",
        }
    }

    pub fn source(self) -> Source {
        match self {
            Consumer::Scheduler => Source::Scheduler,
            Consumer::ControllerManager => Source::ControllerManager,
        }
    }
}

/// How repeated versions at one checkpoint are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequencePolicy {
    /// The same version seen twice is one logical event.
    Dedup,
    /// Every occurrence is a separate delivery and must be matched.
    Multiplicity,
}

impl SequencePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SequencePolicy::Dedup => "dedup",
            SequencePolicy::Multiplicity => "multiplicity",
        }
    }
}

impl fmt::Display for SequencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SequencePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dedup" => Ok(SequencePolicy::Dedup),
            "multiplicity" => Ok(SequencePolicy::Multiplicity),
            other => Err(Error::Config(format!(
                "unknown sequence policy {other:?} (expected dedup or multiplicity)"
            ))),
        }
    }
}

pub const WATCH_HANDLER_LABEL: &str = "reflector/watchHandler";

/// Observation points along the watch path, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Checkpoint {
    StorageTransformCur,
    StorageTransformOld,
    StorageProcessEvent,
    CacheProcessEvent,
    DispatchEvent,
    DispatchAdd0,
    DispatchAdd1_2_3,
    DispatchSend0,
    DispatchSend1,
    DispatchSend2,
    ConsumerWatchHandler(Consumer),
}

impl Checkpoint {
    pub const COUNT: usize = 12;

    pub const ALL: [Checkpoint; Checkpoint::COUNT] = [
        Checkpoint::StorageTransformCur,
        Checkpoint::StorageTransformOld,
        Checkpoint::StorageProcessEvent,
        Checkpoint::CacheProcessEvent,
        Checkpoint::DispatchEvent,
        Checkpoint::DispatchAdd0,
        Checkpoint::DispatchAdd1_2_3,
        Checkpoint::DispatchSend0,
        Checkpoint::DispatchSend1,
        Checkpoint::DispatchSend2,
        Checkpoint::ConsumerWatchHandler(Consumer::Scheduler),
        Checkpoint::ConsumerWatchHandler(Consumer::ControllerManager),
    ];

    /// Position in [`Checkpoint::ALL`].
    pub fn index(self) -> usize {
        match self {
            Checkpoint::StorageTransformCur => 0,
            Checkpoint::StorageTransformOld => 1,
            Checkpoint::StorageProcessEvent => 2,
            Checkpoint::CacheProcessEvent => 3,
            Checkpoint::DispatchEvent => 4,
            Checkpoint::DispatchAdd0 => 5,
            Checkpoint::DispatchAdd1_2_3 => 6,
            Checkpoint::DispatchSend0 => 7,
            Checkpoint::DispatchSend1 => 8,
            Checkpoint::DispatchSend2 => 9,
            Checkpoint::ConsumerWatchHandler(Consumer::Scheduler) => 10,
            Checkpoint::ConsumerWatchHandler(Consumer::ControllerManager) => 11,
        }
    }

    /// Stable machine name, used in configuration and JSON output.
    pub fn name(self) -> &'static str {
        match self {
            Checkpoint::StorageTransformCur => "storage-transform-cur",
            Checkpoint::StorageTransformOld => "storage-transform-old",
            Checkpoint::StorageProcessEvent => "storage-process-event",
            Checkpoint::CacheProcessEvent => "cache-process-event",
            Checkpoint::DispatchEvent => "dispatch-event",
            Checkpoint::DispatchAdd0 => "dispatch-add0",
            Checkpoint::DispatchAdd1_2_3 => "dispatch-add1-2-3",
            Checkpoint::DispatchSend0 => "dispatch-send0",
            Checkpoint::DispatchSend1 => "dispatch-send1",
            Checkpoint::DispatchSend2 => "dispatch-send2",
            Checkpoint::ConsumerWatchHandler(Consumer::Scheduler) => {
                "consumer-watch-handler/scheduler"
            }
            Checkpoint::ConsumerWatchHandler(Consumer::ControllerManager) => {
                "consumer-watch-handler/controller-manager"
            }
        }
    }

    /// List names accepted by the older comparison tooling.
    pub fn legacy_alias(self) -> Option<&'static str> {
        match self {
            Checkpoint::StorageTransformCur => Some("etcd"),
            Checkpoint::StorageProcessEvent => Some("outetcd"),
            Checkpoint::CacheProcessEvent => Some("inapiserver"),
            Checkpoint::DispatchEvent => Some("outapiserver"),
            Checkpoint::ConsumerWatchHandler(Consumer::Scheduler) => Some("scheduler"),
            Checkpoint::ConsumerWatchHandler(Consumer::ControllerManager) => {
                Some("controllermanager")
            }
            _ => None,
        }
    }

    /// Trace labels that classify to this checkpoint.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Checkpoint::StorageTransformCur => &["etcd3/watcher/transform/curObj"],
            Checkpoint::StorageTransformOld => &["etcd3/watcher/transform/oldObj"],
            Checkpoint::StorageProcessEvent => &["etcd3/watcher/processEvent"],
            Checkpoint::CacheProcessEvent => &["watch_cache/processEvent"],
            Checkpoint::DispatchEvent => &["cacher/dispatchEvent"],
            Checkpoint::DispatchAdd0 => &["cacher/add0"],
            Checkpoint::DispatchAdd1_2_3 => {
                &["cacher/add1", "cacher/add2", "cacher/add3", "cacher/add/case3"]
            }
            Checkpoint::DispatchSend0 => &["cacher/send0"],
            Checkpoint::DispatchSend1 => &["cacher/send1"],
            Checkpoint::DispatchSend2 => &["cacher/send2"],
            Checkpoint::ConsumerWatchHandler(_) => &[WATCH_HANDLER_LABEL],
        }
    }

    /// The log this checkpoint's records come from.
    pub fn source(self) -> Source {
        match self {
            Checkpoint::ConsumerWatchHandler(consumer) => consumer.source(),
            _ => Source::ApiServer,
        }
    }

    pub fn default_policy(self) -> SequencePolicy {
        match self {
            Checkpoint::StorageTransformCur
            | Checkpoint::StorageTransformOld
            | Checkpoint::ConsumerWatchHandler(_) => SequencePolicy::Dedup,
            Checkpoint::StorageProcessEvent
            | Checkpoint::CacheProcessEvent
            | Checkpoint::DispatchEvent
            | Checkpoint::DispatchAdd0
            | Checkpoint::DispatchAdd1_2_3
            | Checkpoint::DispatchSend0
            | Checkpoint::DispatchSend1
            | Checkpoint::DispatchSend2 => SequencePolicy::Multiplicity,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Checkpoint::StorageTransformCur => "object read back from etcd (current state)",
            Checkpoint::StorageTransformOld => "object read back from etcd (previous state)",
            Checkpoint::StorageProcessEvent => "event leaving the etcd watcher",
            Checkpoint::CacheProcessEvent => "event entering the watch cache",
            Checkpoint::DispatchEvent => "event dispatched by the cacher",
            Checkpoint::DispatchAdd0 => "event queued to a watcher (fast path)",
            Checkpoint::DispatchAdd1_2_3 => "event queued to a watcher (slow paths)",
            Checkpoint::DispatchSend0 => "event sent to a watcher (stage 0)",
            Checkpoint::DispatchSend1 => "event sent to a watcher (stage 1)",
            Checkpoint::DispatchSend2 => "event sent to a watcher (stage 2)",
            Checkpoint::ConsumerWatchHandler(Consumer::Scheduler) => {
                "event received by the scheduler reflector"
            }
            Checkpoint::ConsumerWatchHandler(Consumer::ControllerManager) => {
                "event received by the controller-manager reflector"
            }
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Checkpoint {
    type Err = Error;

    /// Accepts machine names and legacy list aliases, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Checkpoint::ALL
            .into_iter()
            .find(|checkpoint| {
                checkpoint.name() == wanted || checkpoint.legacy_alias() == Some(wanted.as_str())
            })
            .ok_or_else(|| Error::UnknownCheckpoint(s.to_string()))
    }
}

impl TryFrom<String> for Checkpoint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Checkpoint> for String {
    fn from(checkpoint: Checkpoint) -> Self {
        checkpoint.name().to_string()
    }
}

/// Maps a trace label, as seen in a given source, onto a checkpoint.
///
/// Storage, cache and dispatch labels are only meaningful in the api-server
/// log; watch-handler labels only in a consumer log, where the consumer is
/// identified by the source rather than the label.
pub fn classify(label: &str, source: Source) -> Option<Checkpoint> {
    match source {
        Source::ApiServer => match label {
            "etcd3/watcher/transform/curObj" => Some(Checkpoint::StorageTransformCur),
            "etcd3/watcher/transform/oldObj" => Some(Checkpoint::StorageTransformOld),
            "etcd3/watcher/processEvent" => Some(Checkpoint::StorageProcessEvent),
            "watch_cache/processEvent" => Some(Checkpoint::CacheProcessEvent),
            "cacher/dispatchEvent" => Some(Checkpoint::DispatchEvent),
            "cacher/add0" => Some(Checkpoint::DispatchAdd0),
            "cacher/add1" | "cacher/add2" | "cacher/add3" | "cacher/add/case3" => {
                Some(Checkpoint::DispatchAdd1_2_3)
            }
            "cacher/send0" => Some(Checkpoint::DispatchSend0),
            "cacher/send1" => Some(Checkpoint::DispatchSend1),
            "cacher/send2" => Some(Checkpoint::DispatchSend2),
            _ => None,
        },
        Source::Scheduler | Source::ControllerManager => {
            if label.starts_with(WATCH_HANDLER_LABEL) {
                source.consumer().map(Checkpoint::ConsumerWatchHandler)
            } else {
                None
            }
        }
    }
}
