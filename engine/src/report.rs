// engine/src/report.rs
//! Reconciliation of every discovered entity against the baseline, and the
//! run-level report built from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{CheckpointSequence, Entity, EntityKey};
use crate::checkpoint::{Checkpoint, SequencePolicy};
use crate::config::RunConfig;
use crate::diff::{self, Comparison};
use crate::ingest::IngestStats;
use crate::record::Event;

/// What the per-entity detail carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetailMode {
    /// Versions only.
    #[default]
    Versions,
    /// Versions plus the trace records behind them.
    Events,
}

/// Selects the inconsistent entities whose detail is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFilter {
    /// Exact entity name (or `namespace/name`), or `all`.
    pub name: Option<String>,
    pub name_contains: Option<String>,
}

impl DetailFilter {
    pub const ALL: &'static str = "all";

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.name_contains.is_none()
    }

    pub fn matches(&self, key: &EntityKey) -> bool {
        let by_name = self.name.as_deref().is_some_and(|name| {
            name == Self::ALL || name == key.name || name == key.to_string()
        });
        let by_substring = self
            .name_contains
            .as_deref()
            .is_some_and(|needle| !needle.is_empty() && key.name.contains(needle));
        by_name || by_substring
    }
}

/// One entity's comparisons against the baseline.
#[derive(Debug, Clone)]
pub struct EntityReconciliation<'a> {
    pub entity: &'a Entity,
    pub baseline: Checkpoint,
    pub comparisons: Vec<(Checkpoint, Comparison)>,
}

impl EntityReconciliation<'_> {
    pub fn is_consistent(&self) -> bool {
        self.comparisons.iter().all(|(_, comparison)| comparison.equal)
    }

    pub fn diverging(&self) -> Vec<Checkpoint> {
        self.comparisons
            .iter()
            .filter(|(_, comparison)| !comparison.equal)
            .map(|(checkpoint, _)| *checkpoint)
            .collect()
    }
}

/// Diffs the baseline sequence against each candidate checkpoint.
pub fn reconcile_entity<'a>(
    entity: &'a Entity,
    baseline: Checkpoint,
    candidates: &[Checkpoint],
) -> EntityReconciliation<'a> {
    let base = entity.sequence(baseline).versions();
    let comparisons = candidates
        .iter()
        .map(|&candidate| {
            (
                candidate,
                diff::compare(base, entity.sequence(candidate).versions()),
            )
        })
        .collect();
    EntityReconciliation {
        entity,
        baseline,
        comparisons,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityVerdict {
    pub entity: EntityKey,
    pub diverging: Vec<Checkpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDetail {
    pub checkpoint: Checkpoint,
    pub policy: SequencePolicy,
    pub versions: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
}

impl SequenceDetail {
    fn new(sequence: &CheckpointSequence, mode: DetailMode) -> Self {
        Self {
            checkpoint: sequence.checkpoint(),
            policy: sequence.policy(),
            versions: sequence.versions().to_vec(),
            events: match mode {
                DetailMode::Versions => None,
                DetailMode::Events => Some(sequence.events().to_vec()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDetail {
    #[serde(flatten)]
    pub sequence: SequenceDetail,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetail {
    pub entity: EntityKey,
    pub baseline: SequenceDetail,
    /// Only the candidates that diverge from the baseline.
    pub candidates: Vec<CandidateDetail>,
}

/// A dedup checkpoint that kept seeing the same version. Either the stage
/// really re-logs, or the checkpoint should be counted with multiplicity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFlag {
    pub checkpoint: Checkpoint,
    pub collapsed_repeats: usize,
    pub entities: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub baseline: Checkpoint,
    pub tracked_type: String,
    pub compared: Vec<Checkpoint>,
    pub entities_examined: usize,
    pub inconsistent_count: usize,
    pub inconsistent: Vec<EntityVerdict>,
    /// How often each checkpoint diverged from the baseline.
    pub divergence_by_checkpoint: BTreeMap<Checkpoint, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<EntityDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_flags: Vec<PolicyFlag>,
    pub ingest: IngestStats,
}

impl RunReport {
    pub fn consistent_count(&self) -> usize {
        self.entities_examined - self.inconsistent_count
    }

    /// True when there is nothing to look at: no inconsistent entity and no
    /// trace record lost to parsing or classification.
    pub fn is_clean(&self) -> bool {
        self.inconsistent_count == 0
            && self.ingest.malformed_records == 0
            && self.ingest.unclassified_records() == 0
    }
}

/// Reconciles every entity and aggregates the outcome.
pub fn build_report(entities: &[Entity], config: &RunConfig, ingest: IngestStats) -> RunReport {
    let candidates = config.candidates();
    let filter = config.detail_filter();

    let mut inconsistent = Vec::new();
    let mut details = Vec::new();
    let mut divergence_by_checkpoint = BTreeMap::new();

    for entity in entities {
        let reconciliation = reconcile_entity(entity, config.baseline, &candidates);
        if reconciliation.is_consistent() {
            continue;
        }

        let diverging = reconciliation.diverging();
        for checkpoint in &diverging {
            *divergence_by_checkpoint.entry(*checkpoint).or_insert(0) += 1;
        }
        tracing::debug!(entity = %entity.key(), diverging = diverging.len(), "inconsistent entity");

        if filter.matches(entity.key()) {
            details.push(entity_detail(&reconciliation, config.detail));
        }
        inconsistent.push(EntityVerdict {
            entity: entity.key().clone(),
            diverging,
        });
    }

    let report = RunReport {
        generated_at: Utc::now(),
        baseline: config.baseline,
        tracked_type: config.tracked_type.clone(),
        compared: candidates,
        entities_examined: entities.len(),
        inconsistent_count: inconsistent.len(),
        inconsistent,
        divergence_by_checkpoint,
        details,
        policy_flags: policy_flags(entities),
        ingest,
    };

    tracing::info!(
        entities = report.entities_examined,
        inconsistent = report.inconsistent_count,
        baseline = %report.baseline,
        "reconciliation finished"
    );
    report
}

fn entity_detail(reconciliation: &EntityReconciliation<'_>, mode: DetailMode) -> EntityDetail {
    let entity = reconciliation.entity;
    EntityDetail {
        entity: entity.key().clone(),
        baseline: SequenceDetail::new(entity.sequence(reconciliation.baseline), mode),
        candidates: reconciliation
            .comparisons
            .iter()
            .filter(|(_, comparison)| !comparison.equal)
            .map(|(checkpoint, comparison)| CandidateDetail {
                sequence: SequenceDetail::new(entity.sequence(*checkpoint), mode),
                comparison: comparison.clone(),
            })
            .collect(),
    }
}

fn policy_flags(entities: &[Entity]) -> Vec<PolicyFlag> {
    let mut flags: BTreeMap<Checkpoint, PolicyFlag> = BTreeMap::new();
    for sequence in entities.iter().flat_map(Entity::sequences) {
        if sequence.collapsed_repeats() == 0 {
            continue;
        }
        let flag = flags
            .entry(sequence.checkpoint())
            .or_insert_with(|| PolicyFlag {
                checkpoint: sequence.checkpoint(),
                collapsed_repeats: 0,
                entities: 0,
            });
        flag.collapsed_repeats += sequence.collapsed_repeats();
        flag.entities += 1;
    }
    flags.into_values().collect()
}
