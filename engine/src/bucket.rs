// engine/src/bucket.rs
//! Groups classified events into per-entity, per-checkpoint sequences.
//!
//! Entities are discovered from the entry checkpoint only; every other
//! observation is attached to an already-discovered entity or dropped.
//! An entity that never shows up at the entry checkpoint is therefore never
//! reconciled, even when its other observations would line up.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, SequencePolicy};
use crate::record::Event;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub namespace: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Versions observed for one entity at one checkpoint, ascending once sealed,
/// with the events they came from kept in parallel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSequence {
    checkpoint: Checkpoint,
    policy: SequencePolicy,
    versions: Vec<u64>,
    events: Vec<Event>,
    /// Repeats folded away under the dedup policy.
    collapsed_repeats: usize,
    #[serde(skip)]
    positions: HashMap<u64, usize>,
}

impl CheckpointSequence {
    pub fn new(checkpoint: Checkpoint, policy: SequencePolicy) -> Self {
        Self {
            checkpoint,
            policy,
            versions: Vec::new(),
            events: Vec::new(),
            collapsed_repeats: 0,
            positions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, event: &Event) {
        match self.policy {
            SequencePolicy::Multiplicity => self.events.push(event.clone()),
            SequencePolicy::Dedup => match self.positions.entry(event.version()) {
                Entry::Occupied(slot) => {
                    self.collapsed_repeats += 1;
                    // lowest-ordered copy wins
                    let kept = &mut self.events[*slot.get()];
                    if event.ordering_key() < kept.ordering_key() {
                        *kept = event.clone();
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(self.events.len());
                    self.events.push(event.clone());
                }
            },
        }
    }

    /// Sorts by version and freezes the sequence.
    pub fn seal(&mut self) {
        self.events
            .sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
        self.versions = self.events.iter().map(Event::version).collect();
        self.positions = HashMap::new();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn policy(&self) -> SequencePolicy {
        self.policy
    }

    pub fn versions(&self) -> &[u64] {
        &self.versions
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn collapsed_repeats(&self) -> usize {
        self.collapsed_repeats
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// A reconciliation subject and its sequence at every checkpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    key: EntityKey,
    sequences: Vec<CheckpointSequence>,
}

impl Entity {
    fn new(key: EntityKey, options: &BucketOptions) -> Self {
        let sequences = Checkpoint::ALL
            .into_iter()
            .map(|checkpoint| CheckpointSequence::new(checkpoint, options.policy(checkpoint)))
            .collect();
        Self { key, sequences }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn sequence(&self, checkpoint: Checkpoint) -> &CheckpointSequence {
        &self.sequences[checkpoint.index()]
    }

    /// Sequences in pipeline order.
    pub fn sequences(&self) -> impl Iterator<Item = &CheckpointSequence> {
        self.sequences.iter()
    }

    fn insert(&mut self, event: &Event) {
        self.sequences[event.checkpoint.index()].insert(event);
    }

    fn seal(&mut self) {
        for sequence in &mut self.sequences {
            sequence.seal();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketOptions {
    /// Only objects of this type are discovered. Later observations attach by
    /// `(namespace, name)` alone, since clients log their own versioned type.
    pub tracked_type: String,
    /// The checkpoint at which entities are discovered.
    pub entry: Checkpoint,
    pub policy_overrides: BTreeMap<Checkpoint, SequencePolicy>,
}

impl BucketOptions {
    pub fn policy(&self, checkpoint: Checkpoint) -> SequencePolicy {
        self.policy_overrides
            .get(&checkpoint)
            .copied()
            .unwrap_or_else(|| checkpoint.default_policy())
    }
}

/// Discovers subjects and builds their sealed sequences, sorted by key.
pub fn bucket(events: &[Event], options: &BucketOptions) -> Vec<Entity> {
    let subjects: BTreeSet<(&str, &str)> = events
        .iter()
        .filter(|event| {
            event.checkpoint == options.entry && event.record.object_type == options.tracked_type
        })
        .map(|event| (event.record.namespace.as_str(), event.record.name.as_str()))
        .collect();

    let mut entities: Vec<Entity> = subjects
        .iter()
        .map(|&(namespace, name)| Entity::new(EntityKey::new(namespace, name), options))
        .collect();
    let index: HashMap<(&str, &str), usize> = subjects
        .into_iter()
        .enumerate()
        .map(|(position, subject)| (subject, position))
        .collect();

    let mut attached = 0usize;
    for event in events {
        let subject = (event.record.namespace.as_str(), event.record.name.as_str());
        if let Some(&position) = index.get(&subject) {
            entities[position].insert(event);
            attached += 1;
        }
    }

    for entity in &mut entities {
        entity.seal();
    }

    tracing::debug!(
        entities = entities.len(),
        attached,
        dropped = events.len() - attached,
        entry = %options.entry,
        tracked_type = %options.tracked_type,
        "bucketed events"
    );

    entities
}
