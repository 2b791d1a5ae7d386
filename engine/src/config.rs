// engine/src/config.rs
//! Run configuration: which checkpoint is ground truth, which entities are
//! reconciled, and how much detail the report carries.
//!
//! Loaded from TOML (see `config/rvcheck.toml`); every field has a default so
//! an empty file is a valid configuration. Command-line flags are applied on
//! top by the caller.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bucket::BucketOptions;
use crate::checkpoint::{Checkpoint, SequencePolicy};
use crate::report::{DetailFilter, DetailMode};
use crate::{Error, Result};

pub const DEFAULT_TRACKED_TYPE: &str = "*core.Pod";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Checkpoint every other sequence is diffed against.
    pub baseline: Checkpoint,

    /// Checkpoint at which entities are discovered.
    pub entry_checkpoint: Checkpoint,

    /// Object type of the entities to reconcile.
    pub tracked_type: String,

    /// Entity name whose detail is reported, or `all`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,

    /// Report detail for entities whose name contains this string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name_contains: Option<String>,

    pub detail: DetailMode,

    /// Checkpoints built but left out of the comparison.
    pub ignored_checkpoints: Vec<Checkpoint>,

    pub policy_overrides: BTreeMap<Checkpoint, SequencePolicy>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            baseline: Checkpoint::StorageTransformCur,
            entry_checkpoint: Checkpoint::CacheProcessEvent,
            tracked_type: DEFAULT_TRACKED_TYPE.to_string(),
            entity_name: None,
            entity_name_contains: None,
            detail: DetailMode::default(),
            // previous-state reads never line up one-to-one with the baseline
            ignored_checkpoints: vec![Checkpoint::StorageTransformOld],
            policy_overrides: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path).map_err(|source| Error::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&toml_str)
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ignored_checkpoints.contains(&self.baseline) {
            return Err(Error::Config(format!(
                "baseline {} is also listed in ignored_checkpoints",
                self.baseline
            )));
        }
        if self.tracked_type.trim().is_empty() {
            return Err(Error::Config("tracked_type must not be empty".into()));
        }
        if matches!(&self.entity_name_contains, Some(needle) if needle.is_empty()) {
            return Err(Error::Config(
                "entity_name_contains must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Checkpoints compared against the baseline, in pipeline order.
    pub fn candidates(&self) -> Vec<Checkpoint> {
        Checkpoint::ALL
            .into_iter()
            .filter(|checkpoint| {
                *checkpoint != self.baseline && !self.ignored_checkpoints.contains(checkpoint)
            })
            .collect()
    }

    pub fn bucket_options(&self) -> BucketOptions {
        BucketOptions {
            tracked_type: self.tracked_type.clone(),
            entry: self.entry_checkpoint,
            policy_overrides: self.policy_overrides.clone(),
        }
    }

    pub fn detail_filter(&self) -> DetailFilter {
        DetailFilter {
            name: self.entity_name.clone(),
            name_contains: self.entity_name_contains.clone(),
        }
    }
}
