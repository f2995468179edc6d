//! Snapshot diffing.
//!
//! Compares the entities observed in this run against the snapshot file from
//! the previous run. The snapshot is replaced with the current map *before*
//! the comparison is reported, so a crash mid-run can lose a notification
//! but never leaves the file older than what was already observed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{EntityMap, EntityRecord};
use crate::utils::fs::{read_or_empty, write_atomic};

/// Persists the entity map and reports what is new or changed.
#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    path: PathBuf,
    /// Also report entities whose record differs from the previous run
    include_changes: bool,
}

impl SnapshotDiffer {
    pub fn new(path: impl Into<PathBuf>, include_changes: bool) -> Self {
        Self {
            path: path.into(),
            include_changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot, replace it with `current`, and return the
    /// new or changed records in `current`'s order. `None` means no changes.
    pub fn diff(&self, current: &EntityMap) -> Result<Option<Vec<EntityRecord>>> {
        let previous = self.load()?;
        self.save(current)?;

        let changed = changed_entities(&previous, current, self.include_changes);
        log::debug!(
            "Snapshot compare: {} previous, {} current",
            previous.len(),
            current.len()
        );

        if changed.is_empty() {
            log::info!("No new elements found");
            return Ok(None);
        }
        log::info!("Found {} new elements", changed.len());
        Ok(Some(changed))
    }

    /// Read the snapshot. Missing or empty means no previous observations;
    /// anything unparsable is deleted and reported as corrupt.
    pub fn load(&self) -> Result<EntityMap> {
        let content = read_or_empty(&self.path)?;
        if content.trim().is_empty() {
            return Ok(EntityMap::new());
        }
        serde_json::from_str(&content).map_err(|source| {
            log::error!(
                "Could not read json from {}. Deleting file.",
                self.path.display()
            );
            if let Err(e) = fs::remove_file(&self.path) {
                log::error!("Failed to delete {}: {e}", self.path.display());
            }
            AppError::SnapshotCorrupt {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Replace the snapshot wholesale with `entities`.
    pub fn save(&self, entities: &EntityMap) -> Result<()> {
        let bytes = serde_json::to_vec(entities)?;
        write_atomic(&self.path, &bytes)
    }
}

/// Records in `current` whose key is new, or whose value changed when
/// `include_changes` is on.
pub fn changed_entities(
    previous: &EntityMap,
    current: &EntityMap,
    include_changes: bool,
) -> Vec<EntityRecord> {
    current
        .iter()
        .filter(|(key, record)| match previous.get(key.as_str()) {
            None => true,
            Some(old) => include_changes && old != *record,
        })
        .map(|(_, record)| record.clone())
        .collect()
}
