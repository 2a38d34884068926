//! Durable, atomic persistence of a pipeline's state.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use super::{PipelineState, StageInfo};
use crate::errors::ArtemisError;

/// Everything needed to rehydrate a `StateMachine` for one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The pipeline state at snapshot time.
    pub state: PipelineState,
    /// The stage currently active, if any.
    pub active_stage: Option<String>,
    /// Overall health label.
    pub health_status: String,
    /// Issue types currently being recovered from.
    #[serde(default)]
    pub active_issues: Vec<String>,
    /// Per-stage lifecycle records.
    #[serde(default)]
    pub stages: HashMap<String, StageInfo>,
    /// Stage names whose circuit breaker is currently open.
    #[serde(default)]
    pub circuit_breakers_open: HashSet<String>,
    /// When the snapshot was written (ISO 8601).
    pub timestamp: String,
}

impl Snapshot {
    /// Writes the snapshot atomically: write to a temp file in the same
    /// directory, then rename over the target path.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::SnapshotIoError` if any filesystem
    /// operation fails.
    pub fn write_atomic(&self, path: &Path) -> Result<(), ArtemisError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .map_err(|e| ArtemisError::SnapshotIoError(e.to_string()))?;

        let tmp_path = dir.join(format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot")
        ));

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ArtemisError::SnapshotIoError(e.to_string()))?;

        {
            let mut file = std::fs::File::create(&tmp_path)
                .map_err(|e| ArtemisError::SnapshotIoError(e.to_string()))?;
            file.write_all(&json)
                .map_err(|e| ArtemisError::SnapshotIoError(e.to_string()))?;
            file.sync_all().map_err(|e| ArtemisError::SnapshotIoError(e.to_string()))?;
        }

        std::fs::rename(&tmp_path, path)
            .map_err(|e| ArtemisError::SnapshotIoError(e.to_string()))?;

        Ok(())
    }

    /// Reads a snapshot from disk.
    ///
    /// A corrupt or missing snapshot is treated as "no snapshot" rather
    /// than an error: callers fall back to a fresh `IDLE` machine, since
    /// crash-time corruption must not be fatal to the next run.
    #[must_use]
    pub fn read_best_effort(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Builds the default snapshot path for a card under a state
    /// directory: `<state_dir>/<card_id>_state.json`.
    #[must_use]
    pub fn path_for(state_dir: &Path, card_id: &str) -> std::path::PathBuf {
        state_dir.join(format!("{card_id}_state.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        Snapshot {
            state: PipelineState::Running,
            active_stage: Some("architecture".to_string()),
            health_status: "healthy".to_string(),
            active_issues: Vec::new(),
            stages: HashMap::new(),
            circuit_breakers_open: HashSet::new(),
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    #[test]
    fn test_write_then_read_round_trip() {
        use pretty_assertions::assert_eq;

        let dir = tempdir().unwrap();
        let path = Snapshot::path_for(dir.path(), "card-1");

        let snapshot = sample();
        snapshot.write_atomic(&path).unwrap();

        let restored = Snapshot::read_best_effort(&path).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_corrupt_snapshot_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("card-2_state.json");
        std::fs::write(&path, b"not json").unwrap();

        assert!(Snapshot::read_best_effort(&path).is_none());
    }

    #[test]
    fn test_missing_snapshot_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = Snapshot::path_for(dir.path(), "never-written");
        assert!(Snapshot::read_best_effort(&path).is_none());
    }

    #[test]
    fn test_write_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let path = Snapshot::path_for(dir.path(), "card-3");

        let mut snapshot = sample();
        snapshot.write_atomic(&path).unwrap();

        snapshot.state = PipelineState::Completed;
        snapshot.write_atomic(&path).unwrap();

        let restored = Snapshot::read_best_effort(&path).unwrap();
        assert_eq!(restored.state, PipelineState::Completed);
    }
}
