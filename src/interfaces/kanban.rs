//! A single-file JSON-backed `KanbanBoard`.
//!
//! Not authoritative: a real deployment would point at whatever board
//! system the organization already runs. This implementation exists so
//! the CLI and integration tests have something concrete to drive.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::KanbanBoard;
use crate::card::Card;
use crate::errors::ArtemisError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Column {
    column_id: String,
    #[serde(default)]
    cards: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct BoardFile {
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    wip_limits: HashMap<String, usize>,
}

/// A Kanban board persisted as a single JSON file.
pub struct JsonFileKanbanBoard {
    path: PathBuf,
    state: Mutex<BoardFile>,
}

impl JsonFileKanbanBoard {
    /// Loads the board from `path`, creating an empty one if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::BoardUnavailable` if the file exists but
    /// cannot be parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ArtemisError> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ArtemisError::BoardUnavailable(format!("corrupt board file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BoardFile::default(),
            Err(e) => return Err(ArtemisError::BoardUnavailable(e.to_string())),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &BoardFile) -> Result<(), ArtemisError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| ArtemisError::BoardUnavailable(e.to_string()))?;

        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("board.json")
        ));
        let json = serde_json::to_vec_pretty(state).map_err(|e| ArtemisError::BoardUnavailable(e.to_string()))?;
        std::fs::write(&tmp_path, json).map_err(|e| ArtemisError::BoardUnavailable(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| ArtemisError::BoardUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl KanbanBoard for JsonFileKanbanBoard {
    async fn get_card(&self, card_id: &str) -> Result<Card, ArtemisError> {
        let state = self.state.lock();
        state
            .columns
            .iter()
            .flat_map(|c| c.cards.iter())
            .find(|c| c.card_id == card_id)
            .cloned()
            .ok_or_else(|| ArtemisError::CardNotFound(card_id.to_string()))
    }

    async fn move_card(&self, card_id: &str, to_column: &str) -> Result<(), ArtemisError> {
        let mut state = self.state.lock();

        let limit = state.wip_limits.get(to_column).copied();
        if let Some(limit) = limit {
            let current_count = state
                .columns
                .iter()
                .find(|c| c.column_id == to_column)
                .map_or(0, |c| c.cards.len());
            if current_count >= limit {
                return Err(ArtemisError::WipLimitExceeded {
                    column: to_column.to_string(),
                    limit,
                });
            }
        }

        let mut card = None;
        for column in &mut state.columns {
            if let Some(pos) = column.cards.iter().position(|c| c.card_id == card_id) {
                card = Some(column.cards.remove(pos));
                break;
            }
        }
        let mut card = card.ok_or_else(|| ArtemisError::CardNotFound(card_id.to_string()))?;
        card.column = to_column.to_string();

        if let Some(column) = state.columns.iter_mut().find(|c| c.column_id == to_column) {
            column.cards.push(card);
        } else {
            state.columns.push(Column {
                column_id: to_column.to_string(),
                cards: vec![card],
            });
        }

        self.persist(&state)
    }

    async fn update_card_metadata(
        &self,
        card_id: &str,
        patch: HashMap<String, serde_json::Value>,
    ) -> Result<(), ArtemisError> {
        let mut state = self.state.lock();
        let card = state
            .columns
            .iter_mut()
            .flat_map(|c| c.cards.iter_mut())
            .find(|c| c.card_id == card_id)
            .ok_or_else(|| ArtemisError::CardNotFound(card_id.to_string()))?;

        for (key, value) in patch {
            card.metadata_set(key, value);
        }

        self.persist(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Priority;
    use tempfile::tempdir;

    fn board_with_one_card(path: &Path) -> JsonFileKanbanBoard {
        let board = JsonFileKanbanBoard::load(path).unwrap();
        {
            let mut state = board.state.lock();
            state.columns.push(Column {
                column_id: "backlog".to_string(),
                cards: vec![Card::new("card-1", "Do the thing", Priority::Medium)],
            });
            state.wip_limits.insert("in_progress".to_string(), 1);
        }
        board
    }

    #[tokio::test]
    async fn test_get_missing_card_fails() {
        let dir = tempdir().unwrap();
        let board = JsonFileKanbanBoard::load(dir.path().join("board.json")).unwrap();
        let err = board.get_card("nope").await.unwrap_err();
        assert!(matches!(err, ArtemisError::CardNotFound(_)));
    }

    #[tokio::test]
    async fn test_move_card_respects_wip_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");
        let board = board_with_one_card(&path);

        board.move_card("card-1", "in_progress").await.unwrap();
        {
            let mut state = board.state.lock();
            state.columns.iter_mut().find(|c| c.column_id == "backlog").unwrap().cards.push(
                Card::new("card-2", "Another", Priority::Low),
            );
        }

        let err = board.move_card("card-2", "in_progress").await.unwrap_err();
        assert!(matches!(err, ArtemisError::WipLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_update_metadata_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");
        let board = board_with_one_card(&path);

        let mut patch = HashMap::new();
        patch.insert("owner".to_string(), serde_json::json!("team-a"));
        board.update_card_metadata("card-1", patch).await.unwrap();

        let card = board.get_card("card-1").await.unwrap();
        assert_eq!(card.metadata_get("owner"), Some(&serde_json::json!("team-a")));

        let reloaded = JsonFileKanbanBoard::load(&path).unwrap();
        let card = reloaded.get_card("card-1").await.unwrap();
        assert_eq!(card.metadata_get("owner"), Some(&serde_json::json!("team-a")));
    }
}
