//! The unit of work the pipeline drives through its stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Priority of a card, as set by whoever filed the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
    /// Critical priority.
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A unit of work tracked on the Kanban board and driven through the
/// pipeline.
///
/// `metadata` is append-only by convention: the core only ever adds keys
/// to it (stage artifacts), it never removes or overwrites existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Stable, opaque identifier.
    pub card_id: String,
    /// Short human title.
    pub title: String,
    /// Full description of the task.
    #[serde(default)]
    pub description: String,
    /// Priority bucket.
    pub priority: Priority,
    /// Estimated story points.
    #[serde(default)]
    pub story_points: u32,
    /// Ordered acceptance criteria.
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Optional prompts capturing user research context.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_research_prompts: Vec<String>,
    /// Current Kanban column.
    #[serde(default)]
    pub column: String,
    /// Append-only metadata bag.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Card {
    /// Creates a new card with the required fields and sensible defaults
    /// for everything else.
    #[must_use]
    pub fn new(card_id: impl Into<String>, title: impl Into<String>, priority: Priority) -> Self {
        Self {
            card_id: card_id.into(),
            title: title.into(),
            description: String::new(),
            priority,
            story_points: 0,
            acceptance_criteria: Vec::new(),
            user_research_prompts: Vec::new(),
            column: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Returns a metadata value by key, if present.
    #[must_use]
    pub fn metadata_get(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Appends a metadata entry.
    ///
    /// Overwriting an existing key is allowed here (the board is the
    /// authority on conflicts); the *context* namespaces enforce
    /// append-only semantics strictly (see [`crate::context`]).
    pub fn metadata_set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}
