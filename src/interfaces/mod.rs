//! The narrow interfaces the core consumes from its knowledge and
//! coordination substrate, plus the reference implementations the
//! binary is wired against by default.

mod kanban;
mod messenger;
mod rag;

pub use kanban::JsonFileKanbanBoard;
pub use messenger::MailboxMessenger;
pub use rag::InMemoryRag;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::card::Card;
use crate::errors::ArtemisError;

/// The Kanban board the core moves cards across.
#[async_trait]
pub trait KanbanBoard: Send + Sync {
    /// Fetches a card by id.
    async fn get_card(&self, card_id: &str) -> Result<Card, ArtemisError>;

    /// Moves a card to a new column, enforcing the column's WIP limit.
    async fn move_card(&self, card_id: &str, to_column: &str) -> Result<(), ArtemisError>;

    /// Merges `patch` into a card's metadata.
    async fn update_card_metadata(
        &self,
        card_id: &str,
        patch: HashMap<String, serde_json::Value>,
    ) -> Result<(), ArtemisError>;
}

/// One entry a messenger delivers or stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique id, used by consumers to deduplicate at-least-once
    /// delivery.
    pub message_id: String,
    /// Sender identifier.
    pub from: String,
    /// Recipient identifier, or `"all"` for a broadcast.
    pub to: String,
    /// Message kind: `data_update`, `error`, or `alert`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// The card this message concerns.
    pub card_id: String,
    /// Delivery priority, mirroring `Card::priority`.
    pub priority: crate::card::Priority,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

/// The mailbox-style transport used for inter-agent coordination.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends (or broadcasts) a message.
    async fn send(&self, message: Message) -> Result<(), ArtemisError>;

    /// Reads the shared state bag for a card.
    async fn get_shared_state(&self, card_id: &str) -> Result<HashMap<String, serde_json::Value>, ArtemisError>;

    /// Merges `patch` into a card's shared state bag.
    async fn update_shared_state(
        &self,
        card_id: &str,
        patch: HashMap<String, serde_json::Value>,
    ) -> Result<(), ArtemisError>;
}

/// One ranked result from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarArtifact {
    /// The stored content.
    pub content: String,
    /// Metadata recorded alongside the content.
    pub metadata: HashMap<String, serde_json::Value>,
    /// Similarity score in `[0.0, 1.0]`, higher is more similar.
    pub score: f64,
}

/// A bundle of recommendations for a task description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    /// Prior runs that succeeded on similar tasks.
    pub similar_successes: Vec<SimilarArtifact>,
    /// Freeform notes mined from history.
    pub historical_insights: Vec<String>,
    /// The store's confidence in these recommendations, in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// The artifact/recommendation store ("RAG") the core consumes.
///
/// Exactly one instance is shared by the orchestrator, supervisor, and
/// stages within a process — constructing a second instance against the
/// same backing store is a configuration error the binary avoids by
/// wiring a single `Arc<dyn RagStore>` at startup.
#[async_trait]
pub trait RagStore: Send + Sync {
    /// Appends an artifact. Failures here must never fail the pipeline:
    /// callers log-and-continue rather than propagating the error.
    async fn store_artifact(
        &self,
        artifact_type: &str,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<String, ArtemisError>;

    /// Finds the `top_k` most similar stored artifacts to `query_text`.
    async fn query_similar(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<SimilarArtifact>, ArtemisError>;

    /// Produces a recommendation bundle for a task description.
    async fn get_recommendations(&self, task_description: &str) -> Result<Recommendations, ArtemisError>;
}
