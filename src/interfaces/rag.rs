//! An in-memory `RagStore` using naive term-overlap scoring.
//!
//! No embeddings, no external service: good enough to exercise the
//! orchestrator and supervisor end to end, not a real retrieval backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::{Recommendations, RagStore, SimilarArtifact};
use crate::errors::ArtemisError;

#[derive(Debug, Clone)]
struct StoredArtifact {
    artifact_type: String,
    content: String,
    metadata: HashMap<String, serde_json::Value>,
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

fn overlap_score(query: &HashSet<String>, candidate: &HashSet<String>) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let intersection = query.intersection(candidate).count() as f64;
    let union = query.union(candidate).count() as f64;
    intersection / union
}

/// An in-process artifact store with no persistence across runs.
#[derive(Default)]
pub struct InMemoryRag {
    artifacts: Mutex<Vec<StoredArtifact>>,
}

impl InMemoryRag {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored artifacts, used to assert the
    /// append-only invariant in tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    /// Returns true if no artifacts have been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

#[async_trait]
impl RagStore for InMemoryRag {
    async fn store_artifact(
        &self,
        artifact_type: &str,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<String, ArtemisError> {
        let id = crate::utils::generate_uuid().to_string();
        self.artifacts.lock().push(StoredArtifact {
            artifact_type: artifact_type.to_string(),
            content: content.to_string(),
            metadata,
        });
        Ok(id)
    }

    async fn query_similar(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<SimilarArtifact>, ArtemisError> {
        let query_tokens = tokenize(query_text);
        let artifacts = self.artifacts.lock();

        let mut scored: Vec<SimilarArtifact> = artifacts
            .iter()
            .filter(|a| filter.map_or(true, |f| a.artifact_type == f))
            .map(|a| SimilarArtifact {
                content: a.content.clone(),
                metadata: a.metadata.clone(),
                score: overlap_score(&query_tokens, &tokenize(&a.content)),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get_recommendations(&self, task_description: &str) -> Result<Recommendations, ArtemisError> {
        let similar = self.query_similar(task_description, 5, Some("success")).await?;
        let confidence = similar.first().map_or(0.0, |a| a.score);

        let historical_insights = similar
            .iter()
            .filter(|a| a.score > 0.0)
            .map(|a| format!("similar prior task (score {:.2}): {}", a.score, a.content))
            .collect();

        Ok(Recommendations {
            similar_successes: similar,
            historical_insights,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_is_append_only() {
        let rag = InMemoryRag::new();
        rag.store_artifact("success", "built a login page", HashMap::new()).await.unwrap();
        assert_eq!(rag.len(), 1);
        rag.store_artifact("success", "built a signup page", HashMap::new()).await.unwrap();
        assert_eq!(rag.len(), 2);
    }

    #[tokio::test]
    async fn test_query_similar_ranks_by_overlap() {
        let rag = InMemoryRag::new();
        rag.store_artifact("success", "add login page with oauth", HashMap::new()).await.unwrap();
        rag.store_artifact("success", "completely unrelated artifact text", HashMap::new()).await.unwrap();

        let results = rag.query_similar("add login page", 2, None).await.unwrap();
        assert_eq!(results[0].content, "add login page with oauth");
    }

    #[tokio::test]
    async fn test_recommendations_confidence_reflects_top_score() {
        let rag = InMemoryRag::new();
        rag.store_artifact("success", "implement rate limiting middleware", HashMap::new())
            .await
            .unwrap();

        let recs = rag.get_recommendations("implement rate limiting").await.unwrap();
        assert!(recs.confidence > 0.0);
        assert!(!recs.historical_insights.is_empty());
    }
}
