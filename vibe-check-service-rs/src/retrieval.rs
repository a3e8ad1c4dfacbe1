//! Retrieval stage: nearest knowledge-base passages for an analysis
//!
//! Retrieval fails open. Any embedding or index failure is logged and
//! yields an empty, degraded `KnowledgeSet` so generation can proceed
//! without citations.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::timeout;

use crate::models::{KnowledgeMatch, KnowledgeSet, VisionAnalysis};
use crate::providers::{Embedder, VectorIndex};

const CONTENT_KEYS: &[&str] = &["content", "text"];
const SOURCE_KEYS: &[&str] = &["source", "url"];

pub struct KnowledgeRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: u32,
    timeout: Duration,
}

impl KnowledgeRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: u32, timeout: Duration) -> Self {
        Self {
            embedder,
            index,
            top_k,
            timeout,
        }
    }

    pub async fn retrieve(&self, analysis: &VisionAnalysis) -> KnowledgeSet {
        let query = query_text(analysis);

        match self.search(&query).await {
            Ok(matches) => {
                debug!("Retrieved {} knowledge passages", matches.len());
                KnowledgeSet::new(matches)
            }
            Err(reason) => {
                warn!("Retrieval degraded, continuing without citations: {}", reason);
                KnowledgeSet::degraded(reason)
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<KnowledgeMatch>, String> {
        let vector = match timeout(self.timeout, self.embedder.embed(query)).await {
            Ok(Ok(vector)) if vector.is_empty() => return Err("embedding is empty".to_string()),
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => return Err(format!("embedding failed: {}", e)),
            Err(_) => return Err(format!("embedding timed out after {}s", self.timeout.as_secs())),
        };

        let scored = match timeout(self.timeout, self.index.query(vector, self.top_k)).await {
            Ok(Ok(scored)) => scored,
            Ok(Err(e)) => return Err(format!("index query failed: {}", e)),
            Err(_) => return Err(format!("index query timed out after {}s", self.timeout.as_secs())),
        };

        let mut matches: Vec<KnowledgeMatch> = scored
            .iter()
            .filter(|m| m.score.is_finite())
            .filter_map(|m| {
                Some(KnowledgeMatch {
                    content: m.metadata_str(CONTENT_KEYS)?.trim().to_string(),
                    score: m.score,
                    source: m.metadata_str(SOURCE_KEYS).unwrap_or_default().trim().to_string(),
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.top_k as usize);
        Ok(matches)
    }
}

/// Text embedded for the similarity search
pub fn query_text(analysis: &VisionAnalysis) -> String {
    format!("{} {} {}", analysis.body_language, analysis.mood, analysis.behavior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use vibe_sdk::pinecone::ScoredVector;
    use vibe_sdk::ServiceError;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> vibe_sdk::Result<Vec<f32>> {
            assert_eq!(text, "tail wagging happy playful");
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> vibe_sdk::Result<Vec<f32>> {
            Err(ServiceError::rate_limit("Rate limit reached for text-embedding-3-small"))
        }
    }

    struct StaticIndex(Vec<ScoredVector>);

    #[async_trait]
    impl VectorIndex for StaticIndex {
        async fn query(&self, _vector: Vec<f32>, _top_k: u32) -> vibe_sdk::Result<Vec<ScoredVector>> {
            Ok(self.0.clone())
        }
    }

    struct HangingIndex;

    #[async_trait]
    impl VectorIndex for HangingIndex {
        async fn query(&self, _vector: Vec<f32>, _top_k: u32) -> vibe_sdk::Result<Vec<ScoredVector>> {
            std::future::pending().await
        }
    }

    fn analysis() -> VisionAnalysis {
        VisionAnalysis {
            body_language: "tail wagging".to_string(),
            mood: "happy".to_string(),
            behavior: "playful".to_string(),
            confidence: 0.9,
        }
    }

    fn scored(id: &str, score: f32, metadata: serde_json::Value) -> ScoredVector {
        ScoredVector {
            id: id.to_string(),
            score,
            metadata: metadata.as_object().cloned(),
        }
    }

    #[tokio::test]
    async fn test_matches_are_ranked_mapped_and_truncated() {
        let index = StaticIndex(vec![
            scored("a", 0.61, json!({"text": "Relaxed mouth signals calm.", "url": "https://kb.example/a"})),
            scored("b", 0.92, json!({"content": "Wagging at hip height is friendly.", "source": "https://kb.example/b"})),
            scored("c", 0.75, json!({"content": "Play bows invite play."})),
            scored("no-text", 0.99, json!({"source": "https://kb.example/x"})),
        ]);
        let retriever = KnowledgeRetriever::new(
            Arc::new(FixedEmbedder(vec![0.1, 0.2])),
            Arc::new(index),
            2,
            Duration::from_secs(5),
        );

        let set = retriever.retrieve(&analysis()).await;
        assert!(!set.is_degraded());
        assert_eq!(set.scores(), vec![0.92, 0.75]);
        assert_eq!(set.matches[1].source, "");
        assert_eq!(set.first_source(), Some("https://kb.example/b"));
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_open() {
        let retriever = KnowledgeRetriever::new(
            Arc::new(FailingEmbedder),
            Arc::new(StaticIndex(Vec::new())),
            5,
            Duration::from_secs(5),
        );

        let set = retriever.retrieve(&analysis()).await;
        assert!(set.is_empty());
        assert!(set.degraded.as_deref().unwrap_or_default().contains("embedding failed"));
    }

    #[tokio::test]
    async fn test_index_timeout_fails_open() {
        let retriever = KnowledgeRetriever::new(
            Arc::new(FixedEmbedder(vec![0.3])),
            Arc::new(HangingIndex),
            5,
            Duration::from_millis(20),
        );

        let set = retriever.retrieve(&analysis()).await;
        assert!(set.is_empty());
        assert!(set.degraded.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_embedding_is_degraded() {
        let retriever = KnowledgeRetriever::new(
            Arc::new(FixedEmbedder(Vec::new())),
            Arc::new(StaticIndex(Vec::new())),
            5,
            Duration::from_secs(5),
        );

        assert_eq!(
            retriever.retrieve(&analysis()).await,
            KnowledgeSet::degraded("embedding is empty")
        );
    }
}
