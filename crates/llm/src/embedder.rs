//! C4 Embedder: wraps an `EmbeddingModel` with the process-wide dimension
//! choice and an optional in-process cache keyed by input text (spec §4.4).

use crate::embedding::EmbeddingModel;
use feedengine_common::errors::Result;
use feedengine_common::types::ActivitySummary;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

pub struct Embedder<M: EmbeddingModel> {
    model: M,
    cache: Option<Cache<String, Arc<Vec<f32>>>>,
}

impl<M: EmbeddingModel> Embedder<M> {
    pub fn new(model: M) -> Self {
        Self { model, cache: None }
    }

    /// Enables the optional in-process embedding cache (spec §4.4: "not
    /// persisted").
    pub fn with_cache(model: M, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { model, cache: Some(cache) }
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// Embeds the `fullSummary` text of a summary.
    pub async fn embed_activity(&self, summary: &ActivitySummary) -> Result<Vec<f32>> {
        self.embed_text(&summary.full_summary).await
    }

    /// Embeds a raw query string for use in a similarity search.
    pub async fn embed_activity_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_text(query).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(text).await {
                return Ok((*hit).clone());
            }
        }

        let mut embeddings = self.model.create_embedding(std::slice::from_ref(&text.to_string())).await?;
        let embedding = embeddings.pop().unwrap_or_default();

        if let Some(cache) = &self.cache {
            cache.insert(text.to_string(), Arc::new(embedding.clone())).await;
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingModel;

    #[tokio::test]
    async fn embeds_full_summary_text() {
        let embedder = Embedder::new(MockEmbeddingModel::new(1536));
        let summary = ActivitySummary {
            short_summary: "short".into(),
            full_summary: "### Context\nsome content".into(),
        };
        let embedding = embedder.embed_activity(&summary).await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }

    #[tokio::test]
    async fn cache_returns_identical_vector_for_same_text() {
        let embedder = Embedder::with_cache(MockEmbeddingModel::new(8), 100, Duration::from_secs(60));
        let a = embedder.embed_activity_query("rust async runtimes").await.unwrap();
        let b = embedder.embed_activity_query("rust async runtimes").await.unwrap();
        assert_eq!(a, b);
    }
}
