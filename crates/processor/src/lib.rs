//! C6 Activity Processor: orchestrates C3 (Summarizer) + C4 (Embedder) +
//! C1 (Activity Store) for a single item, implementing the decision table
//! from spec §4.6.
//!
//! Summarization and embedding run sequentially within one item (embedding
//! consumes the summary text); the scheduler is responsible for running
//! many items concurrently under a bounded pool.

use feedengine_common::errors::Result;
use feedengine_common::types::{Activity, ActivitySummary, DecoratedActivity};
use feedengine_llm::completion::CompletionModel;
use feedengine_llm::embedder::Embedder;
use feedengine_llm::embedding::EmbeddingModel;
use feedengine_llm::summarizer::Summarizer;
use feedengine_store::ActivityStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-call processing flags (spec §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Reserved for future non-upsert write modes; the current store only
    /// supports upsert semantics, so this flag is accepted but unused.
    pub upsert: bool,
    pub force_reprocess_summary: bool,
    pub force_reprocess_embedding: bool,
}

pub struct ActivityProcessor<C: CompletionModel, E: EmbeddingModel> {
    summarizer: Arc<Summarizer<C>>,
    embedder: Arc<Embedder<E>>,
    store: Arc<ActivityStore>,
}

impl<C: CompletionModel, E: EmbeddingModel> ActivityProcessor<C, E> {
    pub fn new(summarizer: Arc<Summarizer<C>>, embedder: Arc<Embedder<E>>, store: Arc<ActivityStore>) -> Self {
        Self { summarizer, embedder, store }
    }

    /// Returns `true` if a write happened (insert or update), `false` if
    /// the item was skipped because an up-to-date complete row already
    /// existed.
    pub async fn create(&self, activity: Activity, opts: CreateOptions) -> Result<bool> {
        activity.validate_type_invariant()?;

        let existing = self.store.get(&activity.uid).await?;

        let (summary, embedding) = match existing {
            None => {
                // no existing row: summarize, embed, insert.
                let summary = self.summarize(&activity).await?;
                let embedding = self.embed(&summary).await?;
                (summary, embedding)
            }
            Some(stored)
                if stored.is_complete()
                    && !opts.upsert
                    && !opts.force_reprocess_summary
                    && !opts.force_reprocess_embedding =>
            {
                // complete, no upsert, no force flags: skip entirely.
                info!(uid = %activity.uid, "activity already complete, skipping");
                return Ok(false);
            }
            Some(stored) if opts.force_reprocess_summary => {
                // force summary: re-summarize, then always re-embed the new summary.
                let _ = stored;
                let summary = self.summarize(&activity).await?;
                let embedding = self.embed(&summary).await?;
                (summary, embedding)
            }
            Some(stored) if opts.force_reprocess_embedding => {
                // force embedding only: reuse existing summary if present, else produce one.
                let summary = match stored.summary {
                    Some(summary) => summary,
                    None => self.summarize(&activity).await?,
                };
                let embedding = self.embed(&summary).await?;
                (summary, embedding)
            }
            Some(stored) if stored.is_complete() => {
                // complete, upsert requested, no force flags: re-merge sourceUIDs by
                // reusing the existing summary+embedding and letting the store's
                // upsert perform the sourceUIDs union and field refresh.
                let summary = stored.summary.expect("is_complete implies summary is Some");
                let embedding = stored
                    .embedding_1536
                    .or(stored.embedding_3072)
                    .expect("is_complete implies an embedding column is Some");
                (summary, embedding)
            }
            Some(stored) => {
                // incomplete: fill whichever of summary/embedding is missing.
                let summary = match stored.summary {
                    Some(summary) => summary,
                    None => self.summarize(&activity).await?,
                };
                let embedding = match stored.embedding_1536.or(stored.embedding_3072) {
                    Some(embedding) => embedding,
                    None => self.embed(&summary).await?,
                };
                (summary, embedding)
            }
        };

        let decorated = DecoratedActivity { activity, summary, embedding, similarity: None };
        self.store.upsert(&decorated).await?;
        Ok(true)
    }

    async fn summarize(&self, activity: &Activity) -> Result<ActivitySummary> {
        match self.summarizer.summarize_activity(activity).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                warn!(uid = %activity.uid, error = %err, "summarization failed");
                Err(err)
            }
        }
    }

    async fn embed(&self, summary: &ActivitySummary) -> Result<Vec<f32>> {
        match self.embedder.embed_activity(summary).await {
            Ok(embedding) => Ok(embedding),
            Err(err) => {
                warn!(error = %err, "embedding failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Decision-table coverage lives in `feedengine-scheduler`'s integration
    //! tests, which have access to an in-memory `Fetcher`/`Source` pair and
    //! a real `ActivityStore`; constructing one here would require a live
    //! Postgres connection, which this workspace's unit tests avoid.
}
