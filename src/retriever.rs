//! Retrieval orchestration: embed the question, query the store, apply the
//! relevance threshold, assemble the context string.
//!
//! The outcome is a three-way enum rather than an error: an empty knowledge
//! base and an irrelevant best match are ordinary results the caller turns
//! into informational messages, not failures. Only provider calls can fail.

use std::sync::Arc;

use crate::config::{Aggregation, RetrievalConfig};
use crate::embedding::Embedder;
use crate::error::ProviderError;
use crate::store::{ScoredPassage, VectorStore};

/// Separator between passages in `topk` aggregation mode.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Result of a retrieval pass over the knowledge base.
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// The store holds zero passages. No embedding call was made.
    Empty,
    /// The best match scored strictly below the configured threshold.
    BelowThreshold { best_score: f32 },
    /// The best match cleared the threshold. `context` is the assembled
    /// generation context; `passages` the contributing hits in
    /// descending-score order.
    Found {
        context: String,
        passages: Vec<ScoredPassage>,
    },
}

/// Reads the vector store through its query interface; never mutates it.
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    threshold: f32,
    aggregation: Aggregation,
}

impl Retriever {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            k: config.k,
            threshold: config.threshold,
            aggregation: config.aggregation,
        }
    }

    /// Retrieve context for `question`.
    ///
    /// The question is embedded exactly once per call, and only when the
    /// store is non-empty. The effective neighbor count is 1 in `single`
    /// mode, the configured k in `topk` mode, clamped to the store size by
    /// the search itself. A call cancelled before the embedding completes
    /// has touched nothing.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalOutcome, ProviderError> {
        if self.store.is_empty() {
            return Ok(RetrievalOutcome::Empty);
        }

        let query = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ProviderError::new("embedding", "provider returned an empty batch")
            })?;

        let k = match self.aggregation {
            Aggregation::Single => 1,
            Aggregation::Topk => self.k,
        };

        let hits = self.store.search(&query, k);
        let Some(best) = hits.first() else {
            // Store was cleared between the emptiness check and the search.
            return Ok(RetrievalOutcome::Empty);
        };

        if best.score < self.threshold {
            return Ok(RetrievalOutcome::BelowThreshold {
                best_score: best.score,
            });
        }

        let context = hits
            .iter()
            .map(|h| h.passage.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        Ok(RetrievalOutcome::Found {
            context,
            passages: hits,
        })
    }
}
