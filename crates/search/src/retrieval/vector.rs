//! Vector similarity retrieval against the catalog index
//!
//! Provides semantic search via embedding similarity, with per-space
//! relevance thresholds.

use super::filter::{index_filter, post_filter, top_k};
use super::{RetrievalResult, Retriever};
use concommerce_common::config::RetrievalConfig;
use concommerce_common::embeddings::QueryVector;
use concommerce_common::errors::{AppError, Result};
use concommerce_common::index::SimilarityIndex;
use concommerce_common::metrics;
use concommerce_common::models::{EmbeddingSpace, MergedFilter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retriever over a similarity index
pub struct RelevanceRetriever {
    index: Arc<dyn SimilarityIndex>,
    thresholds: HashMap<EmbeddingSpace, f32>,
    timeout: Duration,
}

impl RelevanceRetriever {
    /// Create a retriever; `timeout` bounds each index call
    pub fn new(index: Arc<dyn SimilarityIndex>, config: &RetrievalConfig, timeout: Duration) -> Self {
        let thresholds = EmbeddingSpace::ALL
            .into_iter()
            .map(|space| (space, config.threshold(space)))
            .collect();

        Self {
            index,
            thresholds,
            timeout,
        }
    }

    /// Relevance threshold for a space
    pub fn threshold(&self, space: EmbeddingSpace) -> f32 {
        self.thresholds.get(&space).copied().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Retriever for RelevanceRetriever {
    async fn retrieve(
        &self,
        vector: &QueryVector,
        filter: &MergedFilter,
        limit: usize,
        space: EmbeddingSpace,
    ) -> Result<RetrievalResult> {
        if vector.space != space {
            return Err(AppError::Validation {
                message: format!(
                    "Query vector from '{}' cannot be searched in the '{}' partition",
                    vector.space, space
                ),
                field: Some("embedding_model".to_string()),
            });
        }

        let predicates = index_filter(filter);
        let top_k = top_k(filter, limit);
        let start = Instant::now();

        let query = self.index.query(vector, &predicates, top_k);
        let matches = match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::error!(space = %space, error = %e, "Index query failed");
                return Err(match e {
                    err @ AppError::SearchUnavailable { .. } => err,
                    other => AppError::SearchUnavailable {
                        message: other.to_string(),
                    },
                });
            }
            Err(_) => {
                tracing::error!(
                    space = %space,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Index query timed out"
                );
                return Err(AppError::SearchUnavailable {
                    message: format!("Index query timed out after {}ms", self.timeout.as_millis()),
                });
            }
        };

        let result = post_filter(matches, filter, self.threshold(space), limit);

        metrics::record_retrieval(start.elapsed().as_secs_f64(), space.as_str(), result.len());
        tracing::info!(
            space = %space,
            top_k = top_k,
            fetched = result.fetched,
            above_threshold = result.above_threshold,
            returned = result.len(),
            "Retrieval complete"
        );

        Ok(result)
    }
}
