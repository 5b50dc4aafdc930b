//! Relevance retrieval
//!
//! A retrieval runs in two halves:
//! - Index side: similarity query in the partition of the vector's space,
//!   constrained by price, brand and source predicates
//! - Client side: relevance threshold, category substring match, strict
//!   price containment, cheapest-first ordering under a budget, and trim

mod filter;
mod vector;

pub use filter::{brand_variants, index_filter, post_filter, top_k};
pub use vector::RelevanceRetriever;

use concommerce_common::embeddings::QueryVector;
use concommerce_common::errors::Result;
use concommerce_common::models::{EmbeddingSpace, MergedFilter, ScoredItem};
use serde::{Deserialize, Serialize};

/// Ranked candidates from one retrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Candidates after post-filtering, in final order
    pub items: Vec<ScoredItem>,

    /// Candidates returned by the index before post-filtering
    pub fetched: usize,

    /// Candidates that met the relevance threshold
    pub above_threshold: usize,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Common trait for retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `limit` candidates for `vector` under `filter`.
    ///
    /// `space` must be the space that produced `vector`.
    async fn retrieve(
        &self,
        vector: &QueryVector,
        filter: &MergedFilter,
        limit: usize,
        space: EmbeddingSpace,
    ) -> Result<RetrievalResult>;
}
