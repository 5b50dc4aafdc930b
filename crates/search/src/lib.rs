//! ConCommerce Search
//!
//! Relevance retrieval over the catalog index:
//! - Translation of merged filters into index predicates
//! - Per-space relevance thresholds
//! - Category, price-containment and ordering post-filters

pub mod retrieval;

pub use retrieval::{RelevanceRetriever, RetrievalResult, Retriever};
