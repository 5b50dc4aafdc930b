//! ConCommerce Common Library
//!
//! Shared code for the ConCommerce services including:
//! - Catalog, filter and conversation models
//! - Embedding, similarity index and text generation clients
//! - Context components (routing, interpretation, grounding, selection)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::{Embedder, EmbedderSet};
pub use errors::{AppError, Result};
pub use index::SimilarityIndex;
pub use llm::{GeneratorPool, TextGenerator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dimensionality shared by both embedding spaces
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
