//! Similarity index abstraction
//!
//! The catalog lives in a managed vector index with one partition per
//! embedding space. Metadata predicates are expressed with a small filter
//! algebra and rendered into the index's JSON filter language.

mod pinecone;

pub use pinecone::PineconeIndex;

use crate::embeddings::QueryVector;
use crate::errors::Result;
use crate::models::{CatalogItem, EmbeddingSpace, Source, Specs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Metadata keys used by the catalog upload format
pub mod fields {
    pub const NAME: &str = "name";
    pub const PRICE_MIN: &str = "price_min";
    pub const PRICE_MAX: &str = "price_max";
    pub const CATEGORY: &str = "category";
    pub const BRAND: &str = "brand";
    pub const SOURCE: &str = "source";
    pub const URL: &str = "url";
    pub const IMAGE: &str = "image";
    pub const WARRANTY: &str = "warranty";
    pub const PROCESSOR: &str = "processor";
    pub const RAM: &str = "ram";
    pub const STORAGE: &str = "storage";
    pub const GRAPHICS: &str = "graphics";
    pub const AVAILABILITY: &str = "availability";
    pub const RATING: &str = "rating";
    pub const REVIEW_COUNT: &str = "review_count";
}

/// A single metadata predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field >= value`
    AtLeast { field: &'static str, value: u64 },
    /// `field <= value`
    AtMost { field: &'static str, value: u64 },
    /// `field` equals one of `values`
    OneOf { field: &'static str, values: Vec<String> },
}

impl Predicate {
    fn to_json(&self) -> Value {
        match self {
            Predicate::AtLeast { field, value } => json!({ *field: { "$gte": value } }),
            Predicate::AtMost { field, value } => json!({ *field: { "$lte": value } }),
            Predicate::OneOf { field, values } => json!({ *field: { "$in": values } }),
        }
    }
}

/// Conjunction of metadata predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFilter {
    predicates: Vec<Predicate>,
}

impl IndexFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Render as a metadata filter document. `None` when unconstrained.
    pub fn to_json(&self) -> Option<Value> {
        match self.predicates.as_slice() {
            [] => None,
            [single] => Some(single.to_json()),
            many => Some(json!({ "$and": many.iter().map(Predicate::to_json).collect::<Vec<_>>() })),
        }
    }
}

/// A candidate returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub item: CatalogItem,
    pub score: f32,
}

/// Index health summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vectors: u64,
    pub namespaces: HashMap<String, u64>,
}

/// Trait for similarity index backends
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Nearest neighbours of `vector` in the partition of its embedding
    /// space, best first
    async fn query(
        &self,
        vector: &QueryVector,
        filter: &IndexFilter,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>>;

    /// Look up items by id in one partition. Unknown ids are skipped.
    async fn fetch_by_id(&self, ids: &[String], space: EmbeddingSpace) -> Result<Vec<CatalogItem>>;

    /// Vector counts and dimensionality
    async fn describe_stats(&self) -> Result<IndexStats>;
}

fn text(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers are stored as floats by the index
fn amount(metadata: &Map<String, Value>, key: &str) -> Option<u64> {
    metadata
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// Build a catalog item from stored metadata.
///
/// Returns `None` for records without a name or with an unknown source.
/// A missing upper price falls back to the lower one.
pub fn item_from_metadata(id: &str, metadata: &Map<String, Value>) -> Option<CatalogItem> {
    let name = text(metadata, fields::NAME)?;

    let source = match text(metadata, fields::SOURCE)?.parse::<Source>() {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!(id = id, error = %e, "Skipping item with unknown source");
            return None;
        }
    };

    let price_min = amount(metadata, fields::PRICE_MIN).unwrap_or(0);
    let price_max = amount(metadata, fields::PRICE_MAX)
        .filter(|max| *max > 0)
        .unwrap_or(price_min)
        .max(price_min);

    Some(CatalogItem {
        id: id.to_string(),
        name,
        price_min,
        price_max,
        category: text(metadata, fields::CATEGORY).unwrap_or_default(),
        brand: text(metadata, fields::BRAND).unwrap_or_default(),
        source,
        url: text(metadata, fields::URL).unwrap_or_default(),
        image: text(metadata, fields::IMAGE),
        specs: Specs {
            processor: text(metadata, fields::PROCESSOR),
            ram: text(metadata, fields::RAM),
            storage: text(metadata, fields::STORAGE),
            graphics: text(metadata, fields::GRAPHICS),
        },
        warranty: text(metadata, fields::WARRANTY).unwrap_or_default(),
        availability: text(metadata, fields::AVAILABILITY),
        rating: metadata
            .get(fields::RATING)
            .and_then(Value::as_f64)
            .map(|r| r as f32),
        review_count: amount(metadata, fields::REVIEW_COUNT).map(|c| c as u32),
    })
}
