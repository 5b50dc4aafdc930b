//! ConCommerce Testkit
//!
//! In-memory doubles for every external collaborator of the pipeline,
//! with call counters so tests can assert which calls were (not) made.

use async_trait::async_trait;
use concommerce_common::embeddings::{Embedder, EmbedderSet, QueryVector};
use concommerce_common::errors::{AppError, Result};
use concommerce_common::index::{fields, IndexFilter, IndexMatch, IndexStats, Predicate, SimilarityIndex};
use concommerce_common::llm::{GenerationRequest, GeneratorPool, TextGenerator};
use concommerce_common::models::{
    CatalogItem, EmbeddingSpace, GenerationBackend, Source, Specs,
};
use concommerce_common::DEFAULT_EMBEDDING_DIMENSION;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// A laptop-shaped catalog item with the given id and price interval
pub fn catalog_item(id: &str, price_min: u64, price_max: u64) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        name: format!("Product {}", id),
        price_min,
        price_max,
        category: "Laptop".to_string(),
        brand: "ASUS".to_string(),
        source: Source::StarTech,
        url: format!("https://www.startech.com.bd/{}", id),
        image: None,
        specs: Specs::default(),
        warranty: "1 year".to_string(),
        availability: None,
        rating: None,
        review_count: None,
    }
}

/// Deterministic embedder; vectors derive from the text bytes
pub struct StaticEmbedder {
    space: EmbeddingSpace,
    dimension: usize,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(space: EmbeddingSpace) -> Self {
        Self {
            space,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// An embedder whose every call fails
    pub fn failing(space: EmbeddingSpace) -> Self {
        Self {
            failing: true,
            ..Self::new(space)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(AppError::EmbeddingError {
                message: "quota exceeded".to_string(),
            });
        }

        let bytes = text.as_bytes();
        Ok((0..self.dimension)
            .map(|i| {
                let byte = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(0);
                f32::from(byte) / 255.0
            })
            .collect())
    }

    fn space(&self) -> EmbeddingSpace {
        self.space
    }

    fn model_name(&self) -> &str {
        "static"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// An embedder set over the given doubles
pub fn embedder_set(embedders: Vec<Arc<StaticEmbedder>>) -> EmbedderSet {
    let embedders: Vec<Arc<dyn Embedder>> = embedders
        .into_iter()
        .map(|e| e as Arc<dyn Embedder>)
        .collect();
    EmbedderSet::new(embedders, Duration::from_secs(1))
}

/// One call recorded by [`FakeIndex`]
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub space: EmbeddingSpace,
    pub filter: IndexFilter,
    pub top_k: usize,
}

/// In-memory index. Applies metadata predicates like the real index and
/// returns fixtures in stored order, truncated to `top_k`.
#[derive(Default)]
pub struct FakeIndex {
    partitions: Mutex<HashMap<EmbeddingSpace, Vec<IndexMatch>>>,
    queries: Mutex<Vec<RecordedQuery>>,
    failing: AtomicBool,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store fixtures in one partition, best match first
    pub fn with_matches(self, space: EmbeddingSpace, matches: Vec<(CatalogItem, f32)>) -> Self {
        lock(&self.partitions).insert(
            space,
            matches
                .into_iter()
                .map(|(item, score)| IndexMatch { item, score })
                .collect(),
        );
        self
    }

    /// Make every call fail with an availability error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of similarity queries received
    pub fn query_count(&self) -> usize {
        lock(&self.queries).len()
    }

    pub fn last_query(&self) -> Option<RecordedQuery> {
        lock(&self.queries).last().cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::SearchUnavailable {
                message: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn satisfies(item: &CatalogItem, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::AtLeast { field, value } => numeric(item, field).is_some_and(|v| v >= *value),
        Predicate::AtMost { field, value } => numeric(item, field).is_some_and(|v| v <= *value),
        Predicate::OneOf { field, values } => {
            textual(item, field).is_some_and(|v| values.iter().any(|candidate| candidate == v))
        }
    }
}

fn numeric(item: &CatalogItem, field: &str) -> Option<u64> {
    match field {
        fields::PRICE_MIN => Some(item.price_min),
        fields::PRICE_MAX => Some(item.price_max),
        _ => None,
    }
}

fn textual<'a>(item: &'a CatalogItem, field: &str) -> Option<&'a str> {
    match field {
        fields::BRAND => Some(&item.brand),
        fields::SOURCE => Some(item.source.as_str()),
        fields::CATEGORY => Some(&item.category),
        _ => None,
    }
}

#[async_trait]
impl SimilarityIndex for FakeIndex {
    async fn query(
        &self,
        vector: &QueryVector,
        filter: &IndexFilter,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        lock(&self.queries).push(RecordedQuery {
            space: vector.space,
            filter: filter.clone(),
            top_k,
        });
        self.check_available()?;

        let partitions = lock(&self.partitions);
        Ok(partitions
            .get(&vector.space)
            .map(|matches| {
                matches
                    .iter()
                    .filter(|m| filter.predicates().iter().all(|p| satisfies(&m.item, p)))
                    .take(top_k)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_by_id(&self, ids: &[String], space: EmbeddingSpace) -> Result<Vec<CatalogItem>> {
        self.check_available()?;
        let partitions = lock(&self.partitions);
        let stored = partitions.get(&space).map(Vec::as_slice).unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| stored.iter().find(|m| &m.item.id == id))
            .map(|m| m.item.clone())
            .collect())
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        self.check_available()?;
        let partitions = lock(&self.partitions);
        let namespaces: HashMap<String, u64> = partitions
            .iter()
            .map(|(space, matches)| (space.as_str().to_string(), matches.len() as u64))
            .collect();
        Ok(IndexStats {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            total_vectors: namespaces.values().sum(),
            namespaces,
        })
    }
}

type Script = Box<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

/// Generator whose replies come from a closure
pub struct ScriptedGenerator {
    backend: GenerationBackend,
    script: Script,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(
        backend: GenerationBackend,
        script: impl Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            backend,
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`
    pub fn replying(backend: GenerationBackend, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(backend, move |_| Ok(text.clone()))
    }

    /// Always fail
    pub fn failing(backend: GenerationBackend) -> Self {
        Self::new(backend, move |_| {
            Err(AppError::GenerationFailed {
                backend: backend.to_string(),
                message: "HTTP 503".to_string(),
            })
        })
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Requests received, oldest first
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        lock(&self.requests).push(request.clone());
        (self.script)(request)
    }

    fn backend(&self) -> GenerationBackend {
        self.backend
    }

    fn model_name(&self) -> &str {
        match self.backend {
            GenerationBackend::OpenAi => "scripted-gpt",
            GenerationBackend::Gemini => "scripted-gemini",
        }
    }
}

/// A generator pool over the given doubles
pub fn generator_pool(generators: Vec<Arc<ScriptedGenerator>>) -> GeneratorPool {
    let generators: Vec<Arc<dyn TextGenerator>> = generators
        .into_iter()
        .map(|g| g as Arc<dyn TextGenerator>)
        .collect();
    GeneratorPool::new(generators, Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_embedder_is_deterministic() {
        let embedder = StaticEmbedder::new(EmbeddingSpace::OpenAi);
        let a = embedder.embed("laptop").await.unwrap();
        let b = embedder.embed("laptop").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_fake_index_applies_predicates() {
        let index = FakeIndex::new().with_matches(
            EmbeddingSpace::OpenAi,
            vec![(catalog_item("a", 10, 10), 0.9), (catalog_item("b", 90, 90), 0.8)],
        );
        let mut filter = IndexFilter::new();
        filter.push(Predicate::AtMost {
            field: fields::PRICE_MAX,
            value: 50,
        });
        let vector = QueryVector {
            space: EmbeddingSpace::OpenAi,
            values: vec![0.0; 4],
        };

        let matches = index.query(&vector, &filter, 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].item.id, "a");
        assert_eq!(index.query_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_index_still_records_query() {
        let index = FakeIndex::new();
        index.set_failing(true);
        let vector = QueryVector {
            space: EmbeddingSpace::HuggingFace,
            values: vec![0.0; 4],
        };
        let err = index.query(&vector, &IndexFilter::new(), 5).await.unwrap_err();
        assert!(matches!(err, AppError::SearchUnavailable { .. }));
        assert_eq!(index.last_query().unwrap().top_k, 5);
    }
}
