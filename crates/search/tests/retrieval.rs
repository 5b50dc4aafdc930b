use concommerce_common::config::RetrievalConfig;
use concommerce_common::embeddings::QueryVector;
use concommerce_common::errors::AppError;
use concommerce_common::index::SimilarityIndex;
use concommerce_common::models::{EmbeddingSpace, MergedFilter, PriceRange};
use concommerce_search::{RelevanceRetriever, Retriever};
use concommerce_testkit::{catalog_item, FakeIndex};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn retriever(index: Arc<FakeIndex>) -> RelevanceRetriever {
    let index: Arc<dyn SimilarityIndex> = index;
    RelevanceRetriever::new(index, &RetrievalConfig::default(), Duration::from_secs(1))
}

fn vector(space: EmbeddingSpace) -> QueryVector {
    QueryVector {
        space,
        values: vec![0.1; 8],
    }
}

#[tokio::test]
async fn test_thresholds_are_per_space() {
    let matches = vec![
        (catalog_item("a", 10_000, 10_000), 0.50),
        (catalog_item("b", 10_000, 10_000), 0.30),
    ];
    let index = Arc::new(
        FakeIndex::new()
            .with_matches(EmbeddingSpace::OpenAi, matches.clone())
            .with_matches(EmbeddingSpace::HuggingFace, matches),
    );
    let retriever = retriever(index);

    let openai = retriever
        .retrieve(&vector(EmbeddingSpace::OpenAi), &MergedFilter::default(), 10, EmbeddingSpace::OpenAi)
        .await
        .unwrap();
    assert_eq!(openai.len(), 2);

    let hf = retriever
        .retrieve(
            &vector(EmbeddingSpace::HuggingFace),
            &MergedFilter::default(),
            10,
            EmbeddingSpace::HuggingFace,
        )
        .await
        .unwrap();
    assert_eq!(hf.len(), 1);
    assert_eq!(hf.items[0].item.id, "a");
}

#[tokio::test]
async fn test_cross_partition_query_is_rejected() {
    let index = Arc::new(FakeIndex::new());
    let err = retriever(index.clone())
        .retrieve(
            &vector(EmbeddingSpace::OpenAi),
            &MergedFilter::default(),
            10,
            EmbeddingSpace::HuggingFace,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { .. }));
    assert_eq!(index.query_count(), 0);
}

#[tokio::test]
async fn test_index_failure_is_not_empty_success() {
    let index = Arc::new(FakeIndex::new());
    index.set_failing(true);

    let err = retriever(index)
        .retrieve(&vector(EmbeddingSpace::OpenAi), &MergedFilter::default(), 10, EmbeddingSpace::OpenAi)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SearchUnavailable { .. }));
}

#[tokio::test]
async fn test_empty_result_is_success() {
    let index = Arc::new(FakeIndex::new());
    let result = assert_ok!(
        retriever(index)
            .retrieve(&vector(EmbeddingSpace::OpenAi), &MergedFilter::default(), 10, EmbeddingSpace::OpenAi)
            .await
    );
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_budget_results_are_contained_and_cheapest_first() {
    let index = Arc::new(FakeIndex::new().with_matches(
        EmbeddingSpace::OpenAi,
        vec![
            (catalog_item("mid", 30_000, 35_000), 0.9),
            (catalog_item("straddle", 20_000, 45_000), 0.85),
            (catalog_item("cheap", 22_000, 24_000), 0.6),
        ],
    ));
    let filter = MergedFilter {
        price: PriceRange::new(0, 40_000).unwrap(),
        ..Default::default()
    };

    let result = retriever(index.clone())
        .retrieve(&vector(EmbeddingSpace::OpenAi), &filter, 10, EmbeddingSpace::OpenAi)
        .await
        .unwrap();

    let ids: Vec<_> = result.items.iter().map(|s| s.item.id.as_str()).collect();
    assert_eq!(ids, vec!["cheap", "mid"]);
    assert_eq!(index.last_query().unwrap().top_k, 10);
}
