//! End-to-end pipeline tests over in-memory collaborators

use concommerce_common::config::{BudgetConfig, RetrievalConfig};
use concommerce_common::context::{
    BudgetGuard, ContextRouter, CriteriaInterpreter, GroundingSynthesizer, InterpreterConfig,
    RouteKind, SynthesisOptions,
};
use concommerce_common::errors::{AppError, ErrorCode};
use concommerce_common::index::{fields, Predicate, SimilarityIndex};
use concommerce_common::llm::{GenerationPurpose, GenerationRequest};
use concommerce_common::models::{
    CatalogItem, ConversationTurn, EmbeddingSpace, FilterState, GenerationBackend, PriceRange,
};
use concommerce_context::{ChatPipeline, ChatRequest, Notice, PipelineComponents, PipelineSettings};
use concommerce_search::RelevanceRetriever;
use concommerce_testkit::{
    catalog_item, embedder_set, generator_pool, FakeIndex, ScriptedGenerator, StaticEmbedder,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_err;

const NO_CRITERIA: &str = "{}";

struct Harness {
    pipeline: ChatPipeline,
    index: Arc<FakeIndex>,
    openai_embedder: Arc<StaticEmbedder>,
    openai: Arc<ScriptedGenerator>,
    gemini: Arc<ScriptedGenerator>,
}

fn harness(index: FakeIndex, openai: ScriptedGenerator, gemini: ScriptedGenerator) -> Harness {
    harness_with_embedder(index, StaticEmbedder::new(EmbeddingSpace::OpenAi), openai, gemini)
}

fn harness_with_embedder(
    index: FakeIndex,
    openai_embedder: StaticEmbedder,
    openai: ScriptedGenerator,
    gemini: ScriptedGenerator,
) -> Harness {
    let index = Arc::new(index);
    let openai_embedder = Arc::new(openai_embedder);
    let hf_embedder = Arc::new(StaticEmbedder::new(EmbeddingSpace::HuggingFace));
    let openai = Arc::new(openai);
    let gemini = Arc::new(gemini);

    let generators = generator_pool(vec![openai.clone(), gemini.clone()]);
    let shared_index: Arc<dyn SimilarityIndex> = index.clone();

    let pipeline = ChatPipeline::new(
        PipelineComponents {
            router: ContextRouter::new(4),
            interpreter: CriteriaInterpreter::new(generators.clone(), InterpreterConfig::default()),
            budget: BudgetGuard::new(&BudgetConfig::default()),
            embedders: embedder_set(vec![openai_embedder.clone(), hf_embedder]),
            retriever: Arc::new(RelevanceRetriever::new(
                shared_index,
                &RetrievalConfig::default(),
                Duration::from_secs(1),
            )),
            synthesizer: GroundingSynthesizer::new(generators, SynthesisOptions::default()),
        },
        PipelineSettings::default(),
    );

    Harness {
        pipeline,
        index,
        openai_embedder,
        openai,
        gemini,
    }
}

/// Generator answering extraction with `criteria` and answers with `answer`
fn scripted(
    backend: GenerationBackend,
    criteria: &'static str,
    answer: &'static str,
) -> ScriptedGenerator {
    ScriptedGenerator::new(backend, move |request| match request.purpose {
        GenerationPurpose::CriteriaExtraction => Ok(criteria.to_string()),
        GenerationPurpose::Answer => Ok(answer.to_string()),
    })
}

fn desktop(id: &str, min: u64, max: u64) -> CatalogItem {
    CatalogItem {
        category: "Desktop PC/Gaming PC".to_string(),
        brand: "AMD".to_string(),
        ..catalog_item(id, min, max)
    }
}

fn laptops(n: usize) -> Vec<(CatalogItem, f32)> {
    (1..=n)
        .map(|i| {
            let base = 40_000 + i as u64 * 1_000;
            (catalog_item(&format!("l{}", i), base, base + 5_000), 0.9 - i as f32 * 0.05)
        })
        .collect()
}

fn answer_requests(generator: &ScriptedGenerator) -> Vec<GenerationRequest> {
    generator
        .requests()
        .into_iter()
        .filter(|r| r.purpose == GenerationPurpose::Answer)
        .collect()
}

fn ids(items: &[CatalogItem]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[tokio::test]
async fn test_amd_gaming_pc_under_budget() {
    let index = FakeIndex::new().with_matches(
        EmbeddingSpace::OpenAi,
        vec![
            (desktop("d1", 85_000, 85_000), 0.90),
            (desktop("d2", 120_000, 120_000), 0.88),
            (
                CatalogItem {
                    category: "Monitor".to_string(),
                    ..catalog_item("m1", 20_000, 20_000)
                },
                0.85,
            ),
            (desktop("d3", 45_000, 48_000), 0.80),
            (desktop("d4", 60_000, 105_000), 0.70),
            (desktop("d5", 70_000, 70_000), 0.20),
        ],
    );
    let h = harness(
        index,
        scripted(
            GenerationBackend::OpenAi,
            r#"{"priceRange": {"min": 0, "max": 100000}, "categories": ["Desktop"], "intent": {"productCount": "multiple", "action": "recommend"}}"#,
            "The Product d1 build is the strongest option within your budget.\n\n```json\n{\"selected_products\": [2]}\n```",
        ),
        ScriptedGenerator::failing(GenerationBackend::Gemini),
    );

    let response = h
        .pipeline
        .handle(ChatRequest::new("AMD gaming PC under 100000"))
        .await
        .unwrap();

    assert_eq!(response.metadata.route, RouteKind::Fresh);

    // Merged price is [0, 100000]; the zero lower bound is not sent
    let query = h.index.last_query().unwrap();
    assert_eq!(query.space, EmbeddingSpace::OpenAi);
    assert_eq!(query.top_k, 20);
    assert_eq!(
        query.filter.predicates(),
        &[Predicate::AtMost {
            field: fields::PRICE_MAX,
            value: 100_000
        }]
    );

    // Candidates are contained in the budget, cheapest first
    let prompt = &answer_requests(&h.openai)[0].prompt;
    let d3 = prompt.find("Product d3").unwrap();
    let d1 = prompt.find("Product d1").unwrap();
    assert!(d3 < d1);
    assert!(!prompt.contains("Product d2"));
    assert!(!prompt.contains("Product d4"));
    assert!(!prompt.contains("Product m1"));
    assert!(!prompt.contains("Product d5"));

    assert_eq!(response.metadata.items_found_before_selection, 2);
    assert_eq!(ids(&response.items), vec!["d1"]);
    assert_eq!(response.metadata.selection_size, 1);
    assert!(response.items.iter().all(|item| item.price_max <= 100_000));
    assert!(!response.narrative.contains("selected_products"));
    assert!(!response.narrative.contains("```"));
    assert_eq!(response.metadata.provider, Some(GenerationBackend::OpenAi));
    assert!(response.metadata.notice.is_none());
}

#[tokio::test]
async fn test_infeasible_budget_skips_retrieval() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(3)),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let request = ChatRequest {
        filters: FilterState {
            price: PriceRange::new(0, 15_000).unwrap(),
            ..Default::default()
        },
        ..ChatRequest::new("gaming laptop")
    };
    let response = h.pipeline.handle(request).await.unwrap();

    assert!(response.items.is_empty());
    assert!(response.narrative.contains("laptop"));
    assert!(response.narrative.contains("25,000"));
    match response.metadata.notice {
        Some(Notice::InfeasibleBudget(infeasible)) => {
            assert_eq!(infeasible.floor, 25_000);
            assert_eq!(infeasible.suggested_budgets, vec![25_000, 40_000, 50_000]);
        }
        other => panic!("expected infeasible budget notice, got {other:?}"),
    }

    assert_eq!(h.index.query_count(), 0);
    assert_eq!(h.openai_embedder.calls(), 0);
    assert!(answer_requests(&h.openai).is_empty());
}

#[tokio::test]
async fn test_accessory_query_passes_budget_guard() {
    let h = harness(
        FakeIndex::new(),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let request = ChatRequest {
        filters: FilterState {
            price: PriceRange::new(0, 2_000).unwrap(),
            ..Default::default()
        },
        ..ChatRequest::new("laptop bag")
    };
    let response = h.pipeline.handle(request).await.unwrap();

    assert_eq!(h.index.query_count(), 1);
    assert_eq!(response.metadata.notice, Some(Notice::NoResults));
}

#[tokio::test]
async fn test_casual_message_makes_no_calls() {
    let h = harness(
        FakeIndex::new(),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let response = h.pipeline.handle(ChatRequest::new("Hello!")).await.unwrap();

    assert_eq!(response.metadata.route, RouteKind::Casual);
    assert!(response.items.is_empty());
    assert!(!response.narrative.is_empty());
    assert!(response.metadata.provider.is_none());
    assert_eq!(h.openai.calls(), 0);
    assert_eq!(h.gemini.calls(), 0);
    assert_eq!(h.openai_embedder.calls(), 0);
    assert_eq!(h.index.query_count(), 0);
}

#[tokio::test]
async fn test_follow_up_reuses_prior_items() {
    let h = harness(
        FakeIndex::new(),
        scripted(
            GenerationBackend::OpenAi,
            NO_CRITERIA,
            "The first one has the faster processor.\n{\"selected_products\": [1]}",
        ),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let shown = vec![catalog_item("a", 50_000, 50_000), catalog_item("b", 60_000, 60_000)];
    let request = ChatRequest {
        history: vec![
            ConversationTurn::user("gaming laptops under 80000"),
            ConversationTurn::assistant("Here are two options.", shown),
        ],
        ..ChatRequest::new("which one is better")
    };
    let response = h.pipeline.handle(request).await.unwrap();

    assert_eq!(response.metadata.route, RouteKind::Contextual);
    assert_eq!(ids(&response.items), vec!["a"]);
    assert_eq!(response.metadata.items_found_before_selection, 2);
    assert_eq!(response.narrative, "The first one has the faster processor.");

    // No interpretation, embedding or retrieval on the contextual path
    assert_eq!(h.openai.calls(), 1);
    assert_eq!(h.openai_embedder.calls(), 0);
    assert_eq!(h.index.query_count(), 0);

    let prompt = &answer_requests(&h.openai)[0].prompt;
    assert!(prompt.contains("Products shown"));
}

#[tokio::test]
async fn test_follow_up_without_prior_items_searches() {
    let h = harness(
        FakeIndex::new(),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let response = h
        .pipeline
        .handle(ChatRequest::new("which one is better"))
        .await
        .unwrap();

    assert_eq!(response.metadata.route, RouteKind::Fresh);
    assert_eq!(h.index.query_count(), 1);
}

#[tokio::test]
async fn test_generation_falls_back_to_second_backend() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(3)),
        ScriptedGenerator::failing(GenerationBackend::OpenAi),
        scripted(
            GenerationBackend::Gemini,
            NO_CRITERIA,
            "Two solid picks.\n{\"selected_products\": [1, 3]}",
        ),
    );

    let response = h.pipeline.handle(ChatRequest::new("laptop for students")).await.unwrap();

    assert_eq!(response.metadata.provider, Some(GenerationBackend::Gemini));
    assert!(response.metadata.provider_fell_back);
    assert_eq!(ids(&response.items), vec!["l1", "l3"]);

    // Extraction and answer each tried the preferred backend first
    assert_eq!(h.openai.calls(), 2);
    assert_eq!(h.gemini.calls(), 2);
    let answers = answer_requests(&h.gemini);
    assert_eq!(answers.len(), 1);
    assert_eq!(answer_requests(&h.openai)[0].prompt, answers[0].prompt);
}

#[tokio::test]
async fn test_preferred_backend_is_tried_first() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(2)),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(
            GenerationBackend::Gemini,
            NO_CRITERIA,
            "One pick.\n{\"selected_products\": [2]}",
        ),
    );

    let request = ChatRequest {
        provider: Some(GenerationBackend::Gemini),
        ..ChatRequest::new("laptop for office work")
    };
    let response = h.pipeline.handle(request).await.unwrap();

    assert_eq!(response.metadata.provider, Some(GenerationBackend::Gemini));
    assert!(!response.metadata.provider_fell_back);
    assert_eq!(h.openai.calls(), 0);
    assert_eq!(ids(&response.items), vec!["l2"]);
}

#[tokio::test]
async fn test_both_backends_failing_is_surfaced() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(3)),
        ScriptedGenerator::failing(GenerationBackend::OpenAi),
        ScriptedGenerator::failing(GenerationBackend::Gemini),
    );

    let err = h
        .pipeline
        .handle(ChatRequest::new("laptop for students"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::GenerationUnavailable { .. }));
    assert_eq!(err.code(), ErrorCode::GenerationUnavailable);
    // Interpretation degraded silently; retrieval still ran
    assert_eq!(h.index.query_count(), 1);
}

#[tokio::test]
async fn test_embedding_failure_is_retrieval_unavailable() {
    let h = harness_with_embedder(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(3)),
        StaticEmbedder::failing(EmbeddingSpace::OpenAi),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let err = h
        .pipeline
        .handle(ChatRequest::new("gaming laptop"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::RetrievalUnavailable);
    assert_eq!(h.index.query_count(), 0);
    assert!(answer_requests(&h.openai).is_empty());
}

#[tokio::test]
async fn test_index_failure_is_search_unavailable() {
    let h = harness(
        FakeIndex::new(),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );
    h.index.set_failing(true);

    let err = h
        .pipeline
        .handle(ChatRequest::new("gaming laptop"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SearchUnavailable);
    assert!(answer_requests(&h.openai).is_empty());
}

#[tokio::test]
async fn test_zero_results_skips_generation() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(3)),
        scripted(
            GenerationBackend::OpenAi,
            r#"{"priceRange": {"min": 0, "max": 30000}}"#,
            "unused",
        ),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let response = h
        .pipeline
        .handle(ChatRequest::new("gaming laptop under 30000"))
        .await
        .unwrap();

    assert!(response.items.is_empty());
    assert!(!response.narrative.is_empty());
    assert_eq!(response.metadata.notice, Some(Notice::NoResults));
    assert_eq!(h.index.query_count(), 1);
    assert!(answer_requests(&h.openai).is_empty());
}

#[tokio::test]
async fn test_missing_selection_falls_back_to_intent_slice() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(5)),
        scripted(
            GenerationBackend::OpenAi,
            r#"{"intent": {"productCount": "comparison", "action": "compare"}}"#,
            "These three compare well on battery life.",
        ),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let response = h
        .pipeline
        .handle(ChatRequest::new("compare laptops for programming"))
        .await
        .unwrap();

    assert_eq!(ids(&response.items), vec!["l1", "l2", "l3"]);
    assert_eq!(response.narrative, "These three compare well on battery life.");
    assert!(matches!(
        response.metadata.notice,
        Some(Notice::SelectionFallback { .. })
    ));
}

#[tokio::test]
async fn test_embedding_space_selects_partition() {
    let h = harness(
        FakeIndex::new().with_matches(EmbeddingSpace::OpenAi, laptops(3)),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let request = ChatRequest {
        embedding_model: Some(EmbeddingSpace::HuggingFace),
        ..ChatRequest::new("laptop for students")
    };
    let response = h.pipeline.handle(request).await.unwrap();

    assert_eq!(h.index.last_query().unwrap().space, EmbeddingSpace::HuggingFace);
    assert_eq!(h.openai_embedder.calls(), 0);
    assert_eq!(response.metadata.notice, Some(Notice::NoResults));
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let h = harness(
        FakeIndex::new(),
        scripted(GenerationBackend::OpenAi, NO_CRITERIA, "unused"),
        scripted(GenerationBackend::Gemini, NO_CRITERIA, "unused"),
    );

    let err = assert_err!(h.pipeline.handle(ChatRequest::new("   ")).await);
    assert_eq!(err.code(), ErrorCode::ValidationError);
}
