//! The chat pipeline
//!
//! Stages run strictly in order; each one needs its predecessor's output.
//! Every external collaborator is injected, so any of them can be a test
//! double.

use crate::exchange::{ChatRequest, ChatResponse, Notice, ResponseMetadata};
use concommerce_common::config::AppConfig;
use concommerce_common::context::{
    follow_up_intent, merge, no_results_message, selection, BudgetGuard, CasualKind,
    ContextRouter, CriteriaInterpreter, Feasibility, GroundingSynthesizer, InterpreterConfig,
    Route, RouteKind, SynthesisOptions,
};
use concommerce_common::embeddings::{create_embedders, EmbedderSet};
use concommerce_common::errors::{AppError, Result};
use concommerce_common::index::SimilarityIndex;
use concommerce_common::llm::{create_generators, Generation};
use concommerce_common::metrics;
use concommerce_common::models::{
    CatalogItem, EmbeddingSpace, GenerationBackend, Intent,
};
use concommerce_search::{RelevanceRetriever, Retriever};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request-independent settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Candidates retrieved per fresh query
    pub retrieval_limit: usize,
    pub default_space: EmbeddingSpace,
    pub default_backend: GenerationBackend,
    /// Currency label for user-facing guidance
    pub currency: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retrieval_limit: 10,
            default_space: EmbeddingSpace::default(),
            default_backend: GenerationBackend::default(),
            currency: "Tk".to_string(),
        }
    }
}

/// Collaborators the pipeline is assembled from
pub struct PipelineComponents {
    pub router: ContextRouter,
    pub interpreter: CriteriaInterpreter,
    pub budget: BudgetGuard,
    pub embedders: EmbedderSet,
    pub retriever: Arc<dyn Retriever>,
    pub synthesizer: GroundingSynthesizer,
}

/// Conversation-aware retrieval and grounding pipeline
pub struct ChatPipeline {
    router: ContextRouter,
    interpreter: CriteriaInterpreter,
    budget: BudgetGuard,
    embedders: EmbedderSet,
    retriever: Arc<dyn Retriever>,
    synthesizer: GroundingSynthesizer,
    settings: PipelineSettings,
}

impl ChatPipeline {
    pub fn new(components: PipelineComponents, settings: PipelineSettings) -> Self {
        Self {
            router: components.router,
            interpreter: components.interpreter,
            budget: components.budget,
            embedders: components.embedders,
            retriever: components.retriever,
            synthesizer: components.synthesizer,
            settings,
        }
    }

    /// Assemble the pipeline from configuration over the given index
    pub fn from_config(config: &AppConfig, index: Arc<dyn SimilarityIndex>) -> Result<Self> {
        let embedders = create_embedders(&config.embedding)?;
        let generators = create_generators(&config.generation)?;

        let retriever = RelevanceRetriever::new(
            index,
            &config.retrieval,
            Duration::from_secs(config.index.timeout_secs),
        );

        let interpreter = CriteriaInterpreter::new(
            generators.clone(),
            InterpreterConfig {
                max_tokens: config.generation.criteria_max_tokens,
                temperature: config.generation.criteria_temperature,
            },
        );

        let synthesizer = GroundingSynthesizer::new(
            generators,
            SynthesisOptions {
                max_tokens: config.generation.answer_max_tokens,
                temperature: config.generation.answer_temperature,
                system_prompt: config.generation.system_prompt.clone(),
                history_window: config.conversation.generation_window,
                currency: config.budget.currency.clone(),
            },
        );

        Ok(Self::new(
            PipelineComponents {
                router: ContextRouter::new(config.conversation.routing_window),
                interpreter,
                budget: BudgetGuard::new(&config.budget),
                embedders,
                retriever: Arc::new(retriever),
                synthesizer,
            },
            PipelineSettings {
                retrieval_limit: config.retrieval.limit,
                default_space: config.retrieval.default_space,
                default_backend: config.generation.default_backend,
                currency: config.budget.currency.clone(),
            },
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer one chat message
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::Validation {
                message: "Message must not be empty".to_string(),
                field: Some("message".to_string()),
            });
        }

        let start = Instant::now();
        let route = self.router.route(message, &request.history);
        let kind = route.kind();
        tracing::info!(route = %kind, history_turns = request.history.len(), "Handling chat message");

        let result = match route {
            Route::Casual(casual) => Ok(self.casual(casual)),
            Route::Contextual { prior_items } => {
                self.contextual(message, &request, prior_items).await
            }
            Route::Fresh => self.fresh(message, &request).await,
        };

        metrics::record_chat_turn(start.elapsed().as_secs_f64(), kind.as_str());

        match &result {
            Ok(response) => tracing::info!(
                route = %kind,
                items_found = response.metadata.items_found_before_selection,
                selection_size = response.metadata.selection_size,
                duration_ms = start.elapsed().as_millis() as u64,
                "Chat message answered"
            ),
            Err(e) => tracing::error!(route = %kind, error = %e, "Chat message failed"),
        }

        result
    }

    fn casual(&self, kind: CasualKind) -> ChatResponse {
        ChatResponse::canned(kind.reply(), RouteKind::Casual, None)
    }

    /// Answer from the items shown last; no retrieval
    async fn contextual(
        &self,
        message: &str,
        request: &ChatRequest,
        prior_items: Vec<CatalogItem>,
    ) -> Result<ChatResponse> {
        let intent = follow_up_intent(message);
        tracing::debug!(prior_items = prior_items.len(), intent = ?intent, "Reusing prior items");

        let generation = self
            .synthesizer
            .synthesize(
                message,
                &prior_items,
                &request.history,
                Some(&intent),
                self.backend(request),
            )
            .await?;

        Ok(grounded(
            generation,
            &prior_items,
            Some(&intent),
            RouteKind::Contextual,
        ))
    }

    /// Interpret, check, embed, retrieve and ground
    async fn fresh(&self, message: &str, request: &ChatRequest) -> Result<ChatResponse> {
        let backend = self.backend(request);
        let space = request
            .embedding_model
            .unwrap_or(self.settings.default_space);

        let criteria = self.interpreter.interpret(message, backend).await;
        let filter = merge(&request.filters, &criteria);

        if let Feasibility::Infeasible(infeasible) = self.budget.check(message, &filter) {
            metrics::record_budget_short_circuit(&infeasible.class);
            return Ok(ChatResponse::canned(
                self.budget.guidance(&infeasible),
                RouteKind::Fresh,
                Some(Notice::InfeasibleBudget(infeasible)),
            ));
        }

        let vector = self.embedders.embed(message, space).await.map_err(|e| {
            tracing::error!(space = %space, error = %e, "Query embedding failed");
            match e {
                err @ (AppError::EmbeddingError { .. } | AppError::EmbeddingTimeout { .. }) => err,
                other => AppError::EmbeddingError {
                    message: other.to_string(),
                },
            }
        })?;

        let retrieval = self
            .retriever
            .retrieve(&vector, &filter, self.settings.retrieval_limit, space)
            .await?;

        if retrieval.is_empty() {
            tracing::info!(
                fetched = retrieval.fetched,
                above_threshold = retrieval.above_threshold,
                "No candidates matched, skipping generation"
            );
            return Ok(ChatResponse::canned(
                no_results_message(&filter, &self.settings.currency),
                RouteKind::Fresh,
                Some(Notice::NoResults),
            ));
        }

        let candidates: Vec<CatalogItem> =
            retrieval.items.into_iter().map(|scored| scored.item).collect();
        let intent = criteria.intent.as_ref();

        let generation = self
            .synthesizer
            .synthesize(message, &candidates, &request.history, intent, backend)
            .await?;

        Ok(grounded(generation, &candidates, intent, RouteKind::Fresh))
    }

    fn backend(&self, request: &ChatRequest) -> GenerationBackend {
        request.provider.unwrap_or(self.settings.default_backend)
    }
}

/// Build the response for a generated reply over `candidates`
fn grounded(
    generation: Generation,
    candidates: &[CatalogItem],
    intent: Option<&Intent>,
    route: RouteKind,
) -> ChatResponse {
    let resolution = selection::resolve(&generation.text, candidates, intent);
    let notice = resolution
        .fallback
        .as_ref()
        .map(|reason| Notice::SelectionFallback {
            reason: reason.to_string(),
        });

    ChatResponse {
        metadata: ResponseMetadata {
            provider: Some(generation.backend),
            model: Some(generation.model),
            provider_fell_back: generation.fell_back,
            items_found_before_selection: candidates.len(),
            selection_size: resolution.items.len(),
            route,
            notice,
        },
        narrative: resolution.narrative,
        items: resolution.items,
    }
}
