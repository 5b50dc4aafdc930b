//! Grounding Synthesizer - generates answers grounded on candidates
//!
//! Provides:
//! - A numbered context block of candidate items
//! - A bounded excerpt of the recent conversation
//! - Intent guidance on how many items to discuss
//! - The mandatory trailing selection object

use super::selection::SELECTION_KEY;
use crate::errors::Result;
use crate::llm::{Generation, GenerationPurpose, GenerationRequest, GeneratorPool};
use crate::models::{
    format_amount, recent_window, CatalogItem, ConversationTurn, GenerationBackend, Intent,
    MergedFilter, ProductCount, Role,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are ConCommerce, a friendly shopping assistant for \
electronics sold by StarTech and Daraz in Bangladesh. Recommend products ONLY from the numbered \
product list you are given. Never invent products, prices or specifications. Quote prices exactly \
as listed. If none of the listed products fit the request, say so honestly.";

/// Synthesis options
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Maximum output tokens
    pub max_tokens: u32,

    /// Temperature (0.0 - 1.0)
    pub temperature: f32,

    /// System prompt override
    pub system_prompt: Option<String>,

    /// Turns quoted from the conversation
    pub history_window: usize,

    /// Currency label for prices
    pub currency: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1200,
            temperature: 0.7,
            system_prompt: None,
            history_window: 6,
            currency: "Tk".to_string(),
        }
    }
}

/// Answer generator grounded on a candidate list
#[derive(Clone)]
pub struct GroundingSynthesizer {
    generators: GeneratorPool,
    options: SynthesisOptions,
}

impl GroundingSynthesizer {
    pub fn new(generators: GeneratorPool, options: SynthesisOptions) -> Self {
        Self {
            generators,
            options,
        }
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Generate a grounded reply. The raw text still carries the
    /// selection object; resolve it with [`super::selection::resolve`].
    pub async fn synthesize(
        &self,
        query: &str,
        candidates: &[CatalogItem],
        history: &[ConversationTurn],
        intent: Option<&Intent>,
        preferred: GenerationBackend,
    ) -> Result<Generation> {
        let request = GenerationRequest {
            purpose: GenerationPurpose::Answer,
            instructions: self.instructions(),
            prompt: self.build_prompt(query, candidates, history, intent),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };

        let generation = self.generators.generate(preferred, &request).await?;

        tracing::debug!(
            backend = %generation.backend,
            model = %generation.model,
            fell_back = generation.fell_back,
            candidates = candidates.len(),
            "Grounded reply generated"
        );

        Ok(generation)
    }

    /// System instructions: persona plus the selection protocol
    pub fn instructions(&self) -> String {
        let persona = self
            .options
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        format!(
            "{persona}\n\n\
             Refer to products by name, not by their list number.\n\
             After your answer you MUST end with a JSON object on its own line listing the \
             list numbers of every product you discussed, and nothing after it:\n\
             {{\"{key}\": [1, 3]}}\n\
             Use an empty list if you discussed no product.",
            persona = persona,
            key = SELECTION_KEY,
        )
    }

    /// Assemble the user prompt
    pub fn build_prompt(
        &self,
        query: &str,
        candidates: &[CatalogItem],
        history: &[ConversationTurn],
        intent: Option<&Intent>,
    ) -> String {
        let mut prompt = String::new();

        let excerpt = self.history_excerpt(history);
        if !excerpt.is_empty() {
            prompt.push_str("Recent conversation:\n");
            prompt.push_str(&excerpt);
            prompt.push('\n');
        }

        prompt.push_str("Products:\n");
        prompt.push_str(&self.context_block(candidates));
        prompt.push('\n');

        prompt.push_str(intent_guidance(intent));
        prompt.push_str("\n\n");

        prompt.push_str(&format!("Customer: {}\n", query.trim()));
        prompt
    }

    /// Numbered candidate list (1-based)
    pub fn context_block(&self, candidates: &[CatalogItem]) -> String {
        let mut block = String::new();

        for (i, item) in candidates.iter().enumerate() {
            block.push_str(&format!("[{}] {}\n", i + 1, item.name));
            block.push_str(&format!("    Price: {}\n", item.price_label(&self.options.currency)));
            if !item.category.is_empty() {
                block.push_str(&format!("    Category: {}\n", item.category));
            }
            if !item.brand.is_empty() {
                block.push_str(&format!("    Brand: {}\n", item.brand));
            }
            block.push_str(&format!("    Source: {}\n", item.source));
            for (label, value) in item.specs.entries() {
                block.push_str(&format!("    {}: {}\n", label, value));
            }
            if !item.warranty.trim().is_empty() {
                block.push_str(&format!("    Warranty: {}\n", item.warranty.trim()));
            }
            if let Some(availability) = &item.availability {
                block.push_str(&format!("    Availability: {}\n", availability));
            }
        }

        block
    }

    /// Role-tagged recent turns; assistant turns list what they showed
    pub fn history_excerpt(&self, history: &[ConversationTurn]) -> String {
        let mut excerpt = String::new();

        for turn in recent_window(history, self.options.history_window) {
            let role = match turn.role {
                Role::User => "Customer",
                Role::Assistant => "Assistant",
            };
            excerpt.push_str(&format!("{}: {}\n", role, turn.content.trim()));

            let shown = turn.shown_items();
            if !shown.is_empty() {
                let names = shown
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("({}) {}", i + 1, item.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                excerpt.push_str(&format!("  [Products shown: {}]\n", names));
            }
        }

        excerpt
    }
}

/// How many products the reply should discuss
pub fn intent_guidance(intent: Option<&Intent>) -> &'static str {
    match intent.map(|i| i.product_count) {
        Some(ProductCount::Single) => {
            "The customer wants one recommendation: discuss exactly ONE product, the best fit."
        }
        Some(ProductCount::Multiple) => {
            "The customer wants options: discuss THREE to FIVE of the best-fitting products."
        }
        Some(ProductCount::Comparison) => {
            "The customer wants a comparison: discuss TWO or THREE products and compare them \
             explicitly on price, specifications and value."
        }
        Some(ProductCount::Any) => {
            "The customer asked a general question: answer in prose only and do not recommend \
             specific products (use an empty list)."
        }
        None => "Discuss the products that best match the request, at most five.",
    }
}

/// Guidance returned when retrieval finds nothing
pub fn no_results_message(filter: &MergedFilter, currency: &str) -> String {
    let mut hints = Vec::new();
    if filter.price.is_active() {
        hints.push(format!(
            "widening your budget (currently {} - {} {})",
            format_amount(filter.price.min),
            format_amount(filter.price.max),
            currency
        ));
    }
    if !filter.brands.is_empty() {
        hints.push(format!("removing the brand filter ({})", filter.brands.join(", ")));
    }
    if !filter.categories.is_empty() {
        hints.push(format!("removing the category filter ({})", filter.categories.join(", ")));
    }
    if !filter.sources.is_empty() {
        let sources = filter
            .sources
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        hints.push(format!("searching all stores instead of {}", sources));
    }
    if hints.is_empty() {
        hints.push("describing the product in different words".to_string());
    }

    format!(
        "I couldn't find any products matching your request. You could try {}.",
        hints.join(", or ")
    )
}
