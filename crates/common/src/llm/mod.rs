//! Text generation backends
//!
//! Two interchangeable chat backends sit behind [`TextGenerator`]. The
//! [`GeneratorPool`] enforces the per-call deadline and falls back to the
//! other backend only after the preferred one has definitively failed.

mod gemini;
mod openai;

pub use gemini::GeminiGenerator;
pub use openai::OpenAIGenerator;

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::GenerationBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a generation call is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPurpose {
    /// Structured criteria extraction from a query
    CriteriaExtraction,
    /// Grounded conversational answer
    Answer,
}

impl GenerationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPurpose::CriteriaExtraction => "criteria",
            GenerationPurpose::Answer => "answer",
        }
    }
}

/// One generation call: system instructions plus a user prompt
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    pub instructions: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub backend: GenerationBackend,
    pub model: String,
    /// Served by the fallback backend
    pub fell_back: bool,
}

/// Trait for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Backend identity
    fn backend(&self) -> GenerationBackend;

    /// Model name
    fn model_name(&self) -> &str;
}

struct Failure {
    backend: GenerationBackend,
    message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.message)
    }
}

/// Configured backends with sequential fallback
#[derive(Clone)]
pub struct GeneratorPool {
    generators: HashMap<GenerationBackend, Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl GeneratorPool {
    /// Build a pool; each generator registers under its own backend
    pub fn new(generators: Vec<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        let generators = generators.into_iter().map(|g| (g.backend(), g)).collect();
        Self { generators, timeout }
    }

    /// Backends with a configured client
    pub fn backends(&self) -> Vec<GenerationBackend> {
        GenerationBackend::ALL
            .into_iter()
            .filter(|b| self.generators.contains_key(b))
            .collect()
    }

    /// Model name of a backend, if configured
    pub fn model_name(&self, backend: GenerationBackend) -> Option<&str> {
        self.generators.get(&backend).map(|g| g.model_name())
    }

    async fn attempt(&self, backend: GenerationBackend, request: &GenerationRequest) -> std::result::Result<Generation, Failure> {
        let generator = self.generators.get(&backend).ok_or_else(|| Failure {
            backend,
            message: "backend not configured".to_string(),
        })?;

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, generator.generate(request)).await;
        let elapsed = start.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(Ok(text)) if text.trim().is_empty() => Err("empty completion".to_string()),
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}s", self.timeout.as_secs())),
        };

        metrics::record_generation(elapsed, backend.as_str(), request.purpose.as_str(), result.is_ok());

        result
            .map(|text| Generation {
                text,
                backend,
                model: generator.model_name().to_string(),
                fell_back: false,
            })
            .map_err(|message| Failure { backend, message })
    }

    /// Generate with `preferred`, retrying once on the other backend.
    ///
    /// The fallback call is only issued after the preferred call has
    /// failed. Both causes are reported when neither backend succeeds.
    pub async fn generate(
        &self,
        preferred: GenerationBackend,
        request: &GenerationRequest,
    ) -> Result<Generation> {
        let primary = match self.attempt(preferred, request).await {
            Ok(generation) => return Ok(generation),
            Err(failure) => failure,
        };

        let fallback_backend = preferred.fallback();
        tracing::warn!(
            backend = %preferred,
            fallback = %fallback_backend,
            purpose = request.purpose.as_str(),
            error = %primary.message,
            "Generation failed, trying fallback backend"
        );

        match self.attempt(fallback_backend, request).await {
            Ok(mut generation) => {
                metrics::record_generation_fallback(preferred.as_str(), fallback_backend.as_str());
                generation.fell_back = true;
                Ok(generation)
            }
            Err(fallback) => {
                tracing::error!(
                    primary = %primary,
                    fallback = %fallback,
                    purpose = request.purpose.as_str(),
                    "All generation backends failed"
                );
                Err(AppError::GenerationUnavailable {
                    primary: primary.to_string(),
                    fallback: fallback.to_string(),
                })
            }
        }
    }
}

/// Create the generators configured with credentials
pub fn create_generators(config: &GenerationConfig) -> Result<GeneratorPool> {
    let timeout = config.timeout();
    let mut generators: Vec<Arc<dyn TextGenerator>> = Vec::new();

    if config.openai.api_key.is_some() {
        generators.push(Arc::new(OpenAIGenerator::new(&config.openai, timeout)?));
    }
    if config.gemini.api_key.is_some() {
        generators.push(Arc::new(GeminiGenerator::new(&config.gemini, timeout)?));
    }

    if generators.is_empty() {
        return Err(AppError::Configuration {
            message: "At least one generation backend must have an API key".to_string(),
        });
    }

    let pool = GeneratorPool::new(generators, timeout);
    tracing::info!(backends = ?pool.backends(), "Generation backends configured");
    Ok(pool)
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}
