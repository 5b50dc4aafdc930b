//! Embedding service abstraction
//!
//! Provides a unified interface for the two embedding spaces:
//! - OpenAI (text-embedding-3-small, 384 dimensions)
//! - Hugging Face inference (all-MiniLM-L6-v2, 384 dimensions)
//!
//! Vectors carry the space that produced them so they can only be
//! searched against the matching index partition.

use crate::config::{EmbeddingConfig, EmbeddingProviderConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::EmbeddingSpace;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The space this embedder produces vectors in
    fn space(&self) -> EmbeddingSpace;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// A query embedding tagged with the space that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
    pub space: EmbeddingSpace,
    pub values: Vec<f32>,
}

/// Run a request with exponential backoff between attempts
async fn with_retry<T, F, Fut>(max_retries: u32, model: &str, mut request: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = max_retries.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
            tokio::time::sleep(delay).await;
        }

        match request().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = attempts,
                    model = model,
                    error = %e,
                    "Embedding request failed, retrying"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::EmbeddingError {
        message: "Unknown error after retries".to_string(),
    }))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(config: &EmbeddingProviderConfig, timeout: Duration, max_retries: u32) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "OpenAI embedding API key not configured".to_string(),
        })?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    async fn make_request(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = OpenAIRequest {
            input: vec![text],
            model: &self.model,
            dimensions: self.dimension,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to parse response: {}", e),
        })?;

        result
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| AppError::EmbeddingError {
                message: "Empty response".to_string(),
            })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        with_retry(self.max_retries, &self.model, || self.make_request(text)).await
    }

    fn space(&self) -> EmbeddingSpace {
        EmbeddingSpace::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Hugging Face inference API (feature-extraction pipeline) client
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
    options: FeatureExtractionOptions,
}

#[derive(Serialize)]
struct FeatureExtractionOptions {
    wait_for_model: bool,
}

/// Sentence models return one vector; token models return one per token
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<f32>),
    Batched(Vec<Vec<f32>>),
}

impl FeatureExtractionResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            FeatureExtractionResponse::Pooled(v) => Some(v),
            FeatureExtractionResponse::Batched(rows) => mean_pool(&rows),
        }
    }
}

fn mean_pool(rows: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = rows.first()?.len();
    if rows.len() == 1 {
        return Some(rows[0].clone());
    }
    let mut pooled = vec![0.0_f32; width];
    for row in rows.iter().filter(|r| r.len() == width) {
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }
    let count = rows.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= count);
    Some(pooled)
}

impl HuggingFaceEmbedder {
    /// Create a new Hugging Face embedder
    pub fn new(config: &EmbeddingProviderConfig, timeout: Duration, max_retries: u32) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "Hugging Face API key not configured".to_string(),
        })?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            url: format!("{}/{}", config.api_base.trim_end_matches('/'), config.model),
            max_retries,
        })
    }

    async fn make_request(&self, text: &str) -> Result<Vec<f32>> {
        let request = FeatureExtractionRequest {
            inputs: text,
            options: FeatureExtractionOptions {
                wait_for_model: true,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: FeatureExtractionResponse =
            response.json().await.map_err(|e| AppError::EmbeddingError {
                message: format!("Failed to parse response: {}", e),
            })?;

        result.into_vector().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        with_retry(self.max_retries, &self.model, || self.make_request(text)).await
    }

    fn space(&self) -> EmbeddingSpace {
        EmbeddingSpace::HuggingFace
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Lookup table from embedding space to its client
#[derive(Clone)]
pub struct EmbedderSet {
    embedders: HashMap<EmbeddingSpace, Arc<dyn Embedder>>,
    timeout: Duration,
}

impl EmbedderSet {
    /// Build a set from clients; each client registers under its own space
    pub fn new(embedders: Vec<Arc<dyn Embedder>>, timeout: Duration) -> Self {
        let embedders = embedders.into_iter().map(|e| (e.space(), e)).collect();
        Self { embedders, timeout }
    }

    /// Client for a space, if configured
    pub fn get(&self, space: EmbeddingSpace) -> Option<&Arc<dyn Embedder>> {
        self.embedders.get(&space)
    }

    /// Spaces with a configured client
    pub fn spaces(&self) -> Vec<EmbeddingSpace> {
        EmbeddingSpace::ALL
            .into_iter()
            .filter(|space| self.embedders.contains_key(space))
            .collect()
    }

    /// Embed text in the requested space within the call deadline
    pub async fn embed(&self, text: &str, space: EmbeddingSpace) -> Result<QueryVector> {
        let embedder = self.get(space).ok_or_else(|| AppError::EmbeddingError {
            message: format!("No embedder configured for space '{}'", space),
        })?;

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, embedder.embed(text)).await;
        let elapsed = start.elapsed().as_secs_f64();

        let values = match outcome {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => {
                metrics::record_embedding(elapsed, embedder.model_name(), false);
                return Err(e);
            }
            Err(_) => {
                metrics::record_embedding(elapsed, embedder.model_name(), false);
                return Err(AppError::EmbeddingTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        if values.len() != embedder.dimension() {
            metrics::record_embedding(elapsed, embedder.model_name(), false);
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Expected {} dimensions from {}, got {}",
                    embedder.dimension(),
                    embedder.model_name(),
                    values.len()
                ),
            });
        }

        metrics::record_embedding(elapsed, embedder.model_name(), true);
        Ok(QueryVector { space, values })
    }
}

/// Create the embedders configured with credentials
pub fn create_embedders(config: &EmbeddingConfig) -> Result<EmbedderSet> {
    let mut embedders: Vec<Arc<dyn Embedder>> = Vec::new();
    let timeout = config.timeout();

    if config.openai.api_key.is_some() {
        embedders.push(Arc::new(OpenAIEmbedder::new(&config.openai, timeout, config.max_retries)?));
    }
    if config.huggingface.api_key.is_some() {
        embedders.push(Arc::new(HuggingFaceEmbedder::new(
            &config.huggingface,
            timeout,
            config.max_retries,
        )?));
    }

    if embedders.is_empty() {
        return Err(AppError::Configuration {
            message: "At least one embedding provider must have an API key".to_string(),
        });
    }

    let set = EmbedderSet::new(embedders, timeout);
    tracing::info!(spaces = ?set.spaces(), "Embedding providers configured");
    Ok(set)
}
