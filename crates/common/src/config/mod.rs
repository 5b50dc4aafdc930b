//! Configuration management for ConCommerce services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{env}.toml)
//! - Default values

use crate::models::{EmbeddingSpace, GenerationBackend};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding providers, one per embedding space
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Similarity index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Text generation backends
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retrieval limits and relevance thresholds
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation windows and session storage
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Budget feasibility floors
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Credentials and model for one embedding provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingProviderConfig {
    /// API key (provider is disabled when absent)
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: String,

    /// Model to use
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// OpenAI embedding space
    #[serde(default = "default_openai_embedding")]
    pub openai: EmbeddingProviderConfig,

    /// Hugging Face embedding space
    #[serde(default = "default_huggingface_embedding")]
    pub huggingface: EmbeddingProviderConfig,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Index host URL (https://<index>-<project>.svc.<region>.pinecone.io)
    pub host: Option<String>,

    /// API key for the index
    pub api_key: Option<String>,

    /// API version header value
    #[serde(default = "default_index_api_version")]
    pub api_version: String,

    /// Namespace holding OpenAI vectors
    #[serde(default = "default_openai_namespace")]
    pub openai_namespace: String,

    /// Namespace holding Hugging Face vectors
    #[serde(default = "default_huggingface_namespace")]
    pub huggingface_namespace: String,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

/// Credentials and model for one generation backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorProviderConfig {
    /// API key (backend is disabled when absent)
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: String,

    /// Model to use
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// OpenAI chat completions backend
    #[serde(default = "default_openai_generator")]
    pub openai: GeneratorProviderConfig,

    /// Google Gemini backend
    #[serde(default = "default_gemini_generator")]
    pub gemini: GeneratorProviderConfig,

    /// Backend used when the request does not name one
    #[serde(default)]
    pub default_backend: GenerationBackend,

    /// Per-call timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Maximum output tokens for answers
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,

    /// Sampling temperature for answers
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,

    /// Maximum output tokens for criteria extraction
    #[serde(default = "default_criteria_max_tokens")]
    pub criteria_max_tokens: u32,

    /// Sampling temperature for criteria extraction
    #[serde(default)]
    pub criteria_temperature: f32,

    /// System prompt override for answers
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Maximum candidates handed to generation
    #[serde(default = "default_retrieval_limit")]
    pub limit: usize,

    /// Embedding space used when the request does not name one
    #[serde(default)]
    pub default_space: EmbeddingSpace,

    /// Minimum similarity for OpenAI vectors
    #[serde(default = "default_openai_threshold")]
    pub openai_threshold: f32,

    /// Minimum similarity for Hugging Face vectors
    #[serde(default = "default_huggingface_threshold")]
    pub huggingface_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversationConfig {
    /// Turns inspected when routing a message
    #[serde(default = "default_routing_window")]
    pub routing_window: usize,

    /// Turns quoted to the generator
    #[serde(default = "default_generation_window")]
    pub generation_window: usize,

    /// Idle lifetime of a stored session in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Turns kept per stored session
    #[serde(default = "default_max_stored_turns")]
    pub max_stored_turns: usize,

    /// Redis URL (redis://host:port); sessions stay in memory when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Namespace for Redis keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// Cheapest complete product of a class known to exist in the catalog
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RealismFloor {
    /// Human readable class name ("laptop")
    pub class: String,

    /// Query tokens that imply this class
    pub keywords: Vec<String>,

    /// Price floor in catalog currency units
    pub floor: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BudgetConfig {
    /// Floors checked in order; the first class named by the query wins
    #[serde(default = "default_realism_floors")]
    pub floors: Vec<RealismFloor>,

    /// Query tokens that mark an accessory search (guard is skipped)
    #[serde(default = "default_accessory_keywords")]
    pub accessory_keywords: Vec<String>,

    /// Currency label used in user-facing text
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or an EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 15 }
fn default_embedding_retries() -> u32 { 3 }
fn default_index_api_version() -> String { "2024-07".to_string() }
fn default_openai_namespace() -> String { String::new() }
fn default_huggingface_namespace() -> String { "huggingface".to_string() }
fn default_index_timeout() -> u64 { 10 }
fn default_generation_timeout() -> u64 { 30 }
fn default_answer_max_tokens() -> u32 { 1200 }
fn default_answer_temperature() -> f32 { 0.7 }
fn default_criteria_max_tokens() -> u32 { 400 }
fn default_retrieval_limit() -> usize { 10 }
fn default_openai_threshold() -> f32 { 0.25 }
fn default_huggingface_threshold() -> f32 { 0.35 }
fn default_routing_window() -> usize { 4 }
fn default_generation_window() -> usize { 6 }
fn default_session_ttl() -> u64 { 1800 }
fn default_max_stored_turns() -> usize { 20 }
fn default_key_prefix() -> String { "concommerce".to_string() }
fn default_currency() -> String { "Tk".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "concommerce".to_string() }

fn default_openai_embedding() -> EmbeddingProviderConfig {
    EmbeddingProviderConfig {
        api_key: None,
        api_base: "https://api.openai.com/v1".to_string(),
        model: "text-embedding-3-small".to_string(),
        dimension: default_embedding_dimension(),
    }
}

fn default_huggingface_embedding() -> EmbeddingProviderConfig {
    EmbeddingProviderConfig {
        api_key: None,
        api_base: "https://api-inference.huggingface.co/pipeline/feature-extraction".to_string(),
        model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        dimension: default_embedding_dimension(),
    }
}

fn default_openai_generator() -> GeneratorProviderConfig {
    GeneratorProviderConfig {
        api_key: None,
        api_base: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

fn default_gemini_generator() -> GeneratorProviderConfig {
    GeneratorProviderConfig {
        api_key: None,
        api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        model: "gemini-1.5-flash".to_string(),
    }
}

fn default_realism_floors() -> Vec<RealismFloor> {
    let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect();
    vec![
        RealismFloor {
            class: "laptop".to_string(),
            keywords: words(&[
                "laptop", "laptops", "notebook", "notebooks", "macbook", "ultrabook", "chromebook",
            ]),
            floor: 25_000,
        },
        RealismFloor {
            class: "desktop PC".to_string(),
            keywords: words(&["desktop", "desktops", "pc", "pcs", "computer", "workstation"]),
            floor: 20_000,
        },
    ]
}

fn default_accessory_keywords() -> Vec<String> {
    [
        "mouse", "keyboard", "headphone", "headphones", "headset", "earbuds", "webcam",
        "speaker", "speakers", "cable", "adapter", "charger", "bag", "backpack", "sleeve",
        "stand", "cooler", "cooling", "fan", "mousepad", "hub", "dock", "ram", "ssd", "hdd",
        "pendrive", "casing", "case", "skin", "protector", "battery", "ups", "accessory",
        "accessories",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            openai: default_openai_embedding(),
            huggingface: default_huggingface_embedding(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            api_version: default_index_api_version(),
            openai_namespace: default_openai_namespace(),
            huggingface_namespace: default_huggingface_namespace(),
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            openai: default_openai_generator(),
            gemini: default_gemini_generator(),
            default_backend: GenerationBackend::default(),
            timeout_secs: default_generation_timeout(),
            answer_max_tokens: default_answer_max_tokens(),
            answer_temperature: default_answer_temperature(),
            criteria_max_tokens: default_criteria_max_tokens(),
            criteria_temperature: 0.0,
            system_prompt: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_retrieval_limit(),
            default_space: EmbeddingSpace::default(),
            openai_threshold: default_openai_threshold(),
            huggingface_threshold: default_huggingface_threshold(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            routing_window: default_routing_window(),
            generation_window: default_generation_window(),
            session_ttl_secs: default_session_ttl(),
            max_stored_turns: default_max_stored_turns(),
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            floors: default_realism_floors(),
            accessory_keywords: default_accessory_keywords(),
            currency: default_currency(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl EmbeddingConfig {
    /// Provider settings for an embedding space
    pub fn provider(&self, space: EmbeddingSpace) -> &EmbeddingProviderConfig {
        match space {
            EmbeddingSpace::OpenAi => &self.openai,
            EmbeddingSpace::HuggingFace => &self.huggingface,
        }
    }

    /// Per-call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexConfig {
    /// Index partition holding vectors of an embedding space
    pub fn namespace(&self, space: EmbeddingSpace) -> &str {
        match space {
            EmbeddingSpace::OpenAi => &self.openai_namespace,
            EmbeddingSpace::HuggingFace => &self.huggingface_namespace,
        }
    }

    /// Per-call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GenerationConfig {
    /// Provider settings for a generation backend
    pub fn provider(&self, backend: GenerationBackend) -> &GeneratorProviderConfig {
        match backend {
            GenerationBackend::OpenAi => &self.openai,
            GenerationBackend::Gemini => &self.gemini,
        }
    }

    /// Per-call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrievalConfig {
    /// Relevance threshold for scores produced in an embedding space
    pub fn threshold(&self, space: EmbeddingSpace) -> f32 {
        match space {
            EmbeddingSpace::OpenAi => self.openai_threshold,
            EmbeddingSpace::HuggingFace => self.huggingface_threshold,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}
