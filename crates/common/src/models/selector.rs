//! Closed selectors for the dual embedding spaces and generation backends

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vector representation scheme. Each space has its own index partition
/// and relevance threshold; scores from different spaces are not comparable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingSpace {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "huggingface")]
    HuggingFace,
}

impl EmbeddingSpace {
    pub const ALL: [EmbeddingSpace; 2] = [EmbeddingSpace::OpenAi, EmbeddingSpace::HuggingFace];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingSpace::OpenAi => "openai",
            EmbeddingSpace::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(EmbeddingSpace::OpenAi),
            "huggingface" | "hf" => Ok(EmbeddingSpace::HuggingFace),
            other => Err(format!("unknown embedding space '{}'", other)),
        }
    }
}

/// Text generation backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationBackend {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
}

impl GenerationBackend {
    pub const ALL: [GenerationBackend; 2] = [GenerationBackend::OpenAi, GenerationBackend::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationBackend::OpenAi => "openai",
            GenerationBackend::Gemini => "gemini",
        }
    }

    /// The backend tried when this one fails
    pub fn fallback(&self) -> GenerationBackend {
        match self {
            GenerationBackend::OpenAi => GenerationBackend::Gemini,
            GenerationBackend::Gemini => GenerationBackend::OpenAi,
        }
    }
}

impl fmt::Display for GenerationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(GenerationBackend::OpenAi),
            "gemini" | "google" => Ok(GenerationBackend::Gemini),
            other => Err(format!("unknown generation backend '{}'", other)),
        }
    }
}
