//! Error types for ConCommerce services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each failing collaborator
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Message shown to end users when an upstream collaborator fails
pub const UNAVAILABLE_MESSAGE: &str =
    "We couldn't complete your request right now. Please try again in a moment.";

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    NotFound,
    SessionNotFound,

    // External service errors (8xxx)
    RetrievalUnavailable,
    SearchUnavailable,
    GenerationUnavailable,
    StoreUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::NotFound => 4001,
            ErrorCode::SessionNotFound => 4005,

            ErrorCode::RetrievalUnavailable => 8001,
            ErrorCode::SearchUnavailable => 8002,
            ErrorCode::GenerationUnavailable => 8003,
            ErrorCode::StoreUnavailable => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Similarity index unavailable: {message}")]
    SearchUnavailable { message: String },

    #[error("Generation failed on {backend}: {message}")]
    GenerationFailed { backend: String, message: String },

    #[error("All generation backends failed (primary: {primary}; fallback: {fallback})")]
    GenerationUnavailable { primary: String, fallback: String },

    #[error("Session store unavailable: {message}")]
    StoreUnavailable { message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::EmbeddingError { .. } => ErrorCode::RetrievalUnavailable,
            AppError::EmbeddingTimeout { .. } => ErrorCode::RetrievalUnavailable,
            AppError::SearchUnavailable { .. } => ErrorCode::SearchUnavailable,
            AppError::GenerationFailed { .. } => ErrorCode::GenerationUnavailable,
            AppError::GenerationUnavailable { .. } => ErrorCode::GenerationUnavailable,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } | AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. } | AppError::GenerationFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }

            // 503 Service Unavailable
            AppError::SearchUnavailable { .. }
            | AppError::GenerationUnavailable { .. }
            | AppError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::EmbeddingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether this error comes from a failed external collaborator
    pub fn is_upstream(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::RetrievalUnavailable
                | ErrorCode::SearchUnavailable
                | ErrorCode::GenerationUnavailable
                | ErrorCode::StoreUnavailable
        )
    }

    /// Message safe to show to the end user.
    ///
    /// Upstream failures collapse into one generic sentence; the cause is
    /// reported separately in the `details` field.
    pub fn user_message(&self) -> String {
        if self.is_upstream() {
            UNAVAILABLE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let cause = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %cause,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %cause,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::GenerationUnavailable { primary, fallback } => Some(serde_json::json!({
                "primary": primary,
                "fallback": fallback,
            })),
            AppError::Validation { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ if self.is_upstream() => Some(serde_json::json!({ "cause": cause })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.user_message(),
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
