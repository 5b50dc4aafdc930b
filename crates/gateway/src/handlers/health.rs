//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;
use concommerce_common::errors::AppError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub index: CheckResult,
    pub store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: concommerce_common::VERSION.to_string(),
    })
}

impl CheckResult {
    fn up(start: Instant, vectors: Option<u64>) -> Self {
        Self {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            vectors,
            error: None,
        }
    }

    fn down(component: &str, error: &AppError) -> Self {
        tracing::warn!(component = component, error = %error, "Readiness check failed");
        Self {
            status: "down".to_string(),
            latency_ms: None,
            vectors: None,
            error: Some(error.to_string()),
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Readiness probe - the similarity index and the session store must answer
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let start = Instant::now();
    let index_check = match state.index.describe_stats().await {
        Ok(stats) => CheckResult::up(start, Some(stats.total_vectors)),
        Err(e) => CheckResult::down("index", &e),
    };

    let start = Instant::now();
    let store_check = match state.store.ping().await {
        Ok(()) => CheckResult::up(start, None),
        Err(e) => CheckResult::down("store", &e),
    };

    let (status, label) = if index_check.is_up() && store_check.is_up() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(ReadyResponse {
            status: label.to_string(),
            checks: HealthChecks {
                index: index_check,
                store: store_check,
            },
        }),
    )
}
