//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency histograms sized for
//! remote model calls and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ConCommerce metrics
pub const METRICS_PREFIX: &str = "concommerce";

/// Histogram buckets for request latency (in seconds). A chat turn makes
/// up to two generation calls, so the tail reaches tens of seconds.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s
];

/// Buckets for embedding latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    15.00,  // 15s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_chat_turns_total", METRICS_PREFIX),
        Unit::Count,
        "Chat turns processed, by route"
    );

    describe_histogram!(
        format!("{}_chat_turn_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat turn latency in seconds"
    );

    describe_counter!(
        format!("{}_budget_short_circuits_total", METRICS_PREFIX),
        Unit::Count,
        "Turns answered by the budget guard without retrieval"
    );

    describe_counter!(
        format!("{}_selection_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Answers whose product selection could not be parsed"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total similarity index queries"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Similarity index query latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of items kept after post-filtering"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Text generation calls, by backend and outcome"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Text generation latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Generation calls served by the fallback backend"
    );

    // Session metrics
    describe_gauge!(
        format!("{}_sessions_active", METRICS_PREFIX),
        Unit::Count,
        "Conversation sessions currently stored"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a completed chat turn
pub fn record_chat_turn(duration_secs: f64, route: &str) {
    counter!(
        format!("{}_chat_turns_total", METRICS_PREFIX),
        "route" => route.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_chat_turn_duration_seconds", METRICS_PREFIX),
        "route" => route.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a budget guard short circuit
pub fn record_budget_short_circuit(class: &str) {
    counter!(
        format!("{}_budget_short_circuits_total", METRICS_PREFIX),
        "class" => class.to_string()
    )
    .increment(1);
}

/// Helper to record a selection parse fallback
pub fn record_selection_fallback() {
    counter!(format!("{}_selection_fallbacks_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, space: &str, result_count: usize) {
    counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        "space" => space.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "space" => space.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "space" => space.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record one generation attempt
pub fn record_generation(duration_secs: f64, backend: &str, purpose: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "purpose" => purpose.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "backend" => backend.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a call served by the fallback backend
pub fn record_generation_fallback(from: &str, to: &str) {
    counter!(
        format!("{}_generation_fallbacks_total", METRICS_PREFIX),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Helper to publish the stored session count
pub fn record_sessions(active: usize) {
    gauge!(format!("{}_sessions_active", METRICS_PREFIX)).set(active as f64);
}
