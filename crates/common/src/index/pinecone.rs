//! Pinecone data-plane REST client

use super::{item_from_metadata, IndexFilter, IndexMatch, IndexStats, SimilarityIndex};
use crate::config::IndexConfig;
use crate::embeddings::QueryVector;
use crate::errors::{AppError, Result};
use crate::models::{CatalogItem, EmbeddingSpace};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Client for one serverless index host
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    api_version: String,
    namespaces: HashMap<EmbeddingSpace, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredRecord>,
}

#[derive(Deserialize)]
struct ScoredRecord {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedRecord>,
}

#[derive(Deserialize)]
struct FetchedRecord {
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

impl PineconeIndex {
    /// Create a client from configuration
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = config.host.clone().ok_or_else(|| AppError::Configuration {
            message: "Index host not configured".to_string(),
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "Index API key not configured".to_string(),
        })?;

        let host = if host.starts_with("http") {
            host
        } else {
            format!("https://{}", host)
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let namespaces = EmbeddingSpace::ALL
            .into_iter()
            .map(|space| (space, config.namespace(space).to_string()))
            .collect();

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            api_version: config.api_version.clone(),
            namespaces,
        })
    }

    fn namespace(&self, space: EmbeddingSpace) -> &str {
        self.namespaces.get(&space).map(String::as_str).unwrap_or_default()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Index request timed out".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            AppError::SearchUnavailable { message }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchUnavailable {
                message: format!("Index error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::SearchUnavailable {
            message: format!("Failed to parse index response: {}", e),
        })
    }
}

#[async_trait]
impl SimilarityIndex for PineconeIndex {
    async fn query(
        &self,
        vector: &QueryVector,
        filter: &IndexFilter,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        let body = QueryRequest {
            namespace: self.namespace(vector.space),
            vector: &vector.values,
            top_k,
            filter: filter.to_json(),
            include_metadata: true,
            include_values: false,
        };

        tracing::debug!(
            namespace = body.namespace,
            top_k = top_k,
            filter = ?body.filter,
            "Querying index"
        );

        let response: QueryResponse = self
            .send(self.request(reqwest::Method::POST, "/query").json(&body))
            .await?;

        Ok(response
            .matches
            .into_iter()
            .filter_map(|record| {
                let metadata = record.metadata?;
                let item = item_from_metadata(&record.id, &metadata)?;
                Some(IndexMatch {
                    item,
                    score: record.score,
                })
            })
            .collect())
    }

    async fn fetch_by_id(&self, ids: &[String], space: EmbeddingSpace) -> Result<Vec<CatalogItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        params.push(("namespace", self.namespace(space)));

        let response: FetchResponse = self
            .send(self.request(reqwest::Method::GET, "/vectors/fetch").query(&params))
            .await?;

        // Keep the caller's order
        let mut vectors = response.vectors;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let metadata = vectors.remove(id)?.metadata?;
                item_from_metadata(id, &metadata)
            })
            .collect())
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let response: StatsResponse = self
            .send(
                self.request(reqwest::Method::POST, "/describe_index_stats")
                    .json(&serde_json::json!({})),
            )
            .await?;

        Ok(IndexStats {
            dimension: response.dimension,
            total_vectors: response.total_vector_count,
            namespaces: response
                .namespaces
                .into_iter()
                .map(|(name, stats)| (name, stats.vector_count))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IndexConfig {
        IndexConfig {
            host: Some("concommerce-products-abc123.svc.aped-4627-b74a.pinecone.io".into()),
            api_key: Some("test-key".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_host_gets_scheme() {
        let index = PineconeIndex::new(&config()).unwrap();
        assert!(index.host.starts_with("https://concommerce-products"));
    }

    #[test]
    fn test_namespaces_follow_space() {
        let index = PineconeIndex::new(&config()).unwrap();
        assert_eq!(index.namespace(EmbeddingSpace::OpenAi), "");
        assert_eq!(index.namespace(EmbeddingSpace::HuggingFace), "huggingface");
    }

    #[test]
    fn test_missing_credentials_fail() {
        let err = PineconeIndex::new(&IndexConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_query_body_uses_camel_case() {
        let values = vec![0.1_f32, 0.2];
        let body = QueryRequest {
            namespace: "huggingface",
            vector: &values,
            top_k: 20,
            filter: None,
            include_metadata: true,
            include_values: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["topK"], 20);
        assert_eq!(json["includeMetadata"], true);
        assert!(json.get("filter").is_none());
    }

    #[test]
    fn test_stats_response_parses() {
        let response: StatsResponse = serde_json::from_str(
            r#"{"namespaces":{"":{"vectorCount":1200},"huggingface":{"vectorCount":1200}},
                "dimension":384,"indexFullness":0.0,"totalVectorCount":2400}"#,
        )
        .unwrap();
        assert_eq!(response.dimension, 384);
        assert_eq!(response.total_vector_count, 2400);
        assert_eq!(response.namespaces["huggingface"].vector_count, 1200);
    }
}
