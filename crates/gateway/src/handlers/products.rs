//! Catalog item lookup

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::AppState;
use concommerce_common::{
    errors::{AppError, Result},
    models::{CatalogItem, EmbeddingSpace},
};

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    /// Partition to look in; defaults to the configured space
    pub embedding_model: Option<EmbeddingSpace>,
}

/// Fetch one catalog item by id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<CatalogItem>> {
    let space = query
        .embedding_model
        .unwrap_or(state.config.retrieval.default_space);

    let item = state
        .index
        .fetch_by_id(std::slice::from_ref(&id), space)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound {
            resource_type: "product".to_string(),
            id: id.clone(),
        })?;

    tracing::debug!(id = %id, space = %space, "Product fetched");

    Ok(Json(item))
}
