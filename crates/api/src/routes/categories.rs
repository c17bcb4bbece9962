//! Category endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use store::Store;

use super::AppState;
use super::products::CategoryListing;
use crate::error::ApiError;
use crate::extract::Payload;

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct RenameCategoryRequest {
    pub new_name: String,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub name: String,
}

#[derive(Serialize)]
pub struct CategoryRenamedResponse {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Serialize)]
pub struct CategoryDeletedResponse {
    pub name: String,
    pub products_removed: u64,
}

/// GET /categories
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let names = state.catalog.list_categories().await?;
    Ok(Json(
        names
            .into_iter()
            .map(|name| CategoryResponse {
                name: name.to_string(),
            })
            .collect(),
    ))
}

/// POST /categories
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Payload(req): Payload<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let name = state.catalog.create_category(&req.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
            name: name.to_string(),
        }),
    ))
}

/// PUT /categories/{name}
#[tracing::instrument(skip(state, req))]
pub async fn rename<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
    Payload(req): Payload<RenameCategoryRequest>,
) -> Result<Json<CategoryRenamedResponse>, ApiError> {
    let renamed = state.catalog.rename_category(&name, &req.new_name).await?;
    Ok(Json(CategoryRenamedResponse {
        old_name: renamed.old_name.to_string(),
        new_name: renamed.new_name.to_string(),
    }))
}

/// DELETE /categories/{name}: removes the category and its products.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<CategoryDeletedResponse>, ApiError> {
    let deleted = state.catalog.delete_category(&name).await?;
    Ok(Json(CategoryDeletedResponse {
        name: deleted.name.to_string(),
        products_removed: deleted.products_removed,
    }))
}

/// GET /categories/{name}/products
#[tracing::instrument(skip(state))]
pub async fn products<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<CategoryListing>, ApiError> {
    let group = state.catalog.products_in_category(&name).await?;
    Ok(Json(CategoryListing::from(&group)))
}
