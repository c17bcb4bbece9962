//! Product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Money;
use domain::{
    CategoryProducts, NewProduct, ProductChanges, ProductOutcome, ProductRemoval, ProductView,
};
use serde::{Deserialize, Serialize};
use store::Store;

use super::AppState;
use crate::error::ApiError;
use crate::extract::Payload;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub price: String,
    pub quantity: i64,
}

impl From<&ProductView> for ProductResponse {
    fn from(view: &ProductView) -> Self {
        Self {
            name: view.name.clone(),
            category: view.category.to_string(),
            price_cents: view.price.cents(),
            price: view.price.to_decimal_string(),
            quantity: view.quantity,
        }
    }
}

#[derive(Serialize)]
pub struct CategoryListing {
    pub category: String,
    pub products: Vec<ProductResponse>,
}

impl From<&CategoryProducts> for CategoryListing {
    fn from(group: &CategoryProducts) -> Self {
        Self {
            category: group.category.to_string(),
            products: group.products.iter().map(ProductResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ProductOutcomeResponse {
    /// `created`, `reactivated`, `deleted`, or `deactivated`.
    pub outcome: &'static str,
    pub product: ProductResponse,
}

#[derive(Serialize)]
pub struct ProductUpdateResponse {
    pub before: ProductResponse,
    pub after: ProductResponse,
}

// -- Handlers --

/// GET /products: active products grouped by category.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CategoryListing>>, ApiError> {
    let groups = state.catalog.list_products().await?;
    Ok(Json(groups.iter().map(CategoryListing::from).collect()))
}

/// GET /products/{name}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(&name).await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// POST /products: creates a product, or reactivates a deactivated one.
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Payload(req): Payload<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductOutcomeResponse>), ApiError> {
    let outcome = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            category: req.category,
            price: Money::from_cents(req.price_cents),
            quantity: req.quantity,
        })
        .await?;

    let (status, label) = match &outcome {
        ProductOutcome::Created(_) => (StatusCode::CREATED, "created"),
        ProductOutcome::Reactivated(_) => (StatusCode::OK, "reactivated"),
    };
    Ok((
        status,
        Json(ProductOutcomeResponse {
            outcome: label,
            product: ProductResponse::from(outcome.product()),
        }),
    ))
}

/// PUT /products/{name}: partial update; returns before and after.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
    Payload(req): Payload<UpdateProductRequest>,
) -> Result<Json<ProductUpdateResponse>, ApiError> {
    let changes = ProductChanges {
        name: req.name,
        category: req.category,
        price: req.price_cents.map(Money::from_cents),
        quantity: req.quantity,
    };
    let update = state.catalog.update_product(&name, changes).await?;

    Ok(Json(ProductUpdateResponse {
        before: ProductResponse::from(&update.before),
        after: ProductResponse::from(&update.after),
    }))
}

/// DELETE /products/{name}: deletes, or deactivates when purchases exist.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<ProductOutcomeResponse>, ApiError> {
    let removal = state.catalog.delete_product(&name).await?;
    let label = match &removal {
        ProductRemoval::Deleted(_) => "deleted",
        ProductRemoval::Deactivated(_) => "deactivated",
    };
    Ok(Json(ProductOutcomeResponse {
        outcome: label,
        product: ProductResponse::from(removal.product()),
    }))
}
