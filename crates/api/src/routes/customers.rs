//! Customer directory endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{CustomerSummary, UpdateCustomer};
use serde::{Deserialize, Serialize};
use store::Store;

use super::AppState;
use crate::error::ApiError;
use crate::extract::Payload;

#[derive(Deserialize)]
pub struct RegisterCustomerRequest {
    pub tax_id: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateCustomerRequest {
    pub new_tax_id: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub tax_id: String,
    pub name: String,
}

impl From<&CustomerSummary> for CustomerResponse {
    fn from(customer: &CustomerSummary) -> Self {
        Self {
            tax_id: customer.tax_id.to_string(),
            name: customer.name.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct CustomerUpdatedResponse {
    pub old: CustomerResponse,
    pub new: CustomerResponse,
}

/// GET /customers
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CustomerResponse>>, ApiError> {
    let customers = state.customers.list().await?;
    Ok(Json(customers.iter().map(CustomerResponse::from).collect()))
}

/// POST /customers
#[tracing::instrument(skip(state, req))]
pub async fn register<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Payload(req): Payload<RegisterCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let customer = state.customers.register(&req.tax_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(CustomerResponse::from(&customer))))
}

/// GET /customers/{tax_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tax_id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state.customers.get(&tax_id).await?;
    Ok(Json(CustomerResponse::from(&customer)))
}

/// PUT /customers/{tax_id}: replaces tax id and name.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tax_id): Path<String>,
    Payload(req): Payload<UpdateCustomerRequest>,
) -> Result<Json<CustomerUpdatedResponse>, ApiError> {
    let update = state
        .customers
        .update(
            &tax_id,
            UpdateCustomer {
                new_tax_id: req.new_tax_id,
                name: req.name,
            },
        )
        .await?;

    Ok(Json(CustomerUpdatedResponse {
        old: CustomerResponse::from(&update.old),
        new: CustomerResponse::from(&update.new),
    }))
}

/// DELETE /customers/{tax_id}
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tax_id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let removed = state.customers.remove(&tax_id).await?;
    Ok(Json(CustomerResponse::from(&removed)))
}
