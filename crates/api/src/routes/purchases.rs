//! Checkout, cancellation, and purchase history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::PurchaseId;
use domain::{
    CancelPurchase, Checkout, CheckoutReceipt, HistoryLine, LineReceipt, LineRequest,
    PurchaseHistory,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use store::Store;

use super::AppState;
use super::customers::CustomerResponse;
use crate::error::ApiError;
use crate::extract::Payload;

// -- Request types --

/// Fields are read leniently so that the customer check runs before any
/// line is judged.
#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    #[serde(default)]
    pub product_name: Value,
    #[serde(default)]
    pub quantity: Value,
}

impl From<LineItemRequest> for LineRequest {
    fn from(item: LineItemRequest) -> Self {
        let product_name = item.product_name.as_str().unwrap_or_default();
        let quantity = match &item.quantity {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        match quantity {
            Some(quantity) => LineRequest::new(product_name, quantity),
            None => LineRequest::malformed(product_name, item.quantity.to_string()),
        }
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct LineResponse {
    pub purchase_id: i64,
    pub product_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<&LineReceipt> for LineResponse {
    fn from(line: &LineReceipt) -> Self {
        Self {
            purchase_id: line.purchase_id.as_i64(),
            product_name: line.product_name.clone(),
            category: line.category.to_string(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal.cents(),
        }
    }
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub customer: CustomerResponse,
    pub total_cents: i64,
    /// Two-decimal rendering of `total_cents`.
    pub total: String,
    pub lines: Vec<LineResponse>,
}

impl From<&CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: &CheckoutReceipt) -> Self {
        Self {
            customer: CustomerResponse::from(&receipt.customer),
            total_cents: receipt.total.cents(),
            total: receipt.total.to_decimal_string(),
            lines: receipt.lines.iter().map(LineResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub customer: CustomerResponse,
    pub cancelled: LineResponse,
}

#[derive(Serialize)]
pub struct HistoryLineResponse {
    #[serde(flatten)]
    pub line: LineResponse,
    pub purchased_at: DateTime<Utc>,
}

impl From<&HistoryLine> for HistoryLineResponse {
    fn from(line: &HistoryLine) -> Self {
        Self {
            line: LineResponse::from(&line.receipt),
            purchased_at: line.purchased_at,
        }
    }
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub customer: CustomerResponse,
    pub purchases: Vec<HistoryLineResponse>,
    pub total_spent_cents: i64,
}

impl From<&PurchaseHistory> for HistoryResponse {
    fn from(history: &PurchaseHistory) -> Self {
        Self {
            customer: CustomerResponse::from(&history.customer),
            purchases: history.lines.iter().map(HistoryLineResponse::from).collect(),
            total_spent_cents: history.total_spent.cents(),
        }
    }
}

// -- Handlers --

/// POST /purchases: buys every item atomically.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn checkout<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Payload(req): Payload<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let lines = req
        .items
        .into_iter()
        .map(LineRequest::from)
        .collect();

    let receipt = state
        .purchases
        .checkout(Checkout::new(req.tax_id, lines))
        .await?;
    Ok(Json(CheckoutResponse::from(&receipt)))
}

/// GET /purchases: history of every customer.
#[tracing::instrument(skip(state))]
pub async fn all_histories<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<HistoryResponse>>, ApiError> {
    let histories = state.purchases.all_histories().await?;
    Ok(Json(histories.iter().map(HistoryResponse::from).collect()))
}

/// GET /customers/{tax_id}/purchases
#[tracing::instrument(skip(state))]
pub async fn history<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tax_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.purchases.history(&tax_id).await?;
    Ok(Json(HistoryResponse::from(&history)))
}

/// DELETE /customers/{tax_id}/purchases/{purchase_id}: stock is not restored.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tax_id, purchase_id)): Path<(String, String)>,
) -> Result<Json<CancelResponse>, ApiError> {
    let purchase_id = parse_purchase_id(&purchase_id)?;
    let cancelled = state
        .purchases
        .cancel(CancelPurchase::new(tax_id, purchase_id))
        .await?;

    Ok(Json(CancelResponse {
        customer: CustomerResponse::from(&cancelled.customer),
        cancelled: LineResponse::from(&cancelled.line),
    }))
}

fn parse_purchase_id(raw: &str) -> Result<PurchaseId, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(PurchaseId::new)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid purchase id: {raw}")))
}
