//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use store::{Store, StoreTx};

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health: reports whether storage accepts transactions.
pub async fn check<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let storage_ok = match state.store.begin().await {
        Ok(tx) => tx.rollback().await.is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not open a transaction");
            false
        }
    };

    if storage_ok {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                storage: "up",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                storage: "down",
            }),
        )
    }
}
