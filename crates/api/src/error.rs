//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CatalogError, CustomerError, DomainError, PurchaseError};

const INTERNAL_MESSAGE: &str = "internal server error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Storage faults are logged with their detail and answered with a generic
/// message.
fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = status_of(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "internal server error");
        return (status, INTERNAL_MESSAGE.to_string());
    }
    (status, err.to_string())
}

fn status_of(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Purchase(err) => match err {
            PurchaseError::CustomerNotFound { .. }
            | PurchaseError::ProductNotFound { .. }
            | PurchaseError::PurchaseNotFound { .. } => StatusCode::NOT_FOUND,
            PurchaseError::EmptyOrder | PurchaseError::InvalidLineItem { .. } => {
                StatusCode::BAD_REQUEST
            }
            PurchaseError::InsufficientStock { .. } => StatusCode::CONFLICT,
            PurchaseError::TransactionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DomainError::Catalog(err) => match err {
            CatalogError::CategoryNotFound { .. }
            | CatalogError::ProductNotFound { .. }
            | CatalogError::NoActiveProducts { .. } => StatusCode::NOT_FOUND,
            CatalogError::InvalidCategory { .. } | CatalogError::InvalidProduct { .. } => {
                StatusCode::BAD_REQUEST
            }
            CatalogError::CategoryExists { .. }
            | CatalogError::CategoryInUse { .. }
            | CatalogError::ProductExists { .. } => StatusCode::CONFLICT,
            CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DomainError::Customer(err) => match err {
            CustomerError::CustomerNotFound { .. } => StatusCode::NOT_FOUND,
            CustomerError::InvalidTaxId { .. }
            | CustomerError::InvalidName
            | CustomerError::NoChanges => StatusCode::BAD_REQUEST,
            CustomerError::CustomerExists { .. } | CustomerError::CustomerHasPurchases { .. } => {
                StatusCode::CONFLICT
            }
            CustomerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<CustomerError> for ApiError {
    fn from(err: CustomerError) -> Self {
        ApiError::Domain(err.into())
    }
}
