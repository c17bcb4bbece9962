//! Domain error types.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::customer::CustomerError;
use crate::purchase::PurchaseError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Purchase(#[from] PurchaseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Customer(#[from] CustomerError),
}
