//! Catalog: categories and the products filed under them.

mod service;
mod types;

pub use service::CatalogService;
pub use types::{
    CategoryDeleted, CategoryProducts, CategoryRenamed, NewProduct, ProductChanges,
    ProductOutcome, ProductRemoval, ProductUpdate, ProductView,
};

use store::StoreError;
use thiserror::Error;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Category not found: {name}")]
    CategoryNotFound { name: String },

    #[error("Category already exists: {name}")]
    CategoryExists { name: String },

    /// The category has products with recorded purchases.
    #[error("Category {name} has products with recorded purchases")]
    CategoryInUse { name: String },

    #[error("Invalid category: {reason}")]
    InvalidCategory { reason: String },

    #[error("No active products in category {name}")]
    NoActiveProducts { name: String },

    #[error("Product not found: {name}")]
    ProductNotFound { name: String },

    #[error("Product already exists: {name}")]
    ProductExists { name: String },

    #[error("Invalid product: {reason}")]
    InvalidProduct { reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
