//! Domain layer for the grocery store.
//!
//! This crate provides the services behind the HTTP API:
//! - `PurchaseService`: checkout, cancellation, and purchase history
//! - `CatalogService`: categories and products
//! - `CustomerService`: the customer directory
//!
//! Every operation runs as one storage transaction that is committed on
//! success and rolled back on any error.

pub mod catalog;
pub mod customer;
pub mod error;
pub mod purchase;
mod transaction;

pub use catalog::{
    CatalogError, CatalogService, CategoryDeleted, CategoryProducts, CategoryRenamed, NewProduct,
    ProductChanges, ProductOutcome, ProductRemoval, ProductUpdate, ProductView,
};
pub use customer::{CustomerError, CustomerService, CustomerUpdate, UpdateCustomer};
pub use error::DomainError;
pub use purchase::{
    CancelPurchase, CancelledPurchase, Checkout, CheckoutReceipt, CustomerSummary, HistoryLine,
    LineReceipt, LineRequest, PurchaseError, PurchaseHistory, PurchaseService, RequestedQuantity,
};
