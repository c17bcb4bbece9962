//! Purchase workflow: checkout, cancellation, and history.

mod commands;
mod receipts;
mod service;

pub use commands::{CancelPurchase, Checkout, LineRequest, RequestedQuantity};
pub use receipts::{
    CancelledPurchase, CheckoutReceipt, CustomerSummary, HistoryLine, LineReceipt,
    PurchaseHistory,
};
pub use service::PurchaseService;

use common::PurchaseId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during purchase operations.
///
/// Every variant except `TransactionFailure` is a validation outcome; all of
/// them leave storage exactly as it was before the call.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// No customer has this tax id.
    #[error("Customer not found: {tax_id}")]
    CustomerNotFound { tax_id: String },

    /// The checkout carried no lines.
    #[error("Order has no items")]
    EmptyOrder,

    /// A line is missing its product name or has a non-positive quantity.
    #[error("Invalid line item {line}: {reason}")]
    InvalidLineItem { line: usize, reason: String },

    /// No active product matches the requested name.
    #[error("Product not found: {name}")]
    ProductNotFound { name: String },

    /// The product cannot cover the requested quantity.
    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: i64,
        available: i64,
    },

    /// The customer has no purchase with this id.
    #[error("Purchase {purchase_id} not found for customer {tax_id}")]
    PurchaseNotFound {
        purchase_id: PurchaseId,
        tax_id: String,
    },

    /// Storage failed while the transaction was open.
    #[error("Transaction failed: {0}")]
    TransactionFailure(#[from] StoreError),
}
