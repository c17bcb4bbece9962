//! Customer directory: registration and maintenance of customers.

mod service;

pub use service::{CustomerService, CustomerUpdate, UpdateCustomer};

use common::TaxIdError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during customer operations.
#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("Invalid tax id {input}: {source}")]
    InvalidTaxId {
        input: String,
        #[source]
        source: TaxIdError,
    },

    #[error("Customer name is required")]
    InvalidName,

    #[error("Customer not found: {tax_id}")]
    CustomerNotFound { tax_id: String },

    #[error("Customer already exists: {tax_id}")]
    CustomerExists { tax_id: String },

    /// The update would leave the customer exactly as it is.
    #[error("No changes to apply")]
    NoChanges,

    #[error("Customer {tax_id} has recorded purchases")]
    CustomerHasPurchases { tax_id: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
