//! Inputs to the purchase workflow.

use common::PurchaseId;

/// Quantity of a requested line, as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedQuantity {
    Units(i64),
    /// Anything that is not a whole number, kept verbatim for the error.
    Malformed(String),
}

/// One requested line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product_name: String,
    pub quantity: RequestedQuantity,
}

impl LineRequest {
    pub fn new(product_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_name: product_name.into(),
            quantity: RequestedQuantity::Units(quantity),
        }
    }

    /// A line whose quantity could not be read as a whole number. Checkout
    /// rejects it as an invalid line once the customer has been resolved.
    pub fn malformed(product_name: impl Into<String>, raw_quantity: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            quantity: RequestedQuantity::Malformed(raw_quantity.into()),
        }
    }
}

/// Command to buy the given lines, in order, for one customer.
#[derive(Debug, Clone)]
pub struct Checkout {
    /// Customer tax id as typed by the caller; formatting is tolerated.
    pub tax_id: String,
    pub lines: Vec<LineRequest>,
}

impl Checkout {
    pub fn new(tax_id: impl Into<String>, lines: Vec<LineRequest>) -> Self {
        Self {
            tax_id: tax_id.into(),
            lines,
        }
    }
}

/// Command to cancel one purchase of a customer.
#[derive(Debug, Clone)]
pub struct CancelPurchase {
    pub tax_id: String,
    pub purchase_id: PurchaseId,
}

impl CancelPurchase {
    pub fn new(tax_id: impl Into<String>, purchase_id: PurchaseId) -> Self {
        Self {
            tax_id: tax_id.into(),
            purchase_id,
        }
    }
}
