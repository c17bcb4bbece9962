//! Outputs of the purchase workflow.

use chrono::{DateTime, Utc};
use common::{Money, NameKey, PurchaseId, TaxId};
use store::{CustomerRecord, PurchaseLineView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    pub name: String,
    pub tax_id: TaxId,
}

impl From<&CustomerRecord> for CustomerSummary {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            name: record.name.clone(),
            tax_id: record.tax_id.clone(),
        }
    }
}

/// One purchased line, identified by its own purchase id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReceipt {
    pub purchase_id: PurchaseId,
    pub product_name: String,
    pub category: NameKey,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl From<&PurchaseLineView> for LineReceipt {
    fn from(view: &PurchaseLineView) -> Self {
        Self {
            purchase_id: view.purchase_id,
            product_name: view.product_name.clone(),
            category: view.category.clone(),
            quantity: view.quantity,
            unit_price: view.unit_price,
            subtotal: view.subtotal(),
        }
    }
}

/// Result of a committed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub customer: CustomerSummary,
    /// Sum of every line subtotal.
    pub total: Money,
    pub lines: Vec<LineReceipt>,
}

/// Result of a committed cancellation. Stock is not restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledPurchase {
    pub customer: CustomerSummary,
    /// The removed line, priced as it was recorded.
    pub line: LineReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    pub receipt: LineReceipt,
    pub purchased_at: DateTime<Utc>,
}

/// Every recorded line of a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseHistory {
    pub customer: CustomerSummary,
    pub lines: Vec<HistoryLine>,
    pub total_spent: Money,
}

impl PurchaseHistory {
    pub(crate) fn new(customer: &CustomerRecord, views: &[PurchaseLineView]) -> Self {
        let lines: Vec<HistoryLine> = views
            .iter()
            .map(|view| HistoryLine {
                receipt: LineReceipt::from(view),
                purchased_at: view.purchased_at,
            })
            .collect();
        let total_spent = lines.iter().map(|l| l.receipt.subtotal).sum();

        Self {
            customer: CustomerSummary::from(customer),
            lines,
            total_spent,
        }
    }
}
