//! Row types exchanged between the domain and the storage backends.

use chrono::{DateTime, Utc};
use common::{CategoryId, CustomerId, Money, NameKey, ProductId, PurchaseId, TaxId};

/// A category row. The name is stored lower-case and doubles as its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: NameKey,
}

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    /// Display name as last written.
    pub name: String,
    /// Unique lookup key derived from `name`.
    pub name_key: NameKey,
    pub category_id: CategoryId,
    pub price: Money,
    pub stock: i64,
    pub active: bool,
}

/// Values for inserting a product. New products start active.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category_id: CategoryId,
    pub price: Money,
    pub stock: i64,
}

impl NewProduct {
    pub fn name_key(&self) -> NameKey {
        NameKey::new(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub id: CustomerId,
    pub tax_id: TaxId,
    pub name: String,
}

/// A purchase header. One exists per purchased line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
}

/// Values for the line row that accompanies a purchase header.
///
/// `unit_price` is the product price at the moment of purchase and is never
/// rewritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseLine {
    pub purchase_id: PurchaseId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub category_id: CategoryId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// A recorded line joined with its header, product, and category names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseLineView {
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub product_name: String,
    pub category: NameKey,
    pub quantity: i64,
    pub unit_price: Money,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseLineView {
    /// `unit_price × quantity`, saturating on overflow.
    pub fn subtotal(&self) -> Money {
        self.unit_price
            .checked_multiply(self.quantity)
            .unwrap_or(Money::from_cents(i64::MAX))
    }
}
