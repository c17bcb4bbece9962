use common::{Money, NameKey};
use store::ProductRecord;

/// A product as shown to callers, with its category resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductView {
    pub name: String,
    pub category: NameKey,
    pub price: Money,
    pub quantity: i64,
}

impl ProductView {
    pub(crate) fn new(record: &ProductRecord, category: NameKey) -> Self {
        Self {
            name: record.name.clone(),
            category,
            price: record.price,
            quantity: record.stock,
        }
    }
}

/// The active products of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProducts {
    pub category: NameKey,
    pub products: Vec<ProductView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRenamed {
    pub old_name: NameKey,
    pub new_name: NameKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDeleted {
    pub name: NameKey,
    pub products_removed: u64,
}

/// Input for creating, or reactivating, a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: Money,
    pub quantity: i64,
}

/// Partial product update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub quantity: Option<i64>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    Created(ProductView),
    /// A previously deactivated product was brought back with the new values.
    Reactivated(ProductView),
}

impl ProductOutcome {
    pub fn product(&self) -> &ProductView {
        match self {
            ProductOutcome::Created(view) | ProductOutcome::Reactivated(view) => view,
        }
    }
}

/// Snapshots taken before and after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUpdate {
    pub before: ProductView,
    pub after: ProductView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRemoval {
    Deleted(ProductView),
    /// Purchases reference the product, so it was hidden instead of removed.
    Deactivated(ProductView),
}

impl ProductRemoval {
    pub fn product(&self) -> &ProductView {
        match self {
            ProductRemoval::Deleted(view) | ProductRemoval::Deactivated(view) => view,
        }
    }
}
