use async_trait::async_trait;
use common::{CategoryId, CustomerId, NameKey, ProductId, PurchaseId, TaxId};

use crate::{
    CategoryRecord, CustomerRecord, NewProduct, NewPurchaseLine, ProductRecord, PurchaseLineView,
    PurchaseRecord, Result,
};

/// Entry point to a storage backend.
///
/// A store hands out transactions; every read and write happens inside one.
/// Implementations must be thread-safe (Send + Sync) and cheap to clone
/// behind an `Arc` or a pool handle.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work against storage.
///
/// Dropping a transaction without calling [`StoreTx::commit`] discards every
/// write made through it.
#[async_trait]
pub trait StoreTx: Send {
    // -- Categories --

    /// Finds a category by its lower-case name.
    async fn find_category(&mut self, name: &NameKey) -> Result<Option<CategoryRecord>>;

    async fn category_by_id(&mut self, id: CategoryId) -> Result<Option<CategoryRecord>>;

    /// Lists all categories ordered by name.
    async fn list_categories(&mut self) -> Result<Vec<CategoryRecord>>;

    async fn insert_category(&mut self, name: &NameKey) -> Result<CategoryRecord>;

    /// Returns false when no category has this id.
    async fn rename_category(&mut self, id: CategoryId, name: &NameKey) -> Result<bool>;

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool>;

    /// Deletes every product of the category, returning how many were removed.
    async fn delete_products_in_category(&mut self, id: CategoryId) -> Result<u64>;

    /// True when any recorded purchase line references the category or one
    /// of its products.
    async fn category_has_purchases(&mut self, id: CategoryId) -> Result<bool>;

    // -- Products --

    /// Finds a product by key regardless of its active flag.
    async fn find_product(&mut self, key: &NameKey) -> Result<Option<ProductRecord>>;

    /// Lists active products ordered by key.
    async fn list_active_products(&mut self) -> Result<Vec<ProductRecord>>;

    async fn list_active_products_in_category(
        &mut self,
        id: CategoryId,
    ) -> Result<Vec<ProductRecord>>;

    async fn insert_product(&mut self, product: NewProduct) -> Result<ProductRecord>;

    /// Overwrites every mutable column of the product with this id.
    async fn update_product(&mut self, product: &ProductRecord) -> Result<bool>;

    async fn delete_product(&mut self, id: ProductId) -> Result<bool>;

    async fn product_has_purchases(&mut self, id: ProductId) -> Result<bool>;

    /// Removes `amount` units from stock only if at least that many remain.
    ///
    /// Returns false, leaving stock untouched, when the guard fails.
    async fn decrement_stock(&mut self, id: ProductId, amount: i64) -> Result<bool>;

    // -- Customers --

    async fn find_customer(&mut self, tax_id: &TaxId) -> Result<Option<CustomerRecord>>;

    async fn list_customers(&mut self) -> Result<Vec<CustomerRecord>>;

    async fn insert_customer(&mut self, tax_id: &TaxId, name: &str) -> Result<CustomerRecord>;

    /// Overwrites the tax id and name of the customer with this id.
    async fn update_customer(&mut self, customer: &CustomerRecord) -> Result<bool>;

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool>;

    async fn customer_has_purchases(&mut self, id: CustomerId) -> Result<bool>;

    // -- Purchases --

    /// Inserts a purchase header stamped with the current time.
    async fn insert_purchase(&mut self, customer_id: CustomerId) -> Result<PurchaseRecord>;

    async fn insert_purchase_line(&mut self, line: NewPurchaseLine) -> Result<()>;

    /// Finds the line of a purchase, matching both the purchase and its
    /// customer.
    async fn find_purchase_line(
        &mut self,
        customer_id: CustomerId,
        purchase_id: PurchaseId,
    ) -> Result<Option<PurchaseLineView>>;

    /// Returns the number of line rows removed.
    async fn delete_purchase_line(
        &mut self,
        customer_id: CustomerId,
        purchase_id: PurchaseId,
    ) -> Result<u64>;

    /// Returns the number of header rows removed.
    async fn delete_purchase(
        &mut self,
        purchase_id: PurchaseId,
        customer_id: CustomerId,
    ) -> Result<u64>;

    /// Lists the customer's lines ordered by purchase id.
    async fn purchase_lines_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Vec<PurchaseLineView>>;

    // -- Boundary --

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Extension trait providing convenience lookups on top of [`StoreTx`].
#[async_trait]
pub trait StoreTxExt: StoreTx {
    /// Finds a product that can still be sold.
    async fn find_active_product(&mut self, key: &NameKey) -> Result<Option<ProductRecord>> {
        Ok(self.find_product(key).await?.filter(|p| p.active))
    }

    /// Returns the name of the category with this id, if it still exists.
    async fn category_name_of(&mut self, id: CategoryId) -> Result<Option<NameKey>> {
        Ok(self.category_by_id(id).await?.map(|c| c.name))
    }
}

// Blanket implementation for all StoreTx implementations
impl<T: StoreTx> StoreTxExt for T {}
