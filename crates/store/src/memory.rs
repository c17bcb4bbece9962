use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{CategoryId, CustomerId, NameKey, ProductId, PurchaseId, TaxId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CategoryRecord, CustomerRecord, NewProduct, NewPurchaseLine, ProductRecord, PurchaseLineView,
    PurchaseRecord, Result, StoreError,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    category: i64,
    product: i64,
    customer: i64,
    purchase: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, CategoryRecord>,
    products: BTreeMap<ProductId, ProductRecord>,
    customers: BTreeMap<CustomerId, CustomerRecord>,
    purchases: BTreeMap<PurchaseId, PurchaseRecord>,
    lines: Vec<NewPurchaseLine>,
    seq: Sequences,
}

impl Tables {
    fn unique_violation(constraint: &str) -> StoreError {
        StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    fn line_view(&self, line: &NewPurchaseLine) -> Option<PurchaseLineView> {
        let header = self.purchases.get(&line.purchase_id)?;
        if header.customer_id != line.customer_id {
            return None;
        }
        let product = self.products.get(&line.product_id)?;
        let category = self.categories.get(&line.category_id)?;

        Some(PurchaseLineView {
            purchase_id: line.purchase_id,
            product_id: line.product_id,
            product_name: product.name.clone(),
            category: category.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            purchased_at: header.created_at,
        })
    }
}

/// In-memory store for tests and database-less runs.
///
/// Transactions are serialized: `begin` takes an exclusive lock on the
/// tables and works on a private copy that replaces them on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_stock_updates: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent stock decrement fail with
    /// [`StoreError::Unavailable`] until switched off.
    pub fn set_fail_stock_updates(&self, fail: bool) {
        self.fail_stock_updates.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed purchase headers.
    pub async fn purchase_count(&self) -> usize {
        self.tables.lock().await.purchases.len()
    }

    /// Returns the number of committed purchase lines.
    pub async fn purchase_line_count(&self) -> usize {
        self.tables.lock().await.lines.len()
    }

    /// Returns the committed stock of a product, looked up by name.
    pub async fn product_stock(&self, name: &str) -> Option<i64> {
        let key = NameKey::new(name);
        self.tables
            .lock()
            .await
            .products
            .values()
            .find(|p| p.name_key == key)
            .map(|p| p.stock)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let shared = self.tables.clone().lock_owned().await;
        let working = shared.clone();
        Ok(InMemoryTx {
            shared,
            working,
            fail_stock_updates: self.fail_stock_updates.clone(),
        })
    }
}

/// An open in-memory transaction.
pub struct InMemoryTx {
    shared: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_stock_updates: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn find_category(&mut self, name: &NameKey) -> Result<Option<CategoryRecord>> {
        Ok(self
            .working
            .categories
            .values()
            .find(|c| &c.name == name)
            .cloned())
    }

    async fn category_by_id(&mut self, id: CategoryId) -> Result<Option<CategoryRecord>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn list_categories(&mut self) -> Result<Vec<CategoryRecord>> {
        let mut categories: Vec<_> = self.working.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&mut self, name: &NameKey) -> Result<CategoryRecord> {
        if self.working.categories.values().any(|c| &c.name == name) {
            return Err(Tables::unique_violation("uq_categories_name"));
        }
        let record = CategoryRecord {
            id: CategoryId::new(next(&mut self.working.seq.category)),
            name: name.clone(),
        };
        self.working.categories.insert(record.id, record.clone());
        Ok(record)
    }

    async fn rename_category(&mut self, id: CategoryId, name: &NameKey) -> Result<bool> {
        if self
            .working
            .categories
            .values()
            .any(|c| &c.name == name && c.id != id)
        {
            return Err(Tables::unique_violation("uq_categories_name"));
        }
        match self.working.categories.get_mut(&id) {
            Some(category) => {
                category.name = name.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool> {
        if self.working.products.values().any(|p| p.category_id == id)
            || self.working.lines.iter().any(|l| l.category_id == id)
        {
            return Err(StoreError::Integrity(format!(
                "category {id} is still referenced"
            )));
        }
        Ok(self.working.categories.remove(&id).is_some())
    }

    async fn delete_products_in_category(&mut self, id: CategoryId) -> Result<u64> {
        let doomed: Vec<ProductId> = self
            .working
            .products
            .values()
            .filter(|p| p.category_id == id)
            .map(|p| p.id)
            .collect();
        if self
            .working
            .lines
            .iter()
            .any(|l| doomed.contains(&l.product_id))
        {
            return Err(StoreError::Integrity(format!(
                "products of category {id} have recorded purchases"
            )));
        }
        for product_id in &doomed {
            self.working.products.remove(product_id);
        }
        Ok(doomed.len() as u64)
    }

    async fn category_has_purchases(&mut self, id: CategoryId) -> Result<bool> {
        let tables = &self.working;
        Ok(tables.lines.iter().any(|l| {
            l.category_id == id
                || tables
                    .products
                    .get(&l.product_id)
                    .is_some_and(|p| p.category_id == id)
        }))
    }

    async fn find_product(&mut self, key: &NameKey) -> Result<Option<ProductRecord>> {
        Ok(self
            .working
            .products
            .values()
            .find(|p| &p.name_key == key)
            .cloned())
    }

    async fn list_active_products(&mut self) -> Result<Vec<ProductRecord>> {
        let mut products: Vec<_> = self
            .working
            .products
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name_key.cmp(&b.name_key));
        Ok(products)
    }

    async fn list_active_products_in_category(
        &mut self,
        id: CategoryId,
    ) -> Result<Vec<ProductRecord>> {
        let mut products = self.list_active_products().await?;
        products.retain(|p| p.category_id == id);
        Ok(products)
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<ProductRecord> {
        let name_key = product.name_key();
        if self.working.products.values().any(|p| p.name_key == name_key) {
            return Err(Tables::unique_violation("uq_products_name_key"));
        }
        if !self.working.categories.contains_key(&product.category_id) {
            return Err(StoreError::Integrity(format!(
                "category {} does not exist",
                product.category_id
            )));
        }
        let record = ProductRecord {
            id: ProductId::new(next(&mut self.working.seq.product)),
            name: product.name,
            name_key,
            category_id: product.category_id,
            price: product.price,
            stock: product.stock,
            active: true,
        };
        self.working.products.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_product(&mut self, product: &ProductRecord) -> Result<bool> {
        if self
            .working
            .products
            .values()
            .any(|p| p.name_key == product.name_key && p.id != product.id)
        {
            return Err(Tables::unique_violation("uq_products_name_key"));
        }
        match self.working.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        if self.working.lines.iter().any(|l| l.product_id == id) {
            return Err(StoreError::Integrity(format!(
                "product {id} has recorded purchases"
            )));
        }
        Ok(self.working.products.remove(&id).is_some())
    }

    async fn product_has_purchases(&mut self, id: ProductId) -> Result<bool> {
        Ok(self.working.lines.iter().any(|l| l.product_id == id))
    }

    async fn decrement_stock(&mut self, id: ProductId, amount: i64) -> Result<bool> {
        if self.fail_stock_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "stock update rejected by fault injection".to_string(),
            ));
        }
        match self.working.products.get_mut(&id) {
            Some(product) if product.stock >= amount => {
                product.stock -= amount;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_customer(&mut self, tax_id: &TaxId) -> Result<Option<CustomerRecord>> {
        Ok(self
            .working
            .customers
            .values()
            .find(|c| &c.tax_id == tax_id)
            .cloned())
    }

    async fn list_customers(&mut self) -> Result<Vec<CustomerRecord>> {
        Ok(self.working.customers.values().cloned().collect())
    }

    async fn insert_customer(&mut self, tax_id: &TaxId, name: &str) -> Result<CustomerRecord> {
        if self.working.customers.values().any(|c| &c.tax_id == tax_id) {
            return Err(Tables::unique_violation("uq_customers_tax_id"));
        }
        let record = CustomerRecord {
            id: CustomerId::new(next(&mut self.working.seq.customer)),
            tax_id: tax_id.clone(),
            name: name.to_string(),
        };
        self.working.customers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_customer(&mut self, customer: &CustomerRecord) -> Result<bool> {
        if self
            .working
            .customers
            .values()
            .any(|c| c.tax_id == customer.tax_id && c.id != customer.id)
        {
            return Err(Tables::unique_violation("uq_customers_tax_id"));
        }
        match self.working.customers.get_mut(&customer.id) {
            Some(existing) => {
                *existing = customer.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool> {
        if self.working.purchases.values().any(|p| p.customer_id == id) {
            return Err(StoreError::Integrity(format!(
                "customer {id} has recorded purchases"
            )));
        }
        Ok(self.working.customers.remove(&id).is_some())
    }

    async fn customer_has_purchases(&mut self, id: CustomerId) -> Result<bool> {
        Ok(self.working.purchases.values().any(|p| p.customer_id == id))
    }

    async fn insert_purchase(&mut self, customer_id: CustomerId) -> Result<PurchaseRecord> {
        if !self.working.customers.contains_key(&customer_id) {
            return Err(StoreError::Integrity(format!(
                "customer {customer_id} does not exist"
            )));
        }
        let record = PurchaseRecord {
            id: PurchaseId::new(next(&mut self.working.seq.purchase)),
            customer_id,
            created_at: Utc::now(),
        };
        self.working.purchases.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_purchase_line(&mut self, line: NewPurchaseLine) -> Result<()> {
        if !self.working.purchases.contains_key(&line.purchase_id) {
            return Err(StoreError::Integrity(format!(
                "purchase {} does not exist",
                line.purchase_id
            )));
        }
        self.working.lines.push(line);
        Ok(())
    }

    async fn find_purchase_line(
        &mut self,
        customer_id: CustomerId,
        purchase_id: PurchaseId,
    ) -> Result<Option<PurchaseLineView>> {
        let tables = &self.working;
        Ok(tables
            .lines
            .iter()
            .filter(|l| l.customer_id == customer_id && l.purchase_id == purchase_id)
            .find_map(|l| tables.line_view(l)))
    }

    async fn delete_purchase_line(
        &mut self,
        customer_id: CustomerId,
        purchase_id: PurchaseId,
    ) -> Result<u64> {
        let before = self.working.lines.len();
        self.working
            .lines
            .retain(|l| !(l.customer_id == customer_id && l.purchase_id == purchase_id));
        Ok((before - self.working.lines.len()) as u64)
    }

    async fn delete_purchase(
        &mut self,
        purchase_id: PurchaseId,
        customer_id: CustomerId,
    ) -> Result<u64> {
        let matches = self
            .working
            .purchases
            .get(&purchase_id)
            .is_some_and(|p| p.customer_id == customer_id);
        if !matches {
            return Ok(0);
        }
        if self.working.lines.iter().any(|l| l.purchase_id == purchase_id) {
            return Err(StoreError::Integrity(format!(
                "purchase {purchase_id} still has lines"
            )));
        }
        self.working.purchases.remove(&purchase_id);
        Ok(1)
    }

    async fn purchase_lines_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Vec<PurchaseLineView>> {
        let tables = &self.working;
        let mut lines: Vec<_> = tables
            .lines
            .iter()
            .filter(|l| l.customer_id == customer_id)
            .filter_map(|l| tables.line_view(l))
            .collect();
        lines.sort_by_key(|l| l.purchase_id);
        Ok(lines)
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTx {
            mut shared,
            working,
            ..
        } = self;
        *shared = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
