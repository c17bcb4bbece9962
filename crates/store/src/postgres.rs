use std::str::FromStr;

use async_trait::async_trait;
use common::{CategoryId, CustomerId, Money, NameKey, ProductId, PurchaseId, TaxId};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::{
    CategoryRecord, CustomerRecord, NewProduct, NewPurchaseLine, ProductRecord, PurchaseLineView,
    PurchaseRecord, Result, StoreError,
    store::{Store, StoreTx},
};

const PRODUCT_COLUMNS: &str = "id, name, name_key, category_id, price_cents, stock, active";

const LINE_VIEW_SELECT: &str = r#"
    SELECT pl.purchase_id, pl.product_id, p.name AS product_name, c.name AS category,
           pl.quantity, pl.unit_price_cents, pu.created_at
    FROM purchase_lines pl
    JOIN purchases pu ON pu.id = pl.purchase_id AND pu.customer_id = pl.customer_id
    JOIN products p ON p.id = pl.product_id
    JOIN categories c ON c.id = pl.category_id
"#;

/// PostgreSQL-backed store.
///
/// Owns the connection pool for the lifetime of the process: build it with
/// [`PostgresStore::connect`] at startup and release it with
/// [`PostgresStore::close`] on shutdown.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `url` with at most `max_connections` connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?;
        Self::connect_with(options, max_connections).await
    }

    /// Opens a pool from already parsed connection options.
    pub async fn connect_with(options: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTx { tx })
    }
}

/// An open PostgreSQL transaction.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn row_to_category(row: PgRow) -> Result<CategoryRecord> {
    Ok(CategoryRecord {
        id: CategoryId::new(row.try_get("id")?),
        name: NameKey::from_normalized(row.try_get::<String, _>("name")?),
    })
}

fn row_to_product(row: PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        name_key: NameKey::from_normalized(row.try_get::<String, _>("name_key")?),
        category_id: CategoryId::new(row.try_get("category_id")?),
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: row.try_get("stock")?,
        active: row.try_get("active")?,
    })
}

fn row_to_customer(row: PgRow) -> Result<CustomerRecord> {
    let raw_tax_id: String = row.try_get("tax_id")?;
    let tax_id = TaxId::parse(&raw_tax_id)
        .map_err(|e| StoreError::Integrity(format!("customer tax id {raw_tax_id}: {e}")))?;

    Ok(CustomerRecord {
        id: CustomerId::new(row.try_get("id")?),
        tax_id,
        name: row.try_get("name")?,
    })
}

fn row_to_line_view(row: PgRow) -> Result<PurchaseLineView> {
    Ok(PurchaseLineView {
        purchase_id: PurchaseId::new(row.try_get("purchase_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        category: NameKey::from_normalized(row.try_get::<String, _>("category")?),
        quantity: row.try_get("quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        purchased_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn find_category(&mut self, name: &NameKey) -> Result<Option<CategoryRecord>> {
        sqlx::query("SELECT id, name FROM categories WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_category)
            .transpose()
    }

    async fn category_by_id(&mut self, id: CategoryId) -> Result<Option<CategoryRecord>> {
        sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_category)
            .transpose()
    }

    async fn list_categories(&mut self) -> Result<Vec<CategoryRecord>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC")
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_category).collect()
    }

    async fn insert_category(&mut self, name: &NameKey) -> Result<CategoryRecord> {
        let row = sqlx::query("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
            .bind(name.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        row_to_category(row)
    }

    async fn rename_category(&mut self, id: CategoryId, name: &NameKey) -> Result<bool> {
        let result = sqlx::query("UPDATE categories SET name = $1 WHERE id = $2")
            .bind(name.as_str())
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_products_in_category(&mut self, id: CategoryId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM products WHERE category_id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn category_has_purchases(&mut self, id: CategoryId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM purchase_lines
                WHERE category_id = $1
                   OR product_id IN (SELECT id FROM products WHERE category_id = $1)
            )
            "#,
        )
        .bind(id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn find_product(&mut self, key: &NameKey) -> Result<Option<ProductRecord>> {
        sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE name_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_product)
        .transpose()
    }

    async fn list_active_products(&mut self) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = TRUE ORDER BY name_key ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn list_active_products_in_category(
        &mut self,
        id: CategoryId,
    ) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE category_id = $1 AND active = TRUE ORDER BY name_key ASC"
        ))
        .bind(id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<ProductRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, name_key, category_id, price_cents, stock, active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(product.name_key().as_str())
        .bind(product.category_id.as_i64())
        .bind(product.price.cents())
        .bind(product.stock)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_product(row)
    }

    async fn update_product(&mut self, product: &ProductRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, name_key = $2, category_id = $3, price_cents = $4, stock = $5, active = $6
            WHERE id = $7
            "#,
        )
        .bind(&product.name)
        .bind(product.name_key.as_str())
        .bind(product.category_id.as_i64())
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(product.active)
        .bind(product.id.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn product_has_purchases(&mut self, id: ProductId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM purchase_lines WHERE product_id = $1)",
        )
        .bind(id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn decrement_stock(&mut self, id: ProductId, amount: i64) -> Result<bool> {
        // Postgres re-checks the guard after acquiring the row lock, so two
        // concurrent checkouts cannot both take the last units.
        let result =
            sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
                .bind(amount)
                .bind(id.as_i64())
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_customer(&mut self, tax_id: &TaxId) -> Result<Option<CustomerRecord>> {
        sqlx::query("SELECT id, tax_id, name FROM customers WHERE tax_id = $1")
            .bind(tax_id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_customer)
            .transpose()
    }

    async fn list_customers(&mut self) -> Result<Vec<CustomerRecord>> {
        let rows = sqlx::query("SELECT id, tax_id, name FROM customers ORDER BY id ASC")
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_customer).collect()
    }

    async fn insert_customer(&mut self, tax_id: &TaxId, name: &str) -> Result<CustomerRecord> {
        let row = sqlx::query(
            "INSERT INTO customers (tax_id, name) VALUES ($1, $2) RETURNING id, tax_id, name",
        )
        .bind(tax_id.as_str())
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_customer(row)
    }

    async fn update_customer(&mut self, customer: &CustomerRecord) -> Result<bool> {
        let result = sqlx::query("UPDATE customers SET tax_id = $1, name = $2 WHERE id = $3")
            .bind(customer.tax_id.as_str())
            .bind(&customer.name)
            .bind(customer.id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn customer_has_purchases(&mut self, id: CustomerId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM purchases WHERE customer_id = $1)")
                .bind(id.as_i64())
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn insert_purchase(&mut self, customer_id: CustomerId) -> Result<PurchaseRecord> {
        let row = sqlx::query(
            "INSERT INTO purchases (customer_id, created_at) VALUES ($1, NOW()) \
             RETURNING id, customer_id, created_at",
        )
        .bind(customer_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(PurchaseRecord {
            id: PurchaseId::new(row.try_get("id")?),
            customer_id: CustomerId::new(row.try_get("customer_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_purchase_line(&mut self, line: NewPurchaseLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_lines
                (purchase_id, customer_id, product_id, category_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.purchase_id.as_i64())
        .bind(line.customer_id.as_i64())
        .bind(line.product_id.as_i64())
        .bind(line.category_id.as_i64())
        .bind(line.quantity)
        .bind(line.unit_price.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_purchase_line(
        &mut self,
        customer_id: CustomerId,
        purchase_id: PurchaseId,
    ) -> Result<Option<PurchaseLineView>> {
        sqlx::query(&format!(
            "{LINE_VIEW_SELECT} WHERE pl.customer_id = $1 AND pl.purchase_id = $2"
        ))
        .bind(customer_id.as_i64())
        .bind(purchase_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_line_view)
        .transpose()
    }

    async fn delete_purchase_line(
        &mut self,
        customer_id: CustomerId,
        purchase_id: PurchaseId,
    ) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM purchase_lines WHERE customer_id = $1 AND purchase_id = $2")
                .bind(customer_id.as_i64())
                .bind(purchase_id.as_i64())
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected())
    }

    async fn delete_purchase(
        &mut self,
        purchase_id: PurchaseId,
        customer_id: CustomerId,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM purchases WHERE id = $1 AND customer_id = $2")
            .bind(purchase_id.as_i64())
            .bind(customer_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn purchase_lines_for_customer(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<Vec<PurchaseLineView>> {
        let rows = sqlx::query(&format!(
            "{LINE_VIEW_SELECT} WHERE pl.customer_id = $1 ORDER BY pl.purchase_id ASC"
        ))
        .bind(customer_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_line_view).collect()
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
