//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and truncate
//! every table before each test, so they run serially.
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{Money, NameKey, TaxId};
use serial_test::serial;
use sqlx::PgPool;
use store::{NewProduct, NewPurchaseLine, PostgresStore, Store, StoreError, StoreTx, StoreTxExt};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let store = PostgresStore::connect(&connection_string, 1).await.unwrap();
            store.run_migrations().await.unwrap();
            store.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    truncate(&pool).await;
    PostgresStore::new(pool)
}

async fn truncate(pool: &PgPool) {
    sqlx::query(
        "TRUNCATE TABLE purchase_lines, purchases, customers, products, categories RESTART IDENTITY",
    )
    .execute(pool)
    .await
    .unwrap();
}

fn tax_id() -> TaxId {
    TaxId::parse("111.444.777-35").unwrap()
}

async fn seed_rice(store: &PostgresStore, stock: i64) {
    let mut tx = store.begin().await.unwrap();
    let grains = tx.insert_category(&NameKey::new("Grains")).await.unwrap();
    tx.insert_product(NewProduct {
        name: "Rice".to_string(),
        category_id: grains.id,
        price: Money::from_cents(500),
        stock,
    })
    .await
    .unwrap();
    tx.insert_customer(&tax_id(), "Ana").await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
#[serial]
async fn insert_and_find_product_case_insensitively() {
    let store = get_test_store().await;
    seed_rice(&store, 10).await;

    let mut tx = store.begin().await.unwrap();
    let rice = tx
        .find_active_product(&NameKey::new("RICE"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rice.name, "Rice");
    assert_eq!(rice.stock, 10);
    assert_eq!(rice.price, Money::from_cents(500));

    let category = tx.category_name_of(rice.category_id).await.unwrap();
    assert_eq!(category.unwrap().as_str(), "grains");
}

#[tokio::test]
#[serial]
async fn guarded_decrement_never_goes_negative() {
    let store = get_test_store().await;
    seed_rice(&store, 3).await;

    let mut tx = store.begin().await.unwrap();
    let rice = tx.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    assert!(tx.decrement_stock(rice.id, 2).await.unwrap());
    assert!(!tx.decrement_stock(rice.id, 2).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let rice = tx.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    assert_eq!(rice.stock, 1);
}

#[tokio::test]
#[serial]
async fn overlapping_decrements_cannot_oversell() {
    let store = get_test_store().await;
    seed_rice(&store, 3).await;

    let mut first = store.begin().await.unwrap();
    let mut second = store.begin().await.unwrap();

    let rice = first.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    // Both transactions see 3 units before either writes.
    let seen = second.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    assert_eq!(seen.stock, 3);

    assert!(first.decrement_stock(rice.id, 2).await.unwrap());

    // Blocks on the row lock held by `first` until it commits.
    let contender = tokio::spawn(async move {
        let decremented = second.decrement_stock(rice.id, 2).await.unwrap();
        second.commit().await.unwrap();
        decremented
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    first.commit().await.unwrap();

    assert!(!contender.await.unwrap());

    let mut tx = store.begin().await.unwrap();
    let rice = tx.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    assert_eq!(rice.stock, 1);
}

#[tokio::test]
#[serial]
async fn rollback_discards_purchase_rows_and_decrements() {
    let store = get_test_store().await;
    seed_rice(&store, 10).await;

    let mut tx = store.begin().await.unwrap();
    let customer = tx.find_customer(&tax_id()).await.unwrap().unwrap();
    let rice = tx.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    let header = tx.insert_purchase(customer.id).await.unwrap();
    tx.insert_purchase_line(NewPurchaseLine {
        purchase_id: header.id,
        customer_id: customer.id,
        product_id: rice.id,
        category_id: rice.category_id,
        quantity: 4,
        unit_price: rice.price,
    })
    .await
    .unwrap();
    assert!(tx.decrement_stock(rice.id, 4).await.unwrap());
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let rice = tx.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    assert_eq!(rice.stock, 10);
    assert!(
        tx.purchase_lines_for_customer(customer.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn purchase_line_round_trip_and_delete() {
    let store = get_test_store().await;
    seed_rice(&store, 10).await;

    let mut tx = store.begin().await.unwrap();
    let customer = tx.find_customer(&tax_id()).await.unwrap().unwrap();
    let rice = tx.find_product(&NameKey::new("rice")).await.unwrap().unwrap();
    let header = tx.insert_purchase(customer.id).await.unwrap();
    tx.insert_purchase_line(NewPurchaseLine {
        purchase_id: header.id,
        customer_id: customer.id,
        product_id: rice.id,
        category_id: rice.category_id,
        quantity: 2,
        unit_price: rice.price,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let line = tx
        .find_purchase_line(customer.id, header.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.product_name, "Rice");
    assert_eq!(line.category.as_str(), "grains");
    assert_eq!(line.quantity, 2);
    assert!(tx.customer_has_purchases(customer.id).await.unwrap());
    assert!(tx.product_has_purchases(rice.id).await.unwrap());

    assert_eq!(tx.delete_purchase_line(customer.id, header.id).await.unwrap(), 1);
    assert_eq!(tx.delete_purchase(header.id, customer.id).await.unwrap(), 1);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(
        tx.find_purchase_line(customer.id, header.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[serial]
async fn duplicate_category_maps_to_unique_violation() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_category(&NameKey::new("dairy")).await.unwrap();
    let err = tx
        .insert_category(&NameKey::new("Dairy"))
        .await
        .unwrap_err();

    match err {
        StoreError::UniqueViolation { constraint } => {
            assert_eq!(constraint, "uq_categories_name")
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
}
