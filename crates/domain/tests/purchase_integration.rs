//! Integration tests for the purchase workflow.
//!
//! These tests drive the catalog, customer, and purchase services together
//! over one in-memory store and check both the returned receipts and the
//! committed storage state.

use common::{Money, PurchaseId};
use domain::{
    CancelPurchase, CatalogService, Checkout, CustomerService, DomainError, LineRequest,
    NewProduct, PurchaseError, PurchaseService,
};
use store::InMemoryStore;

const ANA: &str = "111.444.777-35";
const BRUNO: &str = "529.982.247-25";

struct Fixture {
    store: InMemoryStore,
    purchases: PurchaseService<InMemoryStore>,
    catalog: CatalogService<InMemoryStore>,
}

/// Rice costs 5.00 with 10 units, Beans 8.00 with none left.
async fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store.clone());
    let customers = CustomerService::new(store.clone());

    catalog.create_category("Grains").await.unwrap();
    for (name, cents, quantity) in [("Rice", 500, 10), ("Beans", 800, 0)] {
        catalog
            .create_product(NewProduct {
                name: name.to_string(),
                category: "grains".to_string(),
                price: Money::from_cents(cents),
                quantity,
            })
            .await
            .unwrap();
    }
    customers.register(ANA, "Ana").await.unwrap();
    customers.register(BRUNO, "Bruno").await.unwrap();

    Fixture {
        purchases: PurchaseService::new(store.clone()),
        catalog,
        store,
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn total_is_sum_of_subtotals() {
        let f = fixture().await;

        let receipt = f
            .purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 2)]))
            .await
            .unwrap();

        assert_eq!(receipt.total.to_decimal_string(), "10.00");
        let sum: Money = receipt.lines.iter().map(|l| l.subtotal).sum();
        assert_eq!(sum, receipt.total);
        assert_eq!(f.store.product_stock("Rice").await, Some(8));
        assert_eq!(f.store.purchase_count().await, 1);
        assert_eq!(f.store.purchase_line_count().await, 1);
    }

    #[tokio::test]
    async fn one_header_per_line() {
        let f = fixture().await;
        f.catalog
            .create_product(NewProduct {
                name: "Oats".to_string(),
                category: "grains".to_string(),
                price: Money::from_cents(325),
                quantity: 3,
            })
            .await
            .unwrap();

        let receipt = f
            .purchases
            .checkout(Checkout::new(
                ANA,
                vec![LineRequest::new("rice", 1), LineRequest::new("OATS", 3)],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.lines.len(), 2);
        assert_ne!(receipt.lines[0].purchase_id, receipt.lines[1].purchase_id);
        assert_eq!(receipt.total, Money::from_cents(500 + 975));
        assert_eq!(f.store.purchase_count().await, 2);
        assert_eq!(f.store.product_stock("oats").await, Some(0));
    }

    #[tokio::test]
    async fn failing_line_leaves_no_trace() {
        let f = fixture().await;

        let err = f
            .purchases
            .checkout(Checkout::new(
                ANA,
                vec![LineRequest::new("Rice", 2), LineRequest::new("Beans", 1)],
            ))
            .await
            .unwrap_err();

        match err {
            PurchaseError::InsufficientStock {
                name,
                requested,
                available,
            } => {
                assert_eq!(name, "Beans");
                assert_eq!(requested, 1);
                assert_eq!(available, 0);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        assert_eq!(f.store.product_stock("Rice").await, Some(10));
        assert_eq!(f.store.purchase_count().await, 0);
        assert_eq!(f.store.purchase_line_count().await, 0);
    }

    #[tokio::test]
    async fn storage_fault_rolls_back() {
        let f = fixture().await;
        f.store.set_fail_stock_updates(true);

        let err = f
            .purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::TransactionFailure(_)));
        assert_eq!(f.store.purchase_count().await, 0);

        f.store.set_fail_stock_updates(false);
        f.purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 2)]))
            .await
            .unwrap();
        assert_eq!(f.store.product_stock("Rice").await, Some(8));
    }

    #[tokio::test]
    async fn deactivated_product_cannot_be_bought() {
        let f = fixture().await;
        f.purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap();
        f.catalog.delete_product("Rice").await.unwrap();

        let err = f
            .purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn errors_lift_into_domain_error() {
        let f = fixture().await;
        let err: DomainError = f
            .purchases
            .checkout(Checkout::new(ANA, vec![]))
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DomainError::Purchase(PurchaseError::EmptyOrder)));
        assert_eq!(err.to_string(), "Order has no items");
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn removes_exactly_one_purchase_and_keeps_stock() {
        let f = fixture().await;
        let first = f
            .purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 2)]))
            .await
            .unwrap();
        f.purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap();

        let cancelled = f
            .purchases
            .cancel(CancelPurchase::new(ANA, first.lines[0].purchase_id))
            .await
            .unwrap();

        assert_eq!(cancelled.customer.name, "Ana");
        assert_eq!(cancelled.line.quantity, 2);
        assert_eq!(cancelled.line.subtotal, Money::from_cents(1000));
        assert_eq!(f.store.purchase_count().await, 1);
        assert_eq!(f.store.purchase_line_count().await, 1);
        assert_eq!(f.store.product_stock("Rice").await, Some(7));
    }

    #[tokio::test]
    async fn unknown_purchase_is_not_found() {
        let f = fixture().await;
        f.purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap();

        let err = f
            .purchases
            .cancel(CancelPurchase::new(ANA, PurchaseId::new(999)))
            .await
            .unwrap_err();

        assert!(matches!(err, PurchaseError::PurchaseNotFound { .. }));
        assert_eq!(f.store.purchase_count().await, 1);
    }

    #[tokio::test]
    async fn another_customers_purchase_is_not_found() {
        let f = fixture().await;
        let receipt = f
            .purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap();

        let err = f
            .purchases
            .cancel(CancelPurchase::new(BRUNO, receipt.lines[0].purchase_id))
            .await
            .unwrap_err();

        assert!(matches!(err, PurchaseError::PurchaseNotFound { .. }));
        assert_eq!(f.store.purchase_count().await, 1);
    }
}

mod history {
    use super::*;

    #[tokio::test]
    async fn keeps_price_paid_after_price_change() {
        let f = fixture().await;
        f.purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 2)]))
            .await
            .unwrap();
        f.catalog
            .update_product(
                "Rice",
                domain::ProductChanges {
                    price: Some(Money::from_cents(900)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let history = f.purchases.history(ANA).await.unwrap();
        assert_eq!(history.lines.len(), 1);
        assert_eq!(history.lines[0].receipt.unit_price, Money::from_cents(500));
        assert_eq!(history.total_spent, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn all_histories_include_idle_customers() {
        let f = fixture().await;
        f.purchases
            .checkout(Checkout::new(ANA, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap();

        let all = f.purchases.all_histories().await.unwrap();
        assert_eq!(all.len(), 2);
        let bruno = all
            .iter()
            .find(|h| h.customer.name == "Bruno")
            .expect("bruno listed");
        assert!(bruno.lines.is_empty());
        assert!(bruno.total_spent.is_zero());
    }

    #[tokio::test]
    async fn unknown_customer() {
        let f = fixture().await;
        let err = f.purchases.history("000.000.001-91").await.unwrap_err();
        assert!(matches!(err, PurchaseError::CustomerNotFound { .. }));
    }
}
