//! Purchase service: the checkout and cancellation transactions.

use std::time::Instant;

use common::{Money, NameKey, TaxId};
use store::{CustomerRecord, NewPurchaseLine, Store, StoreError, StoreTx, StoreTxExt};

use super::{
    CancelPurchase, CancelledPurchase, Checkout, CheckoutReceipt, CustomerSummary, LineReceipt,
    LineRequest, PurchaseError, PurchaseHistory, RequestedQuantity,
};
use crate::transaction::finish;

/// Service for buying products and managing recorded purchases.
///
/// Each line of a checkout becomes its own purchase header plus line row.
/// All lines of one checkout commit together or not at all.
pub struct PurchaseService<S: Store> {
    store: S,
}

impl<S: Store> PurchaseService<S> {
    /// Creates a new purchase service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Buys every requested line for the customer.
    ///
    /// Lines are validated and written one at a time, in request order,
    /// inside a single transaction. Stock is checked against what the
    /// transaction sees when the line is processed, so a product repeated in
    /// the same checkout is checked against the already-decremented stock.
    /// Any failure rolls back every line.
    #[tracing::instrument(skip(self, cmd), fields(lines = cmd.lines.len()))]
    pub async fn checkout(&self, cmd: Checkout) -> Result<CheckoutReceipt, PurchaseError> {
        metrics::counter!("checkouts_total").increment(1);
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        let result = run_checkout(&mut tx, &cmd).await;
        let outcome = finish(tx, result).await;

        match &outcome {
            Ok(receipt) => {
                metrics::histogram!("checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    purchases = receipt.lines.len(),
                    total = %receipt.total,
                    "checkout committed"
                );
            }
            Err(err) => {
                metrics::counter!("checkouts_failed").increment(1);
                tracing::info!(error = %err, "checkout rolled back");
            }
        }

        outcome
    }

    /// Removes one purchase header and its line.
    ///
    /// The purchased units are **not** returned to stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, cmd: CancelPurchase) -> Result<CancelledPurchase, PurchaseError> {
        let mut tx = self.store.begin().await?;
        let result = run_cancel(&mut tx, &cmd).await;
        let outcome = finish(tx, result).await;

        if outcome.is_ok() {
            metrics::counter!("purchases_cancelled").increment(1);
            tracing::info!(purchase_id = %cmd.purchase_id, "purchase cancelled");
        }

        outcome
    }

    /// Loads every recorded line of one customer.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, tax_id: &str) -> Result<PurchaseHistory, PurchaseError> {
        let mut tx = self.store.begin().await?;
        let result: Result<_, PurchaseError> = async {
            let customer = resolve_customer(&mut tx, tax_id).await?;
            let views = tx.purchase_lines_for_customer(customer.id).await?;
            Ok(PurchaseHistory::new(&customer, &views))
        }
        .await;
        finish(tx, result).await
    }

    /// Loads the history of every customer, including customers who never
    /// bought anything.
    #[tracing::instrument(skip(self))]
    pub async fn all_histories(&self) -> Result<Vec<PurchaseHistory>, PurchaseError> {
        let mut tx = self.store.begin().await?;
        let result: Result<_, PurchaseError> = async {
            let customers = tx.list_customers().await?;
            let mut histories = Vec::with_capacity(customers.len());
            for customer in &customers {
                let views = tx.purchase_lines_for_customer(customer.id).await?;
                histories.push(PurchaseHistory::new(customer, &views));
            }
            Ok(histories)
        }
        .await;
        finish(tx, result).await
    }
}

async fn resolve_customer<T: StoreTx>(
    tx: &mut T,
    raw_tax_id: &str,
) -> Result<CustomerRecord, PurchaseError> {
    let not_found = || PurchaseError::CustomerNotFound {
        tax_id: raw_tax_id.to_string(),
    };
    let tax_id = TaxId::parse(raw_tax_id).map_err(|_| not_found())?;
    tx.find_customer(&tax_id).await?.ok_or_else(not_found)
}

async fn run_checkout<T: StoreTx>(
    tx: &mut T,
    cmd: &Checkout,
) -> Result<CheckoutReceipt, PurchaseError> {
    let customer = resolve_customer(tx, &cmd.tax_id).await?;

    if cmd.lines.is_empty() {
        return Err(PurchaseError::EmptyOrder);
    }

    let mut total = Money::zero();
    let mut lines = Vec::with_capacity(cmd.lines.len());
    for (index, request) in cmd.lines.iter().enumerate() {
        let receipt = purchase_line(tx, &customer, index + 1, request).await?;
        total += receipt.subtotal;
        lines.push(receipt);
    }

    Ok(CheckoutReceipt {
        customer: CustomerSummary::from(&customer),
        total,
        lines,
    })
}

async fn purchase_line<T: StoreTx>(
    tx: &mut T,
    customer: &CustomerRecord,
    line: usize,
    request: &LineRequest,
) -> Result<LineReceipt, PurchaseError> {
    let name = request.product_name.trim();
    if name.is_empty() {
        return Err(PurchaseError::InvalidLineItem {
            line,
            reason: "product name is required".to_string(),
        });
    }
    let quantity = match &request.quantity {
        RequestedQuantity::Units(quantity) if *quantity > 0 => *quantity,
        RequestedQuantity::Units(quantity) => {
            return Err(PurchaseError::InvalidLineItem {
                line,
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }
        RequestedQuantity::Malformed(raw) => {
            return Err(PurchaseError::InvalidLineItem {
                line,
                reason: format!("quantity must be a whole number, got {raw}"),
            });
        }
    };

    let product = tx
        .find_active_product(&NameKey::new(name))
        .await?
        .ok_or_else(|| PurchaseError::ProductNotFound {
            name: name.to_string(),
        })?;

    let insufficient = || PurchaseError::InsufficientStock {
        name: product.name.clone(),
        requested: quantity,
        available: product.stock,
    };
    if quantity > product.stock {
        return Err(insufficient());
    }

    let subtotal =
        product
            .price
            .checked_multiply(quantity)
            .ok_or_else(|| PurchaseError::InvalidLineItem {
                line,
                reason: "subtotal overflows".to_string(),
            })?;

    let category = tx
        .category_name_of(product.category_id)
        .await?
        .ok_or_else(|| {
            StoreError::Integrity(format!(
                "product {} references missing category {}",
                product.id, product.category_id
            ))
        })?;

    let header = tx.insert_purchase(customer.id).await?;
    tx.insert_purchase_line(NewPurchaseLine {
        purchase_id: header.id,
        customer_id: customer.id,
        product_id: product.id,
        category_id: product.category_id,
        quantity,
        unit_price: product.price,
    })
    .await?;

    if !tx.decrement_stock(product.id, quantity).await? {
        return Err(insufficient());
    }

    tracing::debug!(
        purchase_id = %header.id,
        product = %product.name,
        quantity,
        "line recorded"
    );

    Ok(LineReceipt {
        purchase_id: header.id,
        product_name: product.name.clone(),
        category,
        quantity,
        unit_price: product.price,
        subtotal,
    })
}

async fn run_cancel<T: StoreTx>(
    tx: &mut T,
    cmd: &CancelPurchase,
) -> Result<CancelledPurchase, PurchaseError> {
    let customer = resolve_customer(tx, &cmd.tax_id).await?;
    let not_found = || PurchaseError::PurchaseNotFound {
        purchase_id: cmd.purchase_id,
        tax_id: cmd.tax_id.clone(),
    };

    let line = tx
        .find_purchase_line(customer.id, cmd.purchase_id)
        .await?
        .ok_or_else(not_found)?;

    if tx.delete_purchase_line(customer.id, cmd.purchase_id).await? == 0 {
        return Err(not_found());
    }
    if tx.delete_purchase(cmd.purchase_id, customer.id).await? == 0 {
        return Err(not_found());
    }

    Ok(CancelledPurchase {
        customer: CustomerSummary::from(&customer),
        line: LineReceipt::from(&line),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PurchaseId;
    use store::{InMemoryStore, NewProduct};

    const TAX_ID: &str = "111.444.777-35";

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let grains = tx.insert_category(&NameKey::new("grains")).await.unwrap();
        for (name, cents, stock) in [("Rice", 500, 10), ("Beans", 800, 0), ("Lentils", 650, 4)] {
            tx.insert_product(NewProduct {
                name: name.to_string(),
                category_id: grains.id,
                price: Money::from_cents(cents),
                stock,
            })
            .await
            .unwrap();
        }
        tx.insert_customer(&TaxId::parse(TAX_ID).unwrap(), "Ana")
            .await
            .unwrap();
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_checkout_single_line() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());

        let receipt = service
            .checkout(Checkout::new(TAX_ID, vec![LineRequest::new("Rice", 2)]))
            .await
            .unwrap();

        assert_eq!(receipt.total, Money::from_cents(1000));
        assert_eq!(receipt.total.to_decimal_string(), "10.00");
        assert_eq!(receipt.customer.name, "Ana");
        assert_eq!(receipt.lines.len(), 1);
        assert_eq!(receipt.lines[0].category.as_str(), "grains");
        assert_eq!(store.product_stock("rice").await, Some(8));
        assert_eq!(store.purchase_count().await, 1);
        assert_eq!(store.purchase_line_count().await, 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_earlier_lines() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());

        let err = service
            .checkout(Checkout::new(
                TAX_ID,
                vec![LineRequest::new("Rice", 2), LineRequest::new("Beans", 1)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PurchaseError::InsufficientStock { ref name, requested: 1, available: 0 } if name == "Beans"
        ));
        assert_eq!(store.product_stock("rice").await, Some(10));
        assert_eq!(store.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn test_repeated_product_sees_earlier_decrement() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());

        let err = service
            .checkout(Checkout::new(
                TAX_ID,
                vec![LineRequest::new("lentils", 3), LineRequest::new("LENTILS", 2)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PurchaseError::InsufficientStock { available: 1, .. }
        ));
        assert_eq!(store.product_stock("lentils").await, Some(4));
    }

    #[tokio::test]
    async fn test_validation_order() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());

        // Unknown customer wins over an empty order.
        let err = service
            .checkout(Checkout::new("529.982.247-25", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::CustomerNotFound { .. }));

        let err = service
            .checkout(Checkout::new(TAX_ID, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::EmptyOrder));

        let err = service
            .checkout(Checkout::new(
                TAX_ID,
                vec![LineRequest::new("Rice", 1), LineRequest::new("", 1)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::InvalidLineItem { line: 2, .. }));

        let err = service
            .checkout(Checkout::new(TAX_ID, vec![LineRequest::new("Rice", 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::InvalidLineItem { line: 1, .. }));

        let err = service
            .checkout(Checkout::new(TAX_ID, vec![LineRequest::new("Caviar", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::ProductNotFound { ref name } if name == "Caviar"));

        assert_eq!(store.purchase_count().await, 0);
        assert_eq!(store.product_stock("rice").await, Some(10));
    }

    #[tokio::test]
    async fn test_malformed_quantity_is_invalid_line_after_customer_check() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());

        let err = service
            .checkout(Checkout::new(
                "529.982.247-25",
                vec![LineRequest::malformed("Rice", "x")],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::CustomerNotFound { .. }));

        let err = service
            .checkout(Checkout::new(
                TAX_ID,
                vec![LineRequest::new("Rice", 1), LineRequest::malformed("Lentils", "1.5")],
            ))
            .await
            .unwrap_err();
        match err {
            PurchaseError::InvalidLineItem { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("1.5"));
            }
            other => panic!("expected InvalidLineItem, got {other:?}"),
        }
        assert_eq!(store.product_stock("rice").await, Some(10));
        assert_eq!(store.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_tax_id_is_customer_not_found() {
        let service = PurchaseService::new(seeded_store().await);

        let err = service
            .checkout(Checkout::new("not-a-cpf", vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::CustomerNotFound { ref tax_id } if tax_id == "not-a-cpf"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_transaction_failure() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());
        store.set_fail_stock_updates(true);

        let err = service
            .checkout(Checkout::new(TAX_ID, vec![LineRequest::new("Rice", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PurchaseError::TransactionFailure(_)));
        assert_eq!(store.purchase_count().await, 0);
        assert_eq!(store.product_stock("rice").await, Some(10));
    }

    #[tokio::test]
    async fn test_cancel_removes_only_that_purchase() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());
        let receipt = service
            .checkout(Checkout::new(
                TAX_ID,
                vec![LineRequest::new("Rice", 2), LineRequest::new("Lentils", 1)],
            ))
            .await
            .unwrap();
        let rice_purchase = receipt.lines[0].purchase_id;

        let cancelled = service
            .cancel(CancelPurchase::new(TAX_ID, rice_purchase))
            .await
            .unwrap();

        assert_eq!(cancelled.line.product_name, "Rice");
        assert_eq!(cancelled.line.unit_price, Money::from_cents(500));
        assert_eq!(store.purchase_count().await, 1);
        assert_eq!(store.purchase_line_count().await, 1);
        // Stock stays decremented.
        assert_eq!(store.product_stock("rice").await, Some(8));
        assert_eq!(store.product_stock("lentils").await, Some(3));
    }

    #[tokio::test]
    async fn test_cancel_unknown_purchase() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());

        let err = service
            .cancel(CancelPurchase::new(TAX_ID, PurchaseId::new(404)))
            .await
            .unwrap_err();

        assert!(matches!(err, PurchaseError::PurchaseNotFound { .. }));
        assert_eq!(store.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn test_history_totals_recorded_prices() {
        let store = seeded_store().await;
        let service = PurchaseService::new(store.clone());
        service
            .checkout(Checkout::new(
                TAX_ID,
                vec![LineRequest::new("Rice", 2), LineRequest::new("Lentils", 2)],
            ))
            .await
            .unwrap();

        let history = service.history("11144477735").await.unwrap();
        assert_eq!(history.lines.len(), 2);
        assert_eq!(history.total_spent, Money::from_cents(1000 + 1300));

        let all = service.all_histories().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], history);
    }
}
