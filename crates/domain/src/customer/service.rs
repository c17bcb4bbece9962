use common::TaxId;
use store::{CustomerRecord, Store, StoreError, StoreTx};

use super::CustomerError;
use crate::purchase::CustomerSummary;
use crate::transaction::finish;

/// Command to change a customer's tax id and name.
#[derive(Debug, Clone)]
pub struct UpdateCustomer {
    pub new_tax_id: String,
    pub name: String,
}

/// Old and new values of an updated customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerUpdate {
    pub old: CustomerSummary,
    pub new: CustomerSummary,
}

/// Service for the customer directory.
pub struct CustomerService<S: Store> {
    store: S,
}

impl<S: Store> CustomerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a new customer under a validated CPF.
    #[tracing::instrument(skip(self))]
    pub async fn register(
        &self,
        tax_id: &str,
        name: &str,
    ) -> Result<CustomerSummary, CustomerError> {
        let tax_id = parse_tax_id(tax_id)?;
        let name = validate_name(name)?;

        let mut tx = self.store.begin().await?;
        let result: Result<_, CustomerError> = async {
            if tx.find_customer(&tax_id).await?.is_some() {
                return Err(CustomerError::CustomerExists {
                    tax_id: tax_id.to_string(),
                });
            }
            let record = tx
                .insert_customer(&tax_id, name)
                .await
                .map_err(|err| exists_or_store(err, &tax_id))?;
            Ok(CustomerSummary::from(&record))
        }
        .await;
        let outcome = finish(tx, result).await;

        if outcome.is_ok() {
            tracing::info!(tax_id = %tax_id, "customer registered");
        }
        outcome
    }

    /// Lists every customer.
    pub async fn list(&self) -> Result<Vec<CustomerSummary>, CustomerError> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .list_customers()
            .await
            .map(|customers| customers.iter().map(CustomerSummary::from).collect())
            .map_err(CustomerError::from);
        finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, tax_id: &str) -> Result<CustomerSummary, CustomerError> {
        let mut tx = self.store.begin().await?;
        let result = require_customer(&mut tx, tax_id)
            .await
            .map(|record| CustomerSummary::from(&record));
        finish(tx, result).await
    }

    /// Replaces the tax id and name of a customer.
    ///
    /// Both tax ids must be valid CPFs, and at least one value has to change.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        tax_id: &str,
        update: UpdateCustomer,
    ) -> Result<CustomerUpdate, CustomerError> {
        let current = parse_tax_id(tax_id)?;
        let new_tax_id = parse_tax_id(&update.new_tax_id)?;
        let name = validate_name(&update.name)?;

        let mut tx = self.store.begin().await?;
        let result: Result<_, CustomerError> = async {
            let existing =
                tx.find_customer(&current)
                    .await?
                    .ok_or_else(|| CustomerError::CustomerNotFound {
                        tax_id: current.to_string(),
                    })?;

            if existing.tax_id == new_tax_id && existing.name == name {
                return Err(CustomerError::NoChanges);
            }
            if new_tax_id != existing.tax_id && tx.find_customer(&new_tax_id).await?.is_some() {
                return Err(CustomerError::CustomerExists {
                    tax_id: new_tax_id.to_string(),
                });
            }

            let updated = CustomerRecord {
                tax_id: new_tax_id.clone(),
                name: name.to_string(),
                ..existing.clone()
            };
            if !tx
                .update_customer(&updated)
                .await
                .map_err(|err| exists_or_store(err, &new_tax_id))?
            {
                return Err(CustomerError::CustomerNotFound {
                    tax_id: current.to_string(),
                });
            }

            Ok(CustomerUpdate {
                old: CustomerSummary::from(&existing),
                new: CustomerSummary::from(&updated),
            })
        }
        .await;
        finish(tx, result).await
    }

    /// Removes a customer that has never bought anything.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, tax_id: &str) -> Result<CustomerSummary, CustomerError> {
        let mut tx = self.store.begin().await?;
        let result: Result<_, CustomerError> = async {
            let customer = require_customer(&mut tx, tax_id).await?;
            if tx.customer_has_purchases(customer.id).await? {
                return Err(CustomerError::CustomerHasPurchases {
                    tax_id: customer.tax_id.to_string(),
                });
            }
            tx.delete_customer(customer.id).await?;
            Ok(CustomerSummary::from(&customer))
        }
        .await;
        let outcome = finish(tx, result).await;

        if let Ok(removed) = &outcome {
            tracing::info!(tax_id = %removed.tax_id, "customer removed");
        }
        outcome
    }
}

fn parse_tax_id(input: &str) -> Result<TaxId, CustomerError> {
    TaxId::parse(input).map_err(|source| CustomerError::InvalidTaxId {
        input: input.to_string(),
        source,
    })
}

fn validate_name(name: &str) -> Result<&str, CustomerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CustomerError::InvalidName);
    }
    Ok(trimmed)
}

fn exists_or_store(err: StoreError, tax_id: &TaxId) -> CustomerError {
    match err {
        StoreError::UniqueViolation { .. } => CustomerError::CustomerExists {
            tax_id: tax_id.to_string(),
        },
        other => CustomerError::Store(other),
    }
}

/// Looks a customer up by raw tax id. Input that is not a valid CPF cannot
/// match anyone and is reported as not found.
async fn require_customer<T: StoreTx>(
    tx: &mut T,
    raw: &str,
) -> Result<CustomerRecord, CustomerError> {
    let not_found = || CustomerError::CustomerNotFound {
        tax_id: raw.to_string(),
    };
    let tax_id = TaxId::parse(raw).map_err(|_| not_found())?;
    tx.find_customer(&tax_id).await?.ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, NameKey};
    use store::{InMemoryStore, NewProduct, NewPurchaseLine, StoreTxExt};

    const ANA: &str = "111.444.777-35";
    const BRUNO: &str = "529.982.247-25";

    async fn service() -> (InMemoryStore, CustomerService<InMemoryStore>) {
        let store = InMemoryStore::new();
        (store.clone(), CustomerService::new(store))
    }

    #[tokio::test]
    async fn test_register_normalizes_tax_id() {
        let (_, service) = service().await;

        let customer = service.register(ANA, "  Ana  ").await.unwrap();
        assert_eq!(customer.tax_id.as_str(), "11144477735");
        assert_eq!(customer.name, "Ana");

        let fetched = service.get("11144477735").await.unwrap();
        assert_eq!(fetched, customer);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (_, service) = service().await;

        let err = service.register("123.456.789-00", "Ana").await.unwrap_err();
        assert!(matches!(err, CustomerError::InvalidTaxId { .. }));

        let err = service.register(ANA, "   ").await.unwrap_err();
        assert!(matches!(err, CustomerError::InvalidName));

        service.register(ANA, "Ana").await.unwrap();
        let err = service.register("11144477735", "Other").await.unwrap_err();
        assert!(matches!(err, CustomerError::CustomerExists { .. }));
    }

    #[tokio::test]
    async fn test_update_paths() {
        let (_, service) = service().await;
        service.register(ANA, "Ana").await.unwrap();
        service.register(BRUNO, "Bruno").await.unwrap();

        let err = service
            .update(
                ANA,
                UpdateCustomer {
                    new_tax_id: ANA.to_string(),
                    name: "Ana".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::NoChanges));

        let err = service
            .update(
                ANA,
                UpdateCustomer {
                    new_tax_id: BRUNO.to_string(),
                    name: "Ana".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::CustomerExists { .. }));

        let changed = service
            .update(
                ANA,
                UpdateCustomer {
                    new_tax_id: ANA.to_string(),
                    name: "Ana Maria".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(changed.old.name, "Ana");
        assert_eq!(changed.new.name, "Ana Maria");
        assert_eq!(service.get(ANA).await.unwrap().name, "Ana Maria");
    }

    #[tokio::test]
    async fn test_remove_refuses_customers_with_purchases() {
        let (store, service) = service().await;
        service.register(ANA, "Ana").await.unwrap();
        service.register(BRUNO, "Bruno").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let category = tx.insert_category(&NameKey::new("grains")).await.unwrap();
        let rice = tx
            .insert_product(NewProduct {
                name: "Rice".to_string(),
                category_id: category.id,
                price: Money::from_cents(500),
                stock: 5,
            })
            .await
            .unwrap();
        let ana = tx
            .find_customer(&TaxId::parse(ANA).unwrap())
            .await
            .unwrap()
            .unwrap();
        let header = tx.insert_purchase(ana.id).await.unwrap();
        tx.insert_purchase_line(NewPurchaseLine {
            purchase_id: header.id,
            customer_id: ana.id,
            product_id: rice.id,
            category_id: category.id,
            quantity: 1,
            unit_price: rice.price,
        })
        .await
        .unwrap();
        assert!(tx.find_active_product(&rice.name_key).await.unwrap().is_some());
        tx.commit().await.unwrap();

        let err = service.remove(ANA).await.unwrap_err();
        assert!(matches!(err, CustomerError::CustomerHasPurchases { .. }));

        let removed = service.remove(BRUNO).await.unwrap();
        assert_eq!(removed.name, "Bruno");
        let err = service.get(BRUNO).await.unwrap_err();
        assert!(matches!(err, CustomerError::CustomerNotFound { .. }));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }
}
