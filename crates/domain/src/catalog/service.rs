//! Catalog service: category and product maintenance.

use std::collections::BTreeMap;

use common::{CategoryId, Money, NameKey};
use store::{CategoryRecord, ProductRecord, Store, StoreError, StoreTx, StoreTxExt};

use super::{
    CatalogError, CategoryDeleted, CategoryProducts, CategoryRenamed, NewProduct, ProductChanges,
    ProductOutcome, ProductRemoval, ProductUpdate, ProductView,
};
use crate::transaction::finish;

const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

/// Service for categories and products.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // -- Categories --

    /// Lists every category ordered by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<NameKey>, CatalogError> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .list_categories()
            .await
            .map(|categories| categories.into_iter().map(|c| c.name).collect())
            .map_err(CatalogError::from);
        finish(tx, result).await
    }

    /// Creates a category. The name is stored lower-case.
    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<NameKey, CatalogError> {
        let key = NameKey::new(name);
        if !NAME_LEN.contains(&key.char_len()) {
            return Err(CatalogError::InvalidCategory {
                reason: "name must be between 3 and 50 characters".to_string(),
            });
        }

        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            if tx.find_category(&key).await?.is_some() {
                return Err(CatalogError::CategoryExists {
                    name: key.to_string(),
                });
            }
            let record = tx
                .insert_category(&key)
                .await
                .map_err(unique_to_exists(key.as_str()))?;
            Ok(record.name)
        }
        .await;
        let outcome = finish(tx, result).await;

        if let Ok(name) = &outcome {
            tracing::info!(category = %name, "category created");
        }
        outcome
    }

    /// Renames a category. Its products follow, since they reference the
    /// category by id.
    #[tracing::instrument(skip(self))]
    pub async fn rename_category(
        &self,
        name: &str,
        new_name: &str,
    ) -> Result<CategoryRenamed, CatalogError> {
        let new_key = NameKey::new(new_name);
        if new_key.is_empty() {
            return Err(CatalogError::InvalidCategory {
                reason: "new category name is required".to_string(),
            });
        }
        let key = NameKey::new(name);

        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let category = require_category(&mut tx, &key).await?;
            if tx.find_category(&new_key).await?.is_some() {
                return Err(CatalogError::CategoryExists {
                    name: new_key.to_string(),
                });
            }
            if !tx
                .rename_category(category.id, &new_key)
                .await
                .map_err(unique_to_exists(new_key.as_str()))?
            {
                return Err(CatalogError::CategoryNotFound {
                    name: key.to_string(),
                });
            }
            Ok(CategoryRenamed {
                old_name: category.name,
                new_name: new_key.clone(),
            })
        }
        .await;
        finish(tx, result).await
    }

    /// Deletes a category together with all of its products.
    ///
    /// Refused when any of those products has recorded purchases.
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, name: &str) -> Result<CategoryDeleted, CatalogError> {
        let key = NameKey::new(name);

        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let category = require_category(&mut tx, &key).await?;
            if tx.category_has_purchases(category.id).await? {
                return Err(CatalogError::CategoryInUse {
                    name: category.name.to_string(),
                });
            }
            let products_removed = tx.delete_products_in_category(category.id).await?;
            tx.delete_category(category.id).await?;
            Ok(CategoryDeleted {
                name: category.name,
                products_removed,
            })
        }
        .await;
        let outcome = finish(tx, result).await;

        if let Ok(deleted) = &outcome {
            tracing::info!(
                category = %deleted.name,
                products_removed = deleted.products_removed,
                "category deleted"
            );
        }
        outcome
    }

    /// Lists the active products of one category.
    #[tracing::instrument(skip(self))]
    pub async fn products_in_category(&self, name: &str) -> Result<CategoryProducts, CatalogError> {
        let key = NameKey::new(name);

        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let category = require_category(&mut tx, &key).await?;
            let products = tx.list_active_products_in_category(category.id).await?;
            if products.is_empty() {
                return Err(CatalogError::NoActiveProducts {
                    name: category.name.to_string(),
                });
            }
            Ok(CategoryProducts {
                products: products
                    .iter()
                    .map(|p| ProductView::new(p, category.name.clone()))
                    .collect(),
                category: category.name,
            })
        }
        .await;
        finish(tx, result).await
    }

    // -- Products --

    /// Lists active products grouped by category. Every category is listed,
    /// including those without active products.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<CategoryProducts>, CatalogError> {
        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let categories = tx.list_categories().await?;
            let products = tx.list_active_products().await?;

            let mut grouped: BTreeMap<CategoryId, Vec<&ProductRecord>> = BTreeMap::new();
            for product in &products {
                grouped.entry(product.category_id).or_default().push(product);
            }

            Ok(categories
                .into_iter()
                .map(|category| CategoryProducts {
                    products: grouped
                        .get(&category.id)
                        .map(|ps| {
                            ps.iter()
                                .map(|p| ProductView::new(p, category.name.clone()))
                                .collect()
                        })
                        .unwrap_or_default(),
                    category: category.name,
                })
                .collect())
        }
        .await;
        finish(tx, result).await
    }

    /// Finds an active product by name, ignoring case.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, name: &str) -> Result<ProductView, CatalogError> {
        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let product = require_active_product(&mut tx, name).await?;
            view_of(&mut tx, &product).await
        }
        .await;
        finish(tx, result).await
    }

    /// Creates a product, or reactivates a deactivated one with the same
    /// name using the new category, price, and quantity.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductOutcome, CatalogError> {
        let name = validate_product_name(&input.name)?;
        let category_key = validate_category_name(&input.category)?;
        validate_price(input.price)?;
        validate_quantity(input.quantity)?;

        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let category = tx.find_category(&category_key).await?.ok_or_else(|| {
                CatalogError::CategoryNotFound {
                    name: category_key.to_string(),
                }
            })?;

            match tx.find_product(&NameKey::new(&name)).await? {
                Some(existing) if existing.active => Err(CatalogError::ProductExists {
                    name: existing.name,
                }),
                Some(existing) => {
                    let revived = ProductRecord {
                        name: name.clone(),
                        category_id: category.id,
                        price: input.price,
                        stock: input.quantity,
                        active: true,
                        ..existing
                    };
                    tx.update_product(&revived)
                        .await
                        .map_err(unique_to_exists(name.as_str()))?;
                    Ok(ProductOutcome::Reactivated(ProductView::new(
                        &revived,
                        category.name,
                    )))
                }
                None => {
                    let record = tx
                        .insert_product(store::NewProduct {
                            name: name.clone(),
                            category_id: category.id,
                            price: input.price,
                            stock: input.quantity,
                        })
                        .await
                        .map_err(unique_to_exists(name.as_str()))?;
                    Ok(ProductOutcome::Created(ProductView::new(
                        &record,
                        category.name,
                    )))
                }
            }
        }
        .await;
        let outcome = finish(tx, result).await;

        match &outcome {
            Ok(ProductOutcome::Created(view)) => {
                tracing::info!(product = %view.name, category = %view.category, "product created")
            }
            Ok(ProductOutcome::Reactivated(view)) => {
                tracing::info!(product = %view.name, "product reactivated")
            }
            Err(_) => {}
        }
        outcome
    }

    /// Applies a partial update to an active product.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update_product(
        &self,
        name: &str,
        changes: ProductChanges,
    ) -> Result<ProductUpdate, CatalogError> {
        if changes.is_empty() {
            return Err(CatalogError::InvalidProduct {
                reason: "at least one field must be provided".to_string(),
            });
        }
        let new_name = changes
            .name
            .as_deref()
            .map(validate_product_name)
            .transpose()?;
        let new_category = changes
            .category
            .as_deref()
            .map(validate_category_name)
            .transpose()?;
        if let Some(price) = changes.price {
            validate_price(price)?;
        }
        if let Some(quantity) = changes.quantity {
            validate_quantity(quantity)?;
        }

        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let product = require_active_product(&mut tx, name).await?;
            let before = view_of(&mut tx, &product).await?;

            let mut updated = product.clone();
            if let Some(new_name) = new_name {
                let key = NameKey::new(&new_name);
                let taken = tx
                    .find_product(&key)
                    .await?
                    .is_some_and(|other| other.id != product.id);
                if taken {
                    return Err(CatalogError::ProductExists { name: new_name });
                }
                updated.name = new_name;
                updated.name_key = key;
            }
            let mut category_name = before.category.clone();
            if let Some(key) = new_category {
                let category = tx.find_category(&key).await?.ok_or_else(|| {
                    CatalogError::CategoryNotFound {
                        name: key.to_string(),
                    }
                })?;
                updated.category_id = category.id;
                category_name = category.name;
            }
            if let Some(price) = changes.price {
                updated.price = price;
            }
            if let Some(quantity) = changes.quantity {
                updated.stock = quantity;
            }

            if !tx
                .update_product(&updated)
                .await
                .map_err(unique_to_exists(updated.name.as_str()))?
            {
                return Err(CatalogError::ProductNotFound {
                    name: name.to_string(),
                });
            }

            Ok(ProductUpdate {
                before,
                after: ProductView::new(&updated, category_name),
            })
        }
        .await;
        finish(tx, result).await
    }

    /// Removes an active product. Products referenced by purchases are
    /// deactivated instead, so purchase history keeps resolving them.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, name: &str) -> Result<ProductRemoval, CatalogError> {
        let mut tx = self.store.begin().await?;
        let result: Result<_, CatalogError> = async {
            let product = require_active_product(&mut tx, name).await?;
            let view = view_of(&mut tx, &product).await?;

            if tx.product_has_purchases(product.id).await? {
                let hidden = ProductRecord {
                    active: false,
                    ..product
                };
                tx.update_product(&hidden).await?;
                Ok(ProductRemoval::Deactivated(view))
            } else {
                tx.delete_product(product.id).await?;
                Ok(ProductRemoval::Deleted(view))
            }
        }
        .await;
        let outcome = finish(tx, result).await;

        if let Ok(removal) = &outcome {
            tracing::info!(
                product = %removal.product().name,
                deactivated = matches!(removal, ProductRemoval::Deactivated(_)),
                "product removed"
            );
        }
        outcome
    }
}

async fn require_category<T: StoreTx>(
    tx: &mut T,
    key: &NameKey,
) -> Result<CategoryRecord, CatalogError> {
    tx.find_category(key)
        .await?
        .ok_or_else(|| CatalogError::CategoryNotFound {
            name: key.to_string(),
        })
}

async fn require_active_product<T: StoreTx>(
    tx: &mut T,
    name: &str,
) -> Result<ProductRecord, CatalogError> {
    tx.find_active_product(&NameKey::new(name))
        .await?
        .ok_or_else(|| CatalogError::ProductNotFound {
            name: name.trim().to_string(),
        })
}

async fn view_of<T: StoreTx>(
    tx: &mut T,
    product: &ProductRecord,
) -> Result<ProductView, CatalogError> {
    let category = tx.category_name_of(product.category_id).await?.ok_or_else(|| {
        StoreError::Integrity(format!(
            "product {} references missing category {}",
            product.id, product.category_id
        ))
    })?;
    Ok(ProductView::new(product, category))
}

/// Maps a unique-constraint violation on `name` to the matching `*Exists`
/// error.
fn unique_to_exists(name: &str) -> impl FnOnce(StoreError) -> CatalogError + '_ {
    move |err| match err {
        StoreError::UniqueViolation { constraint } if constraint == "uq_categories_name" => {
            CatalogError::CategoryExists {
                name: name.to_string(),
            }
        }
        StoreError::UniqueViolation { constraint } if constraint == "uq_products_name_key" => {
            CatalogError::ProductExists {
                name: name.to_string(),
            }
        }
        other => CatalogError::Store(other),
    }
}

fn validate_product_name(name: &str) -> Result<String, CatalogError> {
    let trimmed = name.trim();
    if !NAME_LEN.contains(&trimmed.chars().count()) {
        return Err(CatalogError::InvalidProduct {
            reason: "name must be between 3 and 50 characters".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_category_name(name: &str) -> Result<NameKey, CatalogError> {
    let key = NameKey::new(name);
    if !NAME_LEN.contains(&key.char_len()) {
        return Err(CatalogError::InvalidProduct {
            reason: "category must be between 3 and 50 characters".to_string(),
        });
    }
    Ok(key)
}

fn validate_price(price: Money) -> Result<(), CatalogError> {
    if price.is_negative() {
        return Err(CatalogError::InvalidProduct {
            reason: "price must not be negative".to_string(),
        });
    }
    Ok(())
}

fn validate_quantity(quantity: i64) -> Result<(), CatalogError> {
    if quantity < 0 {
        return Err(CatalogError::InvalidProduct {
            reason: "quantity must not be negative".to_string(),
        });
    }
    Ok(())
}
