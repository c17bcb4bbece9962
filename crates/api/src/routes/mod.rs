//! HTTP handlers grouped by resource.

pub mod categories;
pub mod customers;
pub mod health;
pub mod metrics;
pub mod products;
pub mod purchases;

use domain::{CatalogService, CustomerService, PurchaseService};
use store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub purchases: PurchaseService<S>,
    pub catalog: CatalogService<S>,
    pub customers: CustomerService<S>,
    pub store: S,
}
