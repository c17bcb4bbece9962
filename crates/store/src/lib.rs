//! Storage layer: the transaction boundary and the collaborator operations
//! (customer directory, product catalog, purchases) used by the domain.
//!
//! Two backends implement [`Store`]: [`PostgresStore`] for production and
//! [`InMemoryStore`] for tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
pub use records::{
    CategoryRecord, CustomerRecord, NewProduct, NewPurchaseLine, ProductRecord, PurchaseLineView,
    PurchaseRecord,
};
pub use store::{Store, StoreTx, StoreTxExt};

pub use sqlx::postgres::PgConnectOptions;
