//! Value types shared by the storage, domain, and HTTP layers.

pub mod money;
pub mod name_key;
pub mod tax_id;
pub mod types;

pub use money::Money;
pub use name_key::NameKey;
pub use tax_id::{TaxId, TaxIdError};
pub use types::{CategoryId, CustomerId, ProductId, PurchaseId};
