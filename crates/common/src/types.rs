use serde::{Deserialize, Serialize};

/// Declares a surrogate key backed by a database `BIGSERIAL`.
///
/// Each key gets its own type so a product id can never be bound where a
/// customer id is expected.
macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database key.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw database key.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

surrogate_id!(
    /// Surrogate key of a customer row.
    CustomerId
);
surrogate_id!(
    /// Surrogate key of a product row.
    ProductId
);
surrogate_id!(
    /// Surrogate key of a category row.
    CategoryId
);
surrogate_id!(
    /// Surrogate key of a purchase header row.
    ///
    /// One header exists per purchased line, so this is also the id a
    /// customer uses to cancel that line.
    PurchaseId
);
