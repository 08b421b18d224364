use serde::{Deserialize, Serialize};

/// Declares a database-backed integer identifier.
///
/// Each identifier wraps the `BIGINT` primary key of its table so that a
/// cart id can never be passed where an order id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw row id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

row_id!(
    /// Identifier of an authenticated user.
    UserId
);

row_id!(
    /// Identifier of a shopping cart.
    CartId
);

row_id!(
    /// Identifier of an order (one checkout attempt).
    OrderId
);

row_id!(
    /// Identifier of a menu item.
    FoodItemId
);

row_id!(
    /// Identifier of a restaurant.
    RestaurantId
);
