//! Shared identifier and money types used across the workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartId, FoodItemId, OrderId, RestaurantId, UserId};
