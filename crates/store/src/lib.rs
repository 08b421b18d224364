pub mod error;
pub mod memory;
pub mod model;
pub mod plan;
pub mod postgres;
pub mod status;
pub mod store;

pub use common::{CartId, FoodItemId, Money, OrderId, RestaurantId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Cart, CartItem, DesiredItem, FoodItem, NewOrder, NewOrderItem, Order, OrderItem,
    OrderWithItems, ResolveOutcome, SyncOutcome,
};
pub use plan::{MAX_ITEM_QUANTITY, PlannedItem, SyncPlan, validate_desired_items};
pub use postgres::PostgresStore;
pub use status::OrderStatus;
pub use store::CommerceStore;
