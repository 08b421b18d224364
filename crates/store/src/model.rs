//! Row models for carts, orders and the menu catalog.

use chrono::{DateTime, Utc};
use common::{CartId, FoodItemId, Money, OrderId, RestaurantId, UserId};
use serde::{Deserialize, Serialize};

use crate::OrderStatus;

/// A menu item as priced by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: FoodItemId,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub unit_price: Money,
    /// Image reference passed through to the payment page.
    pub image_id: Option<String>,
}

/// A user's shopping cart.
///
/// `total` is derived from the cart's items and is only ever written by a
/// reconciliation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    /// Unset until the first item is added, cleared again when the cart is emptied.
    pub restaurant_id: Option<RestaurantId>,
    pub total: Money,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a cart, unique per `(cart_id, food_item_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub cart_id: CartId,
    pub food_item_id: FoodItemId,
    pub quantity: u32,
    /// Catalog price read when the line was last reconciled.
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// One entry of the client-submitted desired cart state.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredItem {
    pub food_item_id: FoodItemId,
    pub quantity: u32,
    pub restaurant_id: RestaurantId,
    /// Price the client displayed; informational only, never used for totals.
    pub client_price: Option<Money>,
}

impl DesiredItem {
    pub fn new(food_item_id: FoodItemId, quantity: u32, restaurant_id: RestaurantId) -> Self {
        Self {
            food_item_id,
            quantity,
            restaurant_id,
            client_price: None,
        }
    }

    pub fn with_client_price(mut self, price: Money) -> Self {
        self.client_price = Some(price);
        self
    }
}

/// Result of a committed cart reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub cart: Cart,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncOutcome {
    pub fn total(&self) -> Money {
        self.cart.total
    }

    /// Returns true if the sync changed no item rows.
    pub fn is_unchanged(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// An order row: one checkout attempt against the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Gateway checkout-session id, unique across orders.
    pub session_id: String,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Price snapshot of one purchased line. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub food_item_id: FoodItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order together with its line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A line to be written with a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub food_item_id: FoodItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A pending order to be inserted together with its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub session_id: String,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Returns the order total (sum of line totals).
    pub fn total(&self) -> Money {
        self.items
            .iter()
            .map(|item| item.unit_price.multiply(item.quantity))
            .sum()
    }
}

/// Result of applying a gateway outcome to an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOutcome {
    pub order: Order,
    /// True if this call moved the order out of `Pending`.
    pub transitioned: bool,
    /// The cart deactivated by the transition, if the user had an active one.
    pub deactivated_cart: Option<CartId>,
}
