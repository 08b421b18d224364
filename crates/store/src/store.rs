use async_trait::async_trait;

use crate::{
    Cart, CartId, CartItem, DesiredItem, FoodItem, FoodItemId, NewOrder, Order, OrderStatus,
    OrderWithItems, ResolveOutcome, Result, SyncOutcome, UserId,
};

/// Core trait for cart and order persistence.
///
/// Every mutating method is a single all-or-nothing transaction: on any
/// error nothing it wrote is visible afterwards. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Returns the user's active cart, creating an empty one if none exists.
    ///
    /// Concurrent calls for the same user never produce two active carts.
    async fn get_or_create_active_cart(&self, user_id: UserId) -> Result<Cart>;

    /// Returns the lines of a cart owned by `user_id`.
    ///
    /// Fails with `NotFound` for an unknown cart and `Forbidden` for a cart
    /// owned by someone else.
    async fn get_items(&self, cart_id: CartId, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Looks up catalog rows. Unknown ids are omitted from the result.
    async fn food_items(&self, ids: &[FoodItemId]) -> Result<Vec<FoodItem>>;

    /// Replaces the cart's lines with `desired`, re-pricing from the catalog.
    ///
    /// Runs serialized with other syncs on the same cart. After success the
    /// persisted lines equal `desired` exactly and the cart total matches them.
    async fn sync_cart(
        &self,
        cart_id: CartId,
        user_id: UserId,
        desired: &[DesiredItem],
    ) -> Result<SyncOutcome>;

    /// Inserts a pending order together with all of its items.
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Returns the order recorded for `session_id` without locking it.
    ///
    /// Missing orders and orders owned by another user are both `NotFound`.
    async fn find_order(&self, session_id: &str, user_id: UserId) -> Result<Order>;

    /// Applies a gateway outcome to the order recorded for `session_id`.
    ///
    /// A pending order moving to a terminal `status` is updated and the user's
    /// active cart is deactivated in the same transaction. An order that is
    /// already terminal, or a non-terminal `status`, leaves everything as is.
    /// Orders owned by another user are reported as `NotFound`.
    async fn resolve_order(
        &self,
        session_id: &str,
        user_id: UserId,
        status: OrderStatus,
        payment_id: Option<String>,
    ) -> Result<ResolveOutcome>;

    /// Lists a user's orders, newest first, with their items.
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderWithItems>>;
}
