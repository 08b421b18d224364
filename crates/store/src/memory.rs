use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Cart, CartId, CartItem, CommerceStore, DesiredItem, FoodItem, FoodItemId, NewOrder, Order,
    OrderId, OrderItem, OrderStatus, OrderWithItems, ResolveOutcome, Result, StoreError,
    SyncOutcome, SyncPlan, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    food_items: BTreeMap<FoodItemId, FoodItem>,
    carts: BTreeMap<CartId, Cart>,
    cart_items: BTreeMap<(CartId, FoodItemId), CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    next_cart_id: i64,
    next_order_id: i64,
    fail_on_order_items: bool,
}

impl Tables {
    fn owned_cart(&self, cart_id: CartId, user_id: UserId) -> Result<&Cart> {
        let cart = self
            .carts
            .get(&cart_id)
            .ok_or_else(|| StoreError::NotFound(format!("Cart {cart_id}")))?;
        if cart.user_id != user_id {
            return Err(StoreError::Forbidden(format!(
                "Cart {cart_id} belongs to another user"
            )));
        }
        Ok(cart)
    }

    fn items_of(&self, cart_id: CartId) -> Vec<CartItem> {
        self.cart_items
            .range((cart_id, FoodItemId::new(i64::MIN))..=(cart_id, FoodItemId::new(i64::MAX)))
            .map(|(_, item)| item.clone())
            .collect()
    }
}

/// In-memory store implementation for testing.
///
/// A single lock guards every table; each operation computes all of its
/// writes before publishing any of them, which gives the same
/// all-or-nothing behavior as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog entry.
    pub async fn insert_food_item(&self, item: FoodItem) {
        self.tables.write().await.food_items.insert(item.id, item);
    }

    /// Configures the store to fail the next order insert after the order row
    /// was staged but before its items are written.
    pub async fn set_fail_on_order_items(&self, fail: bool) {
        self.tables.write().await.fail_on_order_items = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns a cart by id regardless of owner or active flag.
    pub async fn cart(&self, cart_id: CartId) -> Option<Cart> {
        self.tables.read().await.carts.get(&cart_id).cloned()
    }

    /// Returns the user's active cart without creating one.
    pub async fn active_cart(&self, user_id: UserId) -> Option<Cart> {
        self.tables
            .read()
            .await
            .carts
            .values()
            .find(|cart| cart.user_id == user_id && cart.active)
            .cloned()
    }

    /// Returns an order by its gateway session id.
    pub async fn order_by_session(&self, session_id: &str) -> Option<Order> {
        self.tables
            .read()
            .await
            .orders
            .values()
            .find(|order| order.session_id == session_id)
            .cloned()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn get_or_create_active_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut tables = self.tables.write().await;

        if let Some(cart) = tables
            .carts
            .values()
            .find(|cart| cart.user_id == user_id && cart.active)
        {
            return Ok(cart.clone());
        }

        tables.next_cart_id += 1;
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(tables.next_cart_id),
            user_id,
            restaurant_id: None,
            total: Default::default(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn get_items(&self, cart_id: CartId, user_id: UserId) -> Result<Vec<CartItem>> {
        let tables = self.tables.read().await;
        tables.owned_cart(cart_id, user_id)?;
        Ok(tables.items_of(cart_id))
    }

    async fn food_items(&self, ids: &[FoodItemId]) -> Result<Vec<FoodItem>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.food_items.get(id).cloned())
            .collect())
    }

    async fn sync_cart(
        &self,
        cart_id: CartId,
        user_id: UserId,
        desired: &[DesiredItem],
    ) -> Result<SyncOutcome> {
        // Holding the write guard for the whole call serializes syncs.
        let mut tables = self.tables.write().await;

        let cart = tables.owned_cart(cart_id, user_id)?;
        if !cart.active {
            return Err(StoreError::InvalidState(format!("Cart {cart_id} is not active")));
        }

        let existing = tables.items_of(cart_id);
        let catalog: Vec<FoodItem> = desired
            .iter()
            .filter_map(|item| tables.food_items.get(&item.food_item_id).cloned())
            .collect();
        let plan = SyncPlan::build(&existing, desired, &catalog)?;

        for food_item_id in &plan.deletes {
            tables.cart_items.remove(&(cart_id, *food_item_id));
        }
        for line in plan.updates.iter().chain(plan.inserts.iter()) {
            tables.cart_items.insert(
                (cart_id, line.food_item_id),
                CartItem {
                    cart_id,
                    food_item_id: line.food_item_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                },
            );
        }

        let cart = tables
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| StoreError::NotFound(format!("Cart {cart_id}")))?;
        cart.total = plan.total;
        cart.restaurant_id = plan.restaurant_id;
        cart.updated_at = Utc::now();

        Ok(SyncOutcome {
            cart: cart.clone(),
            inserted: plan.inserts.len(),
            updated: plan.updates.len(),
            deleted: plan.deletes.len(),
        })
    }

    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut tables = self.tables.write().await;

        if tables
            .orders
            .values()
            .any(|order| order.session_id == new_order.session_id)
        {
            return Err(StoreError::InvalidState(format!(
                "Checkout session {} already has an order",
                new_order.session_id
            )));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(tables.next_order_id + 1),
            user_id: new_order.user_id,
            session_id: new_order.session_id.clone(),
            total: new_order.total(),
            currency: new_order.currency.clone(),
            status: OrderStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };

        if tables.fail_on_order_items {
            tables.fail_on_order_items = false;
            return Err(StoreError::Unavailable(
                "order item insert rejected".to_string(),
            ));
        }

        let items: Vec<OrderItem> = new_order
            .items
            .into_iter()
            .map(|item| OrderItem {
                order_id: order.id,
                food_item_id: item.food_item_id,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        tables.next_order_id += 1;
        tables.orders.insert(order.id, order.clone());
        tables.order_items.extend(items);
        Ok(order)
    }

    async fn find_order(&self, session_id: &str, user_id: UserId) -> Result<Order> {
        self.tables
            .read()
            .await
            .orders
            .values()
            .find(|order| order.session_id == session_id && order.user_id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Order for session {session_id}")))
    }

    async fn resolve_order(
        &self,
        session_id: &str,
        user_id: UserId,
        status: OrderStatus,
        payment_id: Option<String>,
    ) -> Result<ResolveOutcome> {
        let mut tables = self.tables.write().await;

        let order = tables
            .orders
            .values_mut()
            .find(|order| order.session_id == session_id && order.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("Order for session {session_id}")))?;

        if !order.status.can_transition_to(status) {
            return Ok(ResolveOutcome {
                order: order.clone(),
                transitioned: false,
                deactivated_cart: None,
            });
        }

        let now = Utc::now();
        order.status = status;
        if payment_id.is_some() {
            order.payment_id = payment_id;
        }
        order.updated_at = now;
        let order = order.clone();

        let deactivated_cart = tables
            .carts
            .values_mut()
            .find(|cart| cart.user_id == user_id && cart.active)
            .map(|cart| {
                cart.active = false;
                cart.updated_at = now;
                cart.id
            });

        Ok(ResolveOutcome {
            order,
            transitioned: true,
            deactivated_cart,
        })
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderWithItems>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<OrderWithItems> = tables
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .map(|order| OrderWithItems {
                order: order.clone(),
                items: tables
                    .order_items
                    .iter()
                    .filter(|item| item.order_id == order.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(orders)
    }
}
