use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::{
    Cart, CartId, CartItem, CommerceStore, DesiredItem, FoodItem, FoodItemId, Money, NewOrder,
    Order, OrderId, OrderItem, OrderStatus, OrderWithItems, ResolveOutcome, RestaurantId, Result,
    StoreError, SyncOutcome, SyncPlan, UserId,
};

const CART_COLUMNS: &str =
    "id, user_id, restaurant_id, total_cents, active, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, user_id, session_id, total_cents, currency, status, payment_id, created_at, updated_at";

/// PostgreSQL-backed cart and order store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn find_active_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND active"
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_cart).transpose()
    }

    fn row_to_food_item(row: PgRow) -> Result<FoodItem> {
        Ok(FoodItem {
            id: FoodItemId::new(row.try_get("id")?),
            restaurant_id: RestaurantId::new(row.try_get("restaurant_id")?),
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("price_cents")?),
            image_id: row.try_get("image_id")?,
        })
    }
}

fn row_to_cart(row: PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        restaurant_id: row
            .try_get::<Option<i64>, _>("restaurant_id")?
            .map(RestaurantId::new),
        total: Money::from_cents(row.try_get("total_cents")?),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        cart_id: CartId::new(row.try_get("cart_id")?),
        food_item_id: FoodItemId::new(row.try_get("food_item_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        session_id: row.try_get("session_id")?,
        total: Money::from_cents(row.try_get("total_cents")?),
        currency: row.try_get("currency")?,
        status: status.parse().map_err(StoreError::InvalidState)?,
        payment_id: row.try_get("payment_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        order_id: OrderId::new(row.try_get("order_id")?),
        food_item_id: FoodItemId::new(row.try_get("food_item_id")?),
        name: row.try_get("name")?,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

/// Loads a cart row and locks it for the rest of the transaction.
async fn lock_owned_cart(conn: &mut PgConnection, cart_id: CartId, user_id: UserId) -> Result<Cart> {
    let row = sqlx::query(&format!(
        "SELECT {CART_COLUMNS} FROM carts WHERE id = $1 FOR UPDATE"
    ))
    .bind(cart_id.as_i64())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("Cart {cart_id}")))?;

    let cart = row_to_cart(row)?;
    if cart.user_id != user_id {
        return Err(StoreError::Forbidden(format!(
            "Cart {cart_id} belongs to another user"
        )));
    }
    Ok(cart)
}

async fn load_cart_items(conn: &mut PgConnection, cart_id: CartId) -> Result<Vec<CartItem>> {
    let rows = sqlx::query(
        r#"
        SELECT cart_id, food_item_id, quantity, unit_price_cents
        FROM cart_items
        WHERE cart_id = $1
        ORDER BY food_item_id ASC
        "#,
    )
    .bind(cart_id.as_i64())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(row_to_cart_item).collect()
}

async fn load_food_items(conn: &mut PgConnection, ids: &[FoodItemId]) -> Result<Vec<FoodItem>> {
    let ids: Vec<i64> = ids.iter().map(FoodItemId::as_i64).collect();
    let rows = sqlx::query(
        r#"
        SELECT id, restaurant_id, name, price_cents, image_id
        FROM food_items
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(PostgresStore::row_to_food_item).collect()
}

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn get_or_create_active_cart(&self, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = self.find_active_cart(user_id).await? {
            return Ok(cart);
        }

        let inserted = sqlx::query(&format!(
            "INSERT INTO carts (user_id) VALUES ($1) RETURNING {CART_COLUMNS}"
        ))
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => row_to_cart(row),
            // Lost the race against a concurrent creator: read the winner's cart.
            Err(sqlx::Error::Database(ref db_err))
                if db_err.constraint() == Some("carts_one_active_per_user") =>
            {
                tracing::debug!(%user_id, "active cart created concurrently, re-reading");
                self.find_active_cart(user_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("Active cart for user {user_id}")))
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn get_items(&self, cart_id: CartId, user_id: UserId) -> Result<Vec<CartItem>> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM carts WHERE id = $1")
            .bind(cart_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match owner {
            None => return Err(StoreError::NotFound(format!("Cart {cart_id}"))),
            Some(owner) if owner != user_id.as_i64() => {
                return Err(StoreError::Forbidden(format!(
                    "Cart {cart_id} belongs to another user"
                )));
            }
            Some(_) => {}
        }

        let mut conn = self.pool.acquire().await?;
        load_cart_items(&mut conn, cart_id).await
    }

    async fn food_items(&self, ids: &[FoodItemId]) -> Result<Vec<FoodItem>> {
        let mut conn = self.pool.acquire().await?;
        load_food_items(&mut conn, ids).await
    }

    async fn sync_cart(
        &self,
        cart_id: CartId,
        user_id: UserId,
        desired: &[DesiredItem],
    ) -> Result<SyncOutcome> {
        // Dropping `tx` on any early return rolls back every write below.
        let mut tx = self.pool.begin().await?;

        let cart = lock_owned_cart(&mut tx, cart_id, user_id).await?;
        if !cart.active {
            return Err(StoreError::InvalidState(format!("Cart {cart_id} is not active")));
        }

        let existing = load_cart_items(&mut tx, cart_id).await?;
        let ids: Vec<FoodItemId> = desired.iter().map(|item| item.food_item_id).collect();
        let catalog = load_food_items(&mut tx, &ids).await?;
        let plan = SyncPlan::build(&existing, desired, &catalog)?;

        if !plan.deletes.is_empty() {
            let deletes: Vec<i64> = plan.deletes.iter().map(FoodItemId::as_i64).collect();
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND food_item_id = ANY($2)")
                .bind(cart_id.as_i64())
                .bind(deletes)
                .execute(&mut *tx)
                .await?;
        }

        for line in &plan.updates {
            sqlx::query(
                r#"
                UPDATE cart_items SET quantity = $3, unit_price_cents = $4
                WHERE cart_id = $1 AND food_item_id = $2
                "#,
            )
            .bind(cart_id.as_i64())
            .bind(line.food_item_id.as_i64())
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        for line in &plan.inserts {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, food_item_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(cart_id.as_i64())
            .bind(line.food_item_id.as_i64())
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE carts SET total_cents = $2, restaurant_id = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(cart_id.as_i64())
        .bind(plan.total.cents())
        .bind(plan.restaurant_id.map(|id| id.as_i64()))
        .fetch_one(&mut *tx)
        .await?;
        let cart = row_to_cart(row)?;

        tx.commit().await?;

        Ok(SyncOutcome {
            cart,
            inserted: plan.inserts.len(),
            updated: plan.updates.len(),
            deleted: plan.deletes.len(),
        })
    }

    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (user_id, session_id, total_cents, currency, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(new_order.user_id.as_i64())
        .bind(&new_order.session_id)
        .bind(new_order.total().cents())
        .bind(&new_order.currency)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_session_id_key")
            {
                return StoreError::InvalidState(format!(
                    "Checkout session {} already has an order",
                    new_order.session_id
                ));
            }
            StoreError::Database(e)
        })?;
        let order = row_to_order(row)?;

        for item in &new_order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, food_item_id, name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_i64())
            .bind(item.food_item_id.as_i64())
            .bind(&item.name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn find_order(&self, session_id: &str, user_id: UserId) -> Result<Order> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE session_id = $1 AND user_id = $2"
        ))
        .bind(session_id)
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Order for session {session_id}")))?;

        row_to_order(row)
    }

    async fn resolve_order(
        &self,
        session_id: &str,
        user_id: UserId,
        status: OrderStatus,
        payment_id: Option<String>,
    ) -> Result<ResolveOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE session_id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let order = match row.map(row_to_order).transpose()? {
            Some(order) if order.user_id == user_id => order,
            _ => {
                return Err(StoreError::NotFound(format!(
                    "Order for session {session_id}"
                )));
            }
        };

        if !order.status.can_transition_to(status) {
            return Ok(ResolveOutcome {
                order,
                transitioned: false,
                deactivated_cart: None,
            });
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $2, payment_id = COALESCE($3, payment_id), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id.as_i64())
        .bind(status.as_str())
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?;
        let order = row_to_order(row)?;

        let deactivated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE carts SET active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND active
            RETURNING id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ResolveOutcome {
            order,
            transitioned: true,
            deactivated_cart: deactivated.map(CartId::new),
        })
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderWithItems>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        let orders: Vec<Order> = rows.into_iter().map(row_to_order).collect::<Result<_>>()?;

        let order_ids: Vec<i64> = orders.iter().map(|order| order.id.as_i64()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT order_id, food_item_id, name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, food_item_id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let item = row_to_order_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
