//! Order history endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use checkout::PaymentGateway;
use serde::Serialize;
use store::{CommerceStore, FoodItemId, OrderId, OrderStatus, OrderWithItems};

use crate::AppState;
use crate::auth::AuthUser;
use crate::envelope::Envelope;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub food_item_id: FoodItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub session_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub currency: String,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderWithItems> for OrderResponse {
    fn from(OrderWithItems { order, items }: OrderWithItems) -> Self {
        Self {
            id: order.id,
            session_id: order.session_id,
            status: order.status,
            total_cents: order.total.cents(),
            currency: order.currency,
            payment_id: order.payment_id,
            created_at: order.created_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    food_item_id: item.food_item_id,
                    name: item.name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
        }
    }
}

/// GET /user/fetchorders — the caller's orders, newest first, with their lines.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: CommerceStore + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    user: AuthUser,
) -> Result<Json<Envelope<Vec<OrderResponse>>>, ApiError> {
    let orders = state.store().list_orders(user.id).await?;

    Ok(Json(Envelope::success(
        "Orders fetched",
        orders.into_iter().map(OrderResponse::from).collect(),
    )))
}
