//! Cart endpoints: fetching the active cart and syncing it from the client.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use checkout::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::{CartId, CartItem, CommerceStore, DesiredItem, FoodItemId, Money, RestaurantId};

use crate::AppState;
use crate::auth::AuthUser;
use crate::envelope::Envelope;
use crate::error::ApiError;

// -- Request types --

/// One entry of the client's cart as the browser stores it.
#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub id: i64,
    pub quantity: u32,
    /// Displayed unit price in major units; informational only.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "restrauntId")]
    pub restaurant_id: i64,
}

impl CartItemRequest {
    pub fn to_desired(&self) -> DesiredItem {
        let item = DesiredItem::new(
            FoodItemId::new(self.id),
            self.quantity,
            RestaurantId::new(self.restaurant_id),
        );
        match self.price {
            Some(price) if price.is_finite() => item.with_client_price(Money::from_major(price)),
            _ => item,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncCartRequest {
    pub items: Vec<CartItemRequest>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct SyncCartResponse {
    pub cart_id: CartId,
    pub total_cents: i64,
    pub restaurant_id: Option<RestaurantId>,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub food_item_id: FoodItemId,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<&CartItem> for CartLineResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            food_item_id: item.food_item_id,
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total().cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart_id: CartId,
    pub restaurant_id: Option<RestaurantId>,
    pub total_cents: i64,
    pub items: Vec<CartLineResponse>,
}

// -- Handlers --

/// GET /user/fetchcart — the caller's active cart, created on first use.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn fetch<S: CommerceStore + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    user: AuthUser,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let view = state.carts.fetch_cart(user.id).await?;

    Ok(Json(Envelope::success(
        "Cart fetched",
        CartResponse {
            cart_id: view.cart.id,
            restaurant_id: view.cart.restaurant_id,
            total_cents: view.cart.total.cents(),
            items: view.items.iter().map(CartLineResponse::from).collect(),
        },
    )))
}

/// POST /user/synccart/{cart_id} — replace the cart's lines with the client's view.
#[tracing::instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn sync<S: CommerceStore + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    user: AuthUser,
    cart_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SyncCartRequest>, JsonRejection>,
) -> Result<Json<Envelope<SyncCartResponse>>, ApiError> {
    let Path(cart_id) = cart_id?;
    let Json(req) = payload?;

    let desired: Vec<DesiredItem> = req.items.iter().map(CartItemRequest::to_desired).collect();
    let outcome = state
        .carts
        .sync(CartId::new(cart_id), user.id, &desired)
        .await?;

    Ok(Json(Envelope::success(
        "Sync Successful",
        SyncCartResponse {
            cart_id: outcome.cart.id,
            total_cents: outcome.total().cents(),
            restaurant_id: outcome.cart.restaurant_id,
        },
    )))
}
