//! Payment endpoints: opening a checkout session and reporting its outcome.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use checkout::{CheckoutRequest, Customer, PaymentGateway};
use serde::{Deserialize, Serialize};
use store::{CommerceStore, Money, OrderId, OrderStatus};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::routes::cart::CartItemRequest;

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub items: Vec<CartItemRequest>,
    /// Amount the client displayed, in major units.
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub client_secret: String,
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct SessionStatusQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub status: OrderStatus,
    pub customer_email: Option<String>,
}

/// POST /payment/create-checkout-session
#[tracing::instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_checkout_session<S: CommerceStore + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    user: AuthUser,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let Json(req) = payload?;

    let customer = Customer {
        id: user.id,
        email: user.email,
    };
    let request = CheckoutRequest {
        items: req.items.iter().map(CartItemRequest::to_desired).collect(),
        client_amount: req.amount.filter(|a| a.is_finite()).map(Money::from_major),
    };

    let session = state.checkout.create_checkout(&customer, &request).await?;

    Ok(Json(CreateCheckoutResponse {
        client_secret: session.client_secret,
        order_id: session.order_id,
    }))
}

/// GET /payment/session-status?session_id=…
#[tracing::instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn session_status<S: CommerceStore + 'static, G: PaymentGateway + 'static>(
    State(state): State<Arc<AppState<S, G>>>,
    user: AuthUser,
    query: Result<Query<SessionStatusQuery>, QueryRejection>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let Query(query) = query?;
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("session_id is required".to_string()))?;

    let resolved = state.resolver.resolve(&session_id, user.id).await?;

    Ok(Json(SessionStatusResponse {
        status: resolved.order.status,
        customer_email: resolved.customer_email,
    }))
}
