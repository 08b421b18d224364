//! Opening a payment session and recording the pending order.

use std::collections::HashMap;

use store::{
    CommerceStore, DesiredItem, FoodItem, FoodItemId, Money, NewOrder, NewOrderItem, OrderId,
    SyncPlan, UserId, validate_desired_items,
};
use uuid::Uuid;

use crate::error::{CheckoutError, Result};
use crate::gateway::{CreateSessionRequest, LineItem, PaymentGateway};

/// The authenticated buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: UserId,
    pub email: Option<String>,
}

/// What the client asks to pay for.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub items: Vec<DesiredItem>,
    /// Amount the client displayed; compared against the priced total for logging only.
    pub client_amount: Option<Money>,
}

/// A created checkout session, ready to be handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub order_id: OrderId,
    pub session_id: String,
    pub client_secret: String,
    pub total: Money,
}

/// Turns a cart into a gateway checkout session plus a pending order.
pub struct CheckoutService<S: CommerceStore, G: PaymentGateway> {
    store: S,
    gateway: G,
    currency: String,
}

impl<S: CommerceStore, G: PaymentGateway> CheckoutService<S, G> {
    pub fn new(store: S, gateway: G, currency: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            currency: currency.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a gateway session for the requested items and records a
    /// pending order tied to it.
    ///
    /// Lines are priced from the catalog. If the gateway call fails no order
    /// is written. If the order write fails after the session was created,
    /// the session is left orphaned at the gateway and
    /// [`CheckoutError::OrderNotRecorded`] is returned.
    #[tracing::instrument(skip(self, customer, request), fields(user_id = %customer.id, items = request.items.len()))]
    pub async fn create_checkout(
        &self,
        customer: &Customer,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession> {
        if request.items.is_empty() {
            return Err(CheckoutError::Validation(
                "Checkout requires at least one item".to_string(),
            ));
        }
        validate_desired_items(&request.items)?;

        let ids: Vec<FoodItemId> = request.items.iter().map(|i| i.food_item_id).collect();
        let catalog = self.store.food_items(&ids).await?;
        let plan = SyncPlan::build(&[], &request.items, &catalog)?;

        if let Some(client_amount) = request.client_amount
            && client_amount != plan.total
        {
            tracing::warn!(
                client_amount = %client_amount,
                total = %plan.total,
                "client checkout amount differs from catalog pricing"
            );
        }

        let catalog: HashMap<FoodItemId, &FoodItem> =
            catalog.iter().map(|item| (item.id, item)).collect();
        let mut line_items = Vec::with_capacity(plan.inserts.len());
        let mut order_items = Vec::with_capacity(plan.inserts.len());
        for line in &plan.inserts {
            let (name, image) = catalog
                .get(&line.food_item_id)
                .map(|food| (food.name.clone(), food.image_id.clone()))
                .unwrap_or_default();
            line_items.push(LineItem {
                name: name.clone(),
                unit_amount: line.unit_price,
                quantity: line.quantity,
                image,
            });
            order_items.push(NewOrderItem {
                food_item_id: line.food_item_id,
                name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        let session_request = CreateSessionRequest {
            idempotency_key: Uuid::new_v4().to_string(),
            client_reference: customer.id.to_string(),
            customer_email: customer.email.clone(),
            currency: self.currency.clone(),
            line_items,
        };

        let session = self
            .gateway
            .create_session(&session_request)
            .await
            .inspect_err(|e| {
                metrics::counter!("checkout_gateway_failures_total").increment(1);
                tracing::error!(error = %e, "failed to create checkout session");
            })?;

        let order = match self
            .store
            .create_order(NewOrder {
                user_id: customer.id,
                session_id: session.session_id.clone(),
                currency: self.currency.clone(),
                items: order_items,
            })
            .await
        {
            Ok(order) => order,
            Err(source) => {
                metrics::counter!("checkout_orphaned_sessions_total").increment(1);
                tracing::warn!(
                    session_id = %session.session_id,
                    error = %source,
                    "checkout session created but order was not recorded"
                );
                return Err(CheckoutError::OrderNotRecorded {
                    session_id: session.session_id,
                    source,
                });
            }
        };

        metrics::counter!("checkout_sessions_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            session_id = %order.session_id,
            total = %order.total,
            "checkout session created"
        );

        Ok(CheckoutSession {
            order_id: order.id,
            session_id: session.session_id,
            client_secret: session.client_secret,
            total: order.total,
        })
    }
}
