//! HTTP API server for cart sync, checkout and order status.
//!
//! Provides the cart, payment and order endpoints behind an authentication
//! middleware, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use checkout::{CartSyncService, CheckoutService, OrderResolver, PaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::Authenticator;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CommerceStore, G: PaymentGateway> {
    pub carts: CartSyncService<S>,
    pub checkout: CheckoutService<S, G>,
    pub resolver: OrderResolver<S, G>,
}

impl<S, G> AppState<S, G>
where
    S: CommerceStore + Clone,
    G: PaymentGateway + Clone,
{
    /// Wires the services over one store and one gateway.
    pub fn new(store: S, gateway: G, currency: impl Into<String>) -> Self {
        Self {
            carts: CartSyncService::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), gateway.clone(), currency),
            resolver: OrderResolver::new(store, gateway),
        }
    }
}

impl<S: CommerceStore, G: PaymentGateway> AppState<S, G> {
    pub fn store(&self) -> &S {
        self.carts.store()
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(
    state: Arc<AppState<S, G>>,
    authenticator: Arc<dyn Authenticator>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: CommerceStore + 'static,
    G: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    let protected = Router::new()
        .route("/user/fetchcart", get(routes::cart::fetch::<S, G>))
        .route("/user/synccart/{cart_id}", post(routes::cart::sync::<S, G>))
        .route("/user/fetchorders", get(routes::orders::list::<S, G>))
        .route(
            "/payment/create-checkout-session",
            post(routes::payment::create_checkout_session::<S, G>),
        )
        .route(
            "/payment/session-status",
            get(routes::payment::session_status::<S, G>),
        )
        .route_layer(middleware::from_fn_with_state(
            authenticator,
            auth::require_user,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::ops::health))
        .merge(protected)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
