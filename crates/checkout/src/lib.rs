//! Checkout core for the food-ordering backend.
//!
//! - [`CartSyncService`] reconciles a client-submitted cart with the stored one
//! - [`CheckoutService`] opens a gateway checkout session and records a pending order
//! - [`OrderResolver`] applies the gateway's payment outcome to the order and cart
//! - [`PaymentGateway`] is the seam to the external payment provider

pub mod error;
pub mod gateway;
pub mod resolver;
pub mod session;
pub mod sync;

pub use error::{CheckoutError, Result};
pub use gateway::{
    CreateSessionRequest, GatewayError, GatewaySession, InMemoryPaymentGateway, LineItem,
    PaymentGateway, SessionSnapshot, SessionStatus, StripeGateway,
};
pub use resolver::{OrderResolver, ResolvedSession, map_session_status};
pub use session::{CheckoutRequest, CheckoutService, CheckoutSession, Customer};
pub use sync::{CartSyncService, CartView};
