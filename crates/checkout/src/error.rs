//! Checkout error types.

use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors that can occur while syncing carts, opening checkouts or resolving orders.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The payment gateway failed or rejected the call.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The gateway session exists but the local order could not be written.
    #[error("Checkout session {session_id} was created but the order was not recorded: {source}")]
    OrderNotRecorded {
        session_id: String,
        #[source]
        source: StoreError,
    },
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
