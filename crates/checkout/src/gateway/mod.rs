//! Payment gateway trait and implementations.

pub mod memory;
pub mod stripe;

use std::sync::Arc;

use async_trait::async_trait;
use store::Money;
use thiserror::Error;

pub use memory::InMemoryPaymentGateway;
pub use stripe::StripeGateway;

/// Errors returned by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced a response (connect failure, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response could not be interpreted.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// The gateway refused the operation.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Request(e.to_string())
    }
}

/// One purchasable line on the gateway's payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: u32,
    pub image: Option<String>,
}

/// Everything the gateway needs to open a payable session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    /// Unique per checkout attempt; lets the gateway collapse retried calls.
    pub idempotency_key: String,
    /// Our user id, echoed back by the gateway for reconciliation.
    pub client_reference: String,
    pub customer_email: Option<String>,
    pub currency: String,
    pub line_items: Vec<LineItem>,
}

/// A session opened by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySession {
    pub session_id: String,
    /// Secret the browser needs to render and complete the payment.
    pub client_secret: String,
}

/// Status of a checkout session as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Still awaiting payment.
    Open,
    /// Paid.
    Complete,
    /// Abandoned until the gateway expired it.
    Expired,
    /// Anything else the gateway may report.
    Other(String),
}

impl SessionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "open" => SessionStatus::Open,
            "complete" => SessionStatus::Complete,
            "expired" => SessionStatus::Expired,
            other => SessionStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Complete => "complete",
            SessionStatus::Expired => "expired",
            SessionStatus::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a session fetched from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub payment_id: Option<String>,
    pub customer_email: Option<String>,
}

/// Trait for the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payable checkout session for the given line items.
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, GatewayError>;

    /// Fetches the current status of a previously created session.
    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, GatewayError>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        (**self).create_session(request).await
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, GatewayError> {
        (**self).get_session(session_id).await
    }
}
