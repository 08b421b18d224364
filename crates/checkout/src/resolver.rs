//! Applying the gateway's payment outcome to orders and carts.

use store::{CommerceStore, Order, OrderStatus, UserId};

use crate::error::{CheckoutError, Result};
use crate::gateway::{PaymentGateway, SessionStatus};

/// Maps a gateway session status onto the order lifecycle.
///
/// An `open` session is still awaiting payment, so the order stays pending.
/// Unknown statuses are treated as failed payments.
pub fn map_session_status(status: &SessionStatus) -> OrderStatus {
    match status {
        SessionStatus::Open => OrderStatus::Pending,
        SessionStatus::Complete => OrderStatus::Completed,
        SessionStatus::Expired => OrderStatus::Expired,
        SessionStatus::Other(_) => OrderStatus::Failed,
    }
}

/// Outcome of a session-status request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    /// The order after resolution.
    pub order: Order,
    pub customer_email: Option<String>,
    /// True if this call moved the order out of `Pending`.
    pub transitioned: bool,
}

/// Resolves pending orders against the payment gateway.
pub struct OrderResolver<S: CommerceStore, G: PaymentGateway> {
    store: S,
    gateway: G,
}

impl<S: CommerceStore, G: PaymentGateway> OrderResolver<S, G> {
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// Fetches the session outcome from the gateway and applies it.
    ///
    /// Repeated calls are safe: a terminal order is never changed again and
    /// the user's cart is deactivated only by the call that performs the
    /// transition. A gateway failure leaves the order untouched. Unknown
    /// sessions and other users' sessions are `NotFound` without a gateway call.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, session_id: &str, user_id: UserId) -> Result<ResolvedSession> {
        if session_id.trim().is_empty() {
            return Err(CheckoutError::Validation("session_id is required".to_string()));
        }

        // Sessions without an order of this user never reach the gateway.
        self.store.find_order(session_id, user_id).await?;

        let snapshot = self.gateway.get_session(session_id).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to fetch checkout session status");
        })?;
        let target = map_session_status(&snapshot.status);

        let outcome = self
            .store
            .resolve_order(session_id, user_id, target, snapshot.payment_id)
            .await?;

        if outcome.transitioned {
            metrics::counter!("order_resolutions_total", "status" => target.as_str())
                .increment(1);
            tracing::info!(
                order_id = %outcome.order.id,
                status = %outcome.order.status,
                deactivated_cart = ?outcome.deactivated_cart,
                "order resolved"
            );
        } else if outcome.order.status.is_terminal() && outcome.order.status != target {
            tracing::warn!(
                order_id = %outcome.order.id,
                recorded = %outcome.order.status,
                gateway = %snapshot.status,
                "gateway status disagrees with resolved order; keeping recorded status"
            );
        }

        Ok(ResolvedSession {
            order: outcome.order,
            customer_email: snapshot.customer_email,
            transitioned: outcome.transitioned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_session_status() {
        assert_eq!(map_session_status(&SessionStatus::Open), OrderStatus::Pending);
        assert_eq!(
            map_session_status(&SessionStatus::Complete),
            OrderStatus::Completed
        );
        assert_eq!(
            map_session_status(&SessionStatus::Expired),
            OrderStatus::Expired
        );
        assert_eq!(
            map_session_status(&SessionStatus::Other("canceled".to_string())),
            OrderStatus::Failed
        );
    }
}
