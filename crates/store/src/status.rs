//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order (one checkout attempt).
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed
///           ├──► Expired
///           └──► Failed
/// ```
/// Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Checkout session created, payment outcome unknown.
    #[default]
    Pending,

    /// The gateway reported the session as paid (terminal state).
    Completed,

    /// The gateway reported the session as expired (terminal state).
    Expired,

    /// The gateway reported any other outcome (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Returns true if an order in this state may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(self, OrderStatus::Pending) && next.is_terminal()
    }

    /// Returns the status name as stored in the `orders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Expired => "expired",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "expired" => Ok(OrderStatus::Expired),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}
