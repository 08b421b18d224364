//! Cart reconciliation: making the stored cart match what the client shows.

use std::time::Instant;

use store::{
    Cart, CartId, CartItem, CommerceStore, DesiredItem, Money, SyncOutcome, UserId,
    validate_desired_items,
};

use crate::error::Result;

/// A cart together with its lines.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

/// Service keeping server-held carts in step with the client's desired state.
pub struct CartSyncService<S: CommerceStore> {
    store: S,
}

impl<S: CommerceStore> CartSyncService<S> {
    /// Creates a new cart sync service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the user's active cart and its lines, creating an empty cart if needed.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_cart(&self, user_id: UserId) -> Result<CartView> {
        let cart = self.store.get_or_create_active_cart(user_id).await?;
        let items = self.store.get_items(cart.id, user_id).await?;
        Ok(CartView { cart, items })
    }

    /// Replaces the cart's lines with `desired` in one transaction.
    ///
    /// The desired set is validated (quantities, duplicates, single
    /// restaurant) before the store is touched. Totals are computed from
    /// catalog prices; any client-side price is only compared for logging.
    #[tracing::instrument(skip(self, desired), fields(items = desired.len()))]
    pub async fn sync(
        &self,
        cart_id: CartId,
        user_id: UserId,
        desired: &[DesiredItem],
    ) -> Result<SyncOutcome> {
        metrics::counter!("cart_syncs_total").increment(1);
        let start = Instant::now();

        if let Err(e) = validate_desired_items(desired) {
            metrics::counter!("cart_sync_rejections_total").increment(1);
            return Err(e.into());
        }

        let outcome = self
            .store
            .sync_cart(cart_id, user_id, desired)
            .await
            .inspect_err(|_| {
                metrics::counter!("cart_sync_rejections_total").increment(1);
            })?;

        if let Some(client_total) = client_total(desired)
            && client_total != outcome.total()
        {
            tracing::warn!(
                %cart_id,
                client_total = %client_total,
                total = %outcome.total(),
                "client cart total differs from catalog pricing"
            );
        }

        tracing::info!(
            %cart_id,
            inserted = outcome.inserted,
            updated = outcome.updated,
            deleted = outcome.deleted,
            total = %outcome.total(),
            "cart synced"
        );
        metrics::histogram!("cart_sync_duration_seconds").record(start.elapsed().as_secs_f64());

        Ok(outcome)
    }
}

/// Total the client believes the cart has, if it sent a price for every line.
fn client_total(desired: &[DesiredItem]) -> Option<Money> {
    desired
        .iter()
        .map(|item| item.client_price.map(|price| price.multiply(item.quantity)))
        .sum()
}
