//! Inventory ledger.
//!
//! Reservation and release per product. Reservations are per-line, not
//! per-order: a failure partway through an order leaves earlier lines'
//! reservations in place.

use std::sync::Arc;

use common::{CorrelationId, ProductId};
use pubsub::{Channel, EventBus, InventoryUpdatePayload, WorkflowEvent};
use store::{Product, Repository};

use crate::error::Result;

pub struct InventoryLedger<R: Repository> {
    repo: R,
    bus: Arc<EventBus>,
}

impl<R: Repository> Clone for InventoryLedger<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<R: Repository> InventoryLedger<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        Self { repo, bus }
    }

    /// Moves `quantity` units from available to reserved and emits
    /// `inventory:updated` under the caller's correlation id.
    ///
    /// Fails with `InsufficientStock`, mutating nothing, when fewer than
    /// `quantity` units are available.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
        correlation_id: CorrelationId,
    ) -> Result<Product> {
        let change = self.repo.reserve_stock(product_id, quantity).await?;
        let product = change.product;

        metrics::counter!("inventory_reservations_total").increment(1);
        tracing::debug!(
            sku = %product.sku,
            quantity,
            available = product.quantity,
            reserved = product.reserved,
            "stock reserved"
        );

        self.bus.publish(
            Channel::Tasks,
            WorkflowEvent::InventoryUpdated(InventoryUpdatePayload {
                product_id: product.id,
                sku: product.sku.clone(),
                name: product.name.clone(),
                previous_qty: change.previous_quantity,
                new_qty: product.quantity,
                reserved: product.reserved,
            }),
            correlation_id,
        );

        Ok(product)
    }

    /// Drops `quantity` units from the reserved count.
    ///
    /// Callers must never release more than they reserved; the store refuses
    /// to drive the count negative.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let product = self.repo.release_stock(product_id, quantity).await?;
        metrics::counter!("inventory_releases_total").increment(1);
        tracing::debug!(sku = %product.sku, quantity, reserved = product.reserved, "stock released");
        Ok(product)
    }
}
