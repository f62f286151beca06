//! Manual fulfillment driver.
//!
//! One operation per stage, each independently invocable and human-paced.
//! Every operation generates its own correlation id (a manual step is a
//! top-level workflow invocation) and delegates to the same managers the
//! automated driver uses, so both drivers are equivalent in end state given
//! the same sequence of stage completions.

use std::sync::Arc;

use common::{CorrelationId, OrderId};
use pubsub::EventBus;
use store::{Dimensions, Order, OrderStatus, PackingTask, PickList, Repository, ShippingLabel};

use crate::error::Result;
use crate::machine::OrderMachine;
use crate::packing::{PackProgress, PackingManager, PackingPolicy};
use crate::picklist::{PickListManager, PickProgress};
use crate::shipping::ShippingManager;

pub struct FulfillmentService<R: Repository> {
    machine: OrderMachine<R>,
    picklist: PickListManager<R>,
    packing: PackingManager<R>,
    shipping: ShippingManager<R>,
}

impl<R: Repository> FulfillmentService<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        Self {
            machine: OrderMachine::new(repo.clone(), Arc::clone(&bus)),
            picklist: PickListManager::new(repo.clone(), Arc::clone(&bus)),
            packing: PackingManager::new(repo.clone(), Arc::clone(&bus)),
            shipping: ShippingManager::new(repo, bus),
        }
    }

    /// Replaces the default permissive packing policy.
    pub fn with_packing_policy(mut self, policy: PackingPolicy) -> Self {
        self.packing = self.packing.with_policy(policy);
        self
    }

    /// Generates the pick list, advancing a pending order to `processing`.
    #[tracing::instrument(skip(self))]
    pub async fn generate_pick_list(
        &self,
        order_id: OrderId,
    ) -> Result<(PickList, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let list = self.picklist.generate(order_id, correlation_id).await?;
        Ok((list, correlation_id))
    }

    /// Picks one SKU off the order's pick list.
    #[tracing::instrument(skip(self))]
    pub async fn pick_item(
        &self,
        order_id: OrderId,
        sku: &str,
    ) -> Result<(PickProgress, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let progress = self
            .picklist
            .pick_item(order_id, sku, correlation_id)
            .await?;
        Ok((progress, correlation_id))
    }

    /// Starts packing a picked order.
    #[tracing::instrument(skip(self))]
    pub async fn start_packing(
        &self,
        order_id: OrderId,
    ) -> Result<(PackingTask, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let task = self.packing.start(order_id, correlation_id).await?;
        Ok((task, correlation_id))
    }

    /// Verifies one SKU on the order's packing task.
    #[tracing::instrument(skip(self))]
    pub async fn verify_item(
        &self,
        order_id: OrderId,
        sku: &str,
    ) -> Result<(PackProgress, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let progress = self
            .packing
            .verify_item(order_id, sku, correlation_id)
            .await?;
        Ok((progress, correlation_id))
    }

    /// Finalizes packing with the measured weight and dimensions.
    #[tracing::instrument(skip(self))]
    pub async fn complete_packing(
        &self,
        order_id: OrderId,
        weight: f64,
        dimensions: Dimensions,
    ) -> Result<(PackingTask, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let task = self
            .packing
            .complete(order_id, weight, dimensions, correlation_id)
            .await?;
        Ok((task, correlation_id))
    }

    /// Mints a shipping label for a packed order.
    #[tracing::instrument(skip(self))]
    pub async fn create_label(
        &self,
        order_id: OrderId,
        carrier_choice: Option<usize>,
    ) -> Result<(ShippingLabel, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let label = self
            .shipping
            .create_label(order_id, carrier_choice, correlation_id)
            .await?;
        Ok((label, correlation_id))
    }

    /// Ships the order, releasing reservations and completing it.
    #[tracing::instrument(skip(self))]
    pub async fn ship_order(&self, order_id: OrderId) -> Result<(Order, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let order = self.shipping.ship(order_id, correlation_id).await?;
        Ok((order, correlation_id))
    }

    /// Marks an order failed, e.g. after its job exhausted every attempt.
    /// Partial progress is left in place.
    #[tracing::instrument(skip(self))]
    pub async fn fail_order(
        &self,
        order_id: OrderId,
        reason: &str,
    ) -> Result<(Order, CorrelationId)> {
        let correlation_id = CorrelationId::new();
        let order = self.machine.get(order_id).await?;
        let order = self
            .machine
            .transition(&order, OrderStatus::Failed, reason, correlation_id)
            .await?;
        Ok((order, correlation_id))
    }
}
