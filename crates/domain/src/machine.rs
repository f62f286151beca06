//! The order state machine.
//!
//! Owns status transitions: validates that a move is legal, commits it with
//! a compare against the status the caller observed, stamps the stage
//! timestamp (in the store), and emits the matching `order:*` event.

use std::sync::Arc;

use common::{CorrelationId, OrderId};
use pubsub::{Channel, EventBus, OrderStatusPayload, WorkflowEvent};
use store::{Order, OrderStatus, Repository};

use crate::error::{Result, WorkflowError};

pub struct OrderMachine<R: Repository> {
    repo: R,
    bus: Arc<EventBus>,
}

impl<R: Repository> Clone for OrderMachine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<R: Repository> OrderMachine<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        Self { repo, bus }
    }

    /// Loads an order, failing with `NotFound` when absent.
    pub async fn get(&self, order_id: OrderId) -> Result<Order> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    /// Fails unless the order is exactly in `required`.
    pub fn require(order: &Order, required: OrderStatus) -> Result<()> {
        if order.status != required {
            return Err(WorkflowError::InvalidState {
                required: required.to_string(),
                actual: order.status,
            });
        }
        Ok(())
    }

    /// Moves the order to `next` and emits the transition event.
    ///
    /// The commit compares against the status the caller observed, so a
    /// racing driver surfaces as `InvalidState` rather than a silent
    /// double-apply.
    pub async fn transition(
        &self,
        order: &Order,
        next: OrderStatus,
        message: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Result<Order> {
        if !order.status.can_transition_to(next) {
            return Err(WorkflowError::InvalidState {
                required: format!("a state before {next}"),
                actual: order.status,
            });
        }

        let updated = self
            .repo
            .update_order_status(order.id, order.status, next)
            .await?;

        metrics::counter!("order_transitions_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            from = %order.status,
            to = %next,
            "order transition"
        );

        self.emit_transition(&updated, order.status, message.into(), correlation_id);
        Ok(updated)
    }

    /// Publishes the `order:*` event for a committed transition.
    pub fn emit_transition(
        &self,
        order: &Order,
        previous: OrderStatus,
        message: String,
        correlation_id: CorrelationId,
    ) {
        let payload = OrderStatusPayload {
            order_id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            previous_status: previous,
            message,
        };
        if let Some(kind) = status_event(order.status, payload) {
            self.bus.publish(Channel::Tasks, kind, correlation_id);
        }
    }
}

/// Maps an order status to its transition event variant. `Pending` is the
/// creation state and is announced by `order:created` instead.
fn status_event(status: OrderStatus, payload: OrderStatusPayload) -> Option<WorkflowEvent> {
    match status {
        OrderStatus::Pending => None,
        OrderStatus::Processing => Some(WorkflowEvent::OrderProcessing(payload)),
        OrderStatus::Picking => Some(WorkflowEvent::OrderPicking(payload)),
        OrderStatus::Picked => Some(WorkflowEvent::OrderPicked(payload)),
        OrderStatus::Packing => Some(WorkflowEvent::OrderPacking(payload)),
        OrderStatus::Packed => Some(WorkflowEvent::OrderPacked(payload)),
        OrderStatus::Shipped => Some(WorkflowEvent::OrderShipped(payload)),
        OrderStatus::Completed => Some(WorkflowEvent::OrderCompleted(payload)),
        OrderStatus::Failed => Some(WorkflowEvent::OrderFailed(payload)),
    }
}
