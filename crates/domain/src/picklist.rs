//! Pick list manager.

use std::sync::Arc;

use chrono::Utc;
use common::{CorrelationId, OrderId};
use pubsub::{
    Channel, EventBus, OrderStatusPayload, PickItemPayload, PickListCompletedPayload,
    PickListGeneratedPayload, PickListItemSummary, WorkflowEvent,
};
use store::{
    OrderStatus, OrderTransition, PickItem, PickList, PickListStatus, Repository, StoreError,
};

use crate::error::{Result, WorkflowError};
use crate::machine::OrderMachine;

/// Retries for the read-modify-write cycle when another writer races on the
/// same list. A re-read that finds the item already picked surfaces as
/// `ItemNotFound`, which is the correct answer for a duplicate pick.
const CAS_RETRIES: usize = 3;

/// Location recorded when the product has none on file.
const UNKNOWN_LOCATION: &str = "UNKNOWN";

/// Progress of a pick list after one pick.
#[derive(Debug, Clone, Copy)]
pub struct PickProgress {
    pub picked: usize,
    pub total: usize,
    pub all_picked: bool,
}

pub struct PickListManager<R: Repository> {
    repo: R,
    bus: Arc<EventBus>,
    machine: OrderMachine<R>,
}

impl<R: Repository> Clone for PickListManager<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            bus: Arc::clone(&self.bus),
            machine: self.machine.clone(),
        }
    }
}

impl<R: Repository> PickListManager<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        let machine = OrderMachine::new(repo.clone(), Arc::clone(&bus));
        Self { repo, bus, machine }
    }

    /// Builds the pick list for an order from the product snapshot and
    /// advances a pending order to `processing`.
    ///
    /// Emits `order:processing` (when the order was still pending) followed
    /// by `picklist:generated`, both under the caller's correlation id.
    #[tracing::instrument(skip(self))]
    pub async fn generate(&self, order_id: OrderId, correlation_id: CorrelationId) -> Result<PickList> {
        let order = self.machine.get(order_id).await?;
        let order = match order.status {
            OrderStatus::Pending => {
                self.machine
                    .transition(
                        &order,
                        OrderStatus::Processing,
                        "Order received, generating pick list",
                        correlation_id,
                    )
                    .await?
            }
            OrderStatus::Processing => order,
            actual => {
                return Err(WorkflowError::InvalidState {
                    required: "pending or processing".to_string(),
                    actual,
                });
            }
        };

        let mut items = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let location = self
                .repo
                .get_product(line.product_id)
                .await?
                .and_then(|product| product.location)
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
            items.push(PickItem {
                product_id: line.product_id,
                sku: line.sku.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                location,
                picked: false,
            });
        }

        let list = self
            .repo
            .insert_pick_list(PickList::new(order_id, items))
            .await?;

        metrics::counter!("pick_lists_generated_total").increment(1);
        tracing::info!(
            order_number = %order.order_number,
            items = list.items.len(),
            "pick list generated"
        );

        self.bus.publish(
            Channel::Tasks,
            WorkflowEvent::PickListGenerated(PickListGeneratedPayload {
                pick_list_id: list.id,
                order_id,
                order_number: order.order_number.clone(),
                item_count: list.items.len(),
                items: list
                    .items
                    .iter()
                    .map(|item| PickListItemSummary {
                        sku: item.sku.clone(),
                        name: item.name.clone(),
                        quantity: item.quantity,
                        location: item.location.clone(),
                    })
                    .collect(),
            }),
            correlation_id,
        );

        Ok(list)
    }

    /// Marks the first unpicked entry matching `sku` as picked.
    ///
    /// Picking the last open item cascades: the list flips to `completed`
    /// and the order advances to `picked` in the same atomic store commit,
    /// then `picklist:completed` and `order:picked` are emitted under the
    /// same correlation id as the pick itself.
    #[tracing::instrument(skip(self))]
    pub async fn pick_item(
        &self,
        order_id: OrderId,
        sku: &str,
        correlation_id: CorrelationId,
    ) -> Result<PickProgress> {
        let mut last_conflict = None;
        for _ in 0..CAS_RETRIES {
            let order = self.machine.get(order_id).await?;
            let mut list =
                self.repo
                    .latest_pick_list(order_id)
                    .await?
                    .ok_or(WorkflowError::NotFound {
                        entity: "pick list",
                        id: order_id.to_string(),
                    })?;

            let Some(position) = list
                .items
                .iter()
                .position(|item| item.sku == sku && !item.picked)
            else {
                return Err(WorkflowError::ItemNotFound {
                    sku: sku.to_string(),
                });
            };

            list.items[position].picked = true;
            let item = list.items[position].clone();
            let picked = list.picked_count();
            let total = list.items.len();
            let all_picked = picked == total;

            let transition = if all_picked {
                if !order.status.can_transition_to(OrderStatus::Picked) {
                    return Err(WorkflowError::InvalidState {
                        required: "a state before picked".to_string(),
                        actual: order.status,
                    });
                }
                list.status = PickListStatus::Completed;
                list.completed_at = Some(Utc::now());
                Some(OrderTransition {
                    order_id,
                    from: order.status,
                    to: OrderStatus::Picked,
                })
            } else {
                None
            };

            let saved = match self.repo.update_pick_list(list, transition).await {
                Ok(saved) => saved,
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    last_conflict = Some(conflict);
                    continue;
                }
                Err(other) => return Err(other.into()),
            };

            self.bus.publish(
                Channel::Tasks,
                WorkflowEvent::PickItemPicked(PickItemPayload {
                    pick_list_id: saved.id,
                    order_number: order.order_number.clone(),
                    sku: item.sku,
                    name: item.name,
                    quantity: item.quantity,
                    location: item.location,
                    progress: format!("{picked} of {total}"),
                }),
                correlation_id,
            );

            if all_picked {
                metrics::counter!("pick_lists_completed_total").increment(1);
                tracing::info!(order_number = %order.order_number, "pick list completed");

                self.bus.publish(
                    Channel::Tasks,
                    WorkflowEvent::PickListCompleted(PickListCompletedPayload {
                        pick_list_id: saved.id,
                        order_number: order.order_number.clone(),
                        message: format!("All {total} items picked"),
                    }),
                    correlation_id,
                );
                self.bus.publish(
                    Channel::Tasks,
                    WorkflowEvent::OrderPicked(OrderStatusPayload {
                        order_id,
                        order_number: order.order_number.clone(),
                        status: OrderStatus::Picked,
                        previous_status: order.status,
                        message: "All items picked, ready for packing".to_string(),
                    }),
                    correlation_id,
                );
            }

            return Ok(PickProgress {
                picked,
                total,
                all_picked,
            });
        }

        Err(WorkflowError::Store(last_conflict.expect(
            "pick retry loop exited without a version conflict",
        )))
    }
}
