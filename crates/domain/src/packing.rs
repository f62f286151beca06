//! Packing manager.

use std::sync::Arc;

use chrono::Utc;
use common::{CorrelationId, OrderId};
use pubsub::{
    Channel, EventBus, OrderStatusPayload, PackingPayload, PackingProgressPayload, WorkflowEvent,
};
use store::{
    Dimensions, OrderStatus, OrderTransition, PackItem, PackingStatus, PackingTask, Repository,
    StoreError,
};

use crate::error::{Result, WorkflowError};
use crate::machine::OrderMachine;

const CAS_RETRIES: usize = 3;

/// Whether packing completion checks that every item was verified.
///
/// Off by default: a supervisor can force-complete a task with unverified
/// items, mirroring warehouse practice. Turn it on to make completion fail
/// with `PackingIncomplete` instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackingPolicy {
    pub require_full_verification: bool,
}

/// Progress of a packing task after one verification.
#[derive(Debug, Clone, Copy)]
pub struct PackProgress {
    pub verified: usize,
    pub total: usize,
    pub all_verified: bool,
}

pub struct PackingManager<R: Repository> {
    repo: R,
    bus: Arc<EventBus>,
    machine: OrderMachine<R>,
    policy: PackingPolicy,
}

impl<R: Repository> Clone for PackingManager<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            bus: Arc::clone(&self.bus),
            machine: self.machine.clone(),
            policy: self.policy,
        }
    }
}

impl<R: Repository> PackingManager<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        let machine = OrderMachine::new(repo.clone(), Arc::clone(&bus));
        Self {
            repo,
            bus,
            machine,
            policy: PackingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PackingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Copies the pick list into a fresh packing task and advances the order
    /// to `packing`.
    ///
    /// Requires the order to be exactly `picked`.
    #[tracing::instrument(skip(self))]
    pub async fn start(
        &self,
        order_id: OrderId,
        correlation_id: CorrelationId,
    ) -> Result<PackingTask> {
        let order = self.machine.get(order_id).await?;
        OrderMachine::<R>::require(&order, OrderStatus::Picked)?;

        let list = self
            .repo
            .latest_pick_list(order_id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: "pick list",
                id: order_id.to_string(),
            })?;

        let items = list
            .items
            .iter()
            .map(|item| PackItem {
                product_id: item.product_id,
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                verified: false,
            })
            .collect();

        let task = self
            .repo
            .insert_packing_task(PackingTask::new(order_id, items))
            .await?;

        metrics::counter!("packing_tasks_started_total").increment(1);
        tracing::info!(order_number = %order.order_number, items = task.items.len(), "packing started");

        self.bus.publish(
            Channel::Tasks,
            WorkflowEvent::PackingStarted(PackingPayload {
                packing_task_id: task.id,
                order_number: order.order_number.clone(),
                status: task.status,
                weight: None,
                dimensions: None,
            }),
            correlation_id,
        );

        self.machine
            .transition(&order, OrderStatus::Packing, "Packing started", correlation_id)
            .await?;

        Ok(task)
    }

    /// Marks the first unverified entry matching `sku` as verified.
    ///
    /// Unlike picking, verifying the last item does not cascade anywhere;
    /// finalization is a distinct explicit step.
    #[tracing::instrument(skip(self))]
    pub async fn verify_item(
        &self,
        order_id: OrderId,
        sku: &str,
        correlation_id: CorrelationId,
    ) -> Result<PackProgress> {
        let mut last_conflict = None;
        for _ in 0..CAS_RETRIES {
            let order = self.machine.get(order_id).await?;
            let mut task = self
                .repo
                .latest_packing_task(order_id)
                .await?
                .ok_or(WorkflowError::NotFound {
                    entity: "packing task",
                    id: order_id.to_string(),
                })?;

            let Some(position) = task
                .items
                .iter()
                .position(|item| item.sku == sku && !item.verified)
            else {
                return Err(WorkflowError::ItemNotFound {
                    sku: sku.to_string(),
                });
            };

            task.items[position].verified = true;
            let item = task.items[position].clone();
            let verified = task.verified_count();
            let total = task.items.len();

            let saved = match self.repo.update_packing_task(task, None).await {
                Ok(saved) => saved,
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    last_conflict = Some(conflict);
                    continue;
                }
                Err(other) => return Err(other.into()),
            };

            self.bus.publish(
                Channel::Tasks,
                WorkflowEvent::PackingItemVerified(PackingProgressPayload {
                    packing_task_id: saved.id,
                    order_number: order.order_number.clone(),
                    sku: item.sku,
                    name: item.name,
                    progress: format!("{verified} of {total} verified"),
                }),
                correlation_id,
            );

            return Ok(PackProgress {
                verified,
                total,
                all_verified: verified == total,
            });
        }

        Err(WorkflowError::Store(last_conflict.expect(
            "verify retry loop exited without a version conflict",
        )))
    }

    /// Records the parcel weight and dimensions, completes the task, and
    /// advances the order to `packed` in the same atomic commit.
    ///
    /// Emits `packing:completed` then `order:packed`.
    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        order_id: OrderId,
        weight: f64,
        dimensions: Dimensions,
        correlation_id: CorrelationId,
    ) -> Result<PackingTask> {
        let mut last_conflict = None;
        for _ in 0..CAS_RETRIES {
            let order = self.machine.get(order_id).await?;
            let mut task = self
                .repo
                .latest_packing_task(order_id)
                .await?
                .ok_or(WorkflowError::NotFound {
                    entity: "packing task",
                    id: order_id.to_string(),
                })?;

            if self.policy.require_full_verification && !task.all_verified() {
                return Err(WorkflowError::PackingIncomplete {
                    verified: task.verified_count(),
                    total: task.items.len(),
                });
            }

            if !order.status.can_transition_to(OrderStatus::Packed) {
                return Err(WorkflowError::InvalidState {
                    required: "a state before packed".to_string(),
                    actual: order.status,
                });
            }

            task.status = PackingStatus::Completed;
            task.weight = Some(weight);
            task.dimensions = Some(dimensions);
            task.completed_at = Some(Utc::now());

            let transition = OrderTransition {
                order_id,
                from: order.status,
                to: OrderStatus::Packed,
            };
            let saved = match self.repo.update_packing_task(task, Some(transition)).await {
                Ok(saved) => saved,
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    last_conflict = Some(conflict);
                    continue;
                }
                Err(other) => return Err(other.into()),
            };

            metrics::counter!("packing_tasks_completed_total").increment(1);
            tracing::info!(
                order_number = %order.order_number,
                weight,
                dimensions = %dimensions,
                "packing completed"
            );

            self.bus.publish(
                Channel::Tasks,
                WorkflowEvent::PackingCompleted(PackingPayload {
                    packing_task_id: saved.id,
                    order_number: order.order_number.clone(),
                    status: saved.status,
                    weight: saved.weight,
                    dimensions: saved.dimensions,
                }),
                correlation_id,
            );
            self.bus.publish(
                Channel::Tasks,
                WorkflowEvent::OrderPacked(OrderStatusPayload {
                    order_id,
                    order_number: order.order_number.clone(),
                    status: OrderStatus::Packed,
                    previous_status: order.status,
                    message: format!("Packed: {weight}lbs ({dimensions}in)"),
                }),
                correlation_id,
            );

            return Ok(saved);
        }

        Err(WorkflowError::Store(last_conflict.expect(
            "complete retry loop exited without a version conflict",
        )))
    }
}
