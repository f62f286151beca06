//! Automated fulfillment driver.
//!
//! Runs every stage of one order inside one queued job: a straight-line
//! sequence of state transitions with simulated per-stage latency and
//! fractional progress reporting. No internal retry; the queue owns retry
//! policy. On a retried run, transitions already past their stage fail
//! cleanly instead of re-running side effects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use pubsub::EventBus;
use queue::{HandlerError, JobContext, JobHandler};
use rand::Rng;
use serde::{Deserialize, Serialize};
use store::{Dimensions, OrderStatus, Repository};
use tokio::time::sleep;

use crate::error::Result;
use crate::machine::OrderMachine;
use crate::packing::PackingManager;
use crate::picklist::PickListManager;
use crate::shipping::ShippingManager;

/// Payload of a fulfillment job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentJob {
    pub order_id: OrderId,
    pub order_number: String,
}

/// Result stored on the job when a run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentOutcome {
    pub order_number: String,
    pub carrier: String,
    pub tracking_number: String,
}

/// Simulated latency per stage. All waits are non-blocking suspensions.
#[derive(Debug, Clone)]
pub struct StageDelays {
    pub processing: Duration,
    pub after_generate: Duration,
    /// Walking to the location and scanning, per item.
    pub per_pick: Duration,
    pub after_picked: Duration,
    pub packing_start: Duration,
    pub per_verify: Duration,
    pub after_packed: Duration,
    pub after_label: Duration,
    pub before_release: Duration,
}

impl Default for StageDelays {
    fn default() -> Self {
        Self {
            processing: Duration::from_millis(800),
            after_generate: Duration::from_millis(1000),
            per_pick: Duration::from_millis(1200),
            after_picked: Duration::from_millis(600),
            packing_start: Duration::from_millis(800),
            per_verify: Duration::from_millis(800),
            after_packed: Duration::from_millis(500),
            after_label: Duration::from_millis(600),
            before_release: Duration::from_millis(400),
        }
    }
}

impl StageDelays {
    /// No simulated latency at all.
    pub fn none() -> Self {
        Self {
            processing: Duration::ZERO,
            after_generate: Duration::ZERO,
            per_pick: Duration::ZERO,
            after_picked: Duration::ZERO,
            packing_start: Duration::ZERO,
            per_verify: Duration::ZERO,
            after_packed: Duration::ZERO,
            after_label: Duration::ZERO,
            before_release: Duration::ZERO,
        }
    }
}

pub struct FulfillmentPipeline<R: Repository> {
    machine: OrderMachine<R>,
    picklist: PickListManager<R>,
    packing: PackingManager<R>,
    shipping: ShippingManager<R>,
    delays: StageDelays,
}

impl<R: Repository> FulfillmentPipeline<R> {
    pub fn new(repo: R, bus: Arc<EventBus>) -> Self {
        Self {
            machine: OrderMachine::new(repo.clone(), Arc::clone(&bus)),
            picklist: PickListManager::new(repo.clone(), Arc::clone(&bus)),
            packing: PackingManager::new(repo.clone(), Arc::clone(&bus)),
            shipping: ShippingManager::new(repo, bus),
            delays: StageDelays::default(),
        }
    }

    pub fn with_delays(mut self, delays: StageDelays) -> Self {
        self.delays = delays;
        self
    }

    /// Runs the full pipeline for one order.
    ///
    /// Coarse progress milestones land at 10/20/50/75/90/100, with
    /// fine-grained per-item increments across the picking (20-45) and
    /// packing (50-70) windows.
    #[tracing::instrument(skip(self, ctx, job), fields(order_number = %job.order_number, attempt = ctx.attempt))]
    pub async fn run(&self, ctx: &JobContext, job: &FulfillmentJob) -> Result<FulfillmentOutcome> {
        let correlation_id = ctx.correlation_id;
        let order_id = job.order_id;
        let run_started = std::time::Instant::now();
        tracing::info!("fulfillment run started");

        // Stage 1: processing.
        let order = self.machine.get(order_id).await?;
        let order = self
            .machine
            .transition(
                &order,
                OrderStatus::Processing,
                "Order received, generating pick list",
                correlation_id,
            )
            .await?;
        ctx.report_progress(10);
        sleep(self.delays.processing).await;

        // Stage 2: generate the pick list.
        let list = self.picklist.generate(order_id, correlation_id).await?;
        ctx.report_progress(20);
        sleep(self.delays.after_generate).await;

        // Stage 3: pick each item. The last pick cascades the order to
        // picked via the manager.
        self.machine
            .transition(
                &order,
                OrderStatus::Picking,
                "Picking in progress",
                correlation_id,
            )
            .await?;
        let total_picks = list.items.len();
        for (index, item) in list.items.iter().enumerate() {
            sleep(self.delays.per_pick).await;
            self.picklist
                .pick_item(order_id, &item.sku, correlation_id)
                .await?;
            let progress = 20.0 + ((index + 1) as f64 / total_picks as f64) * 25.0;
            ctx.report_progress(progress.round() as u8);
        }
        ctx.report_progress(50);
        sleep(self.delays.after_picked).await;

        // Stage 4: pack and verify each item, then finalize with a
        // synthesized weight and dimensions.
        let task = self.packing.start(order_id, correlation_id).await?;
        sleep(self.delays.packing_start).await;
        let total_verifies = task.items.len();
        for (index, item) in task.items.iter().enumerate() {
            sleep(self.delays.per_verify).await;
            self.packing
                .verify_item(order_id, &item.sku, correlation_id)
                .await?;
            let progress = 50.0 + ((index + 1) as f64 / total_verifies as f64) * 20.0;
            ctx.report_progress(progress.round() as u8);
        }
        let weight = synthesize_weight();
        let dimensions = synthesize_dimensions();
        self.packing
            .complete(order_id, weight, dimensions, correlation_id)
            .await?;
        ctx.report_progress(75);
        sleep(self.delays.after_packed).await;

        // Stage 5: mint a label with a random carrier.
        let label = self
            .shipping
            .create_label(order_id, None, correlation_id)
            .await?;
        ctx.report_progress(90);
        sleep(self.delays.after_label).await;

        // Stage 6: ship. Releases reserved inventory and completes the
        // order in the same call.
        sleep(self.delays.before_release).await;
        self.shipping.ship(order_id, correlation_id).await?;
        ctx.report_progress(100);

        metrics::histogram!("fulfillment_duration_seconds")
            .record(run_started.elapsed().as_secs_f64());
        metrics::counter!("fulfillment_runs_completed_total").increment(1);
        tracing::info!(
            carrier = %label.carrier,
            tracking = %label.tracking_number,
            "fulfillment run completed"
        );

        Ok(FulfillmentOutcome {
            order_number: job.order_number.clone(),
            carrier: label.carrier,
            tracking_number: label.tracking_number,
        })
    }
}

#[async_trait]
impl<R: Repository> JobHandler for FulfillmentPipeline<R> {
    async fn handle(&self, ctx: JobContext) -> std::result::Result<serde_json::Value, HandlerError> {
        let job: FulfillmentJob = serde_json::from_value(ctx.payload.clone())?;
        let outcome = self.run(&ctx, &job).await?;
        Ok(serde_json::to_value(outcome)?)
    }
}

/// Parcel weight in pounds, 1.00-11.00, two decimals.
fn synthesize_weight() -> f64 {
    let weight: f64 = rand::thread_rng().gen_range(1.0..11.0);
    (weight * 100.0).round() / 100.0
}

/// Parcel dimensions in inches.
fn synthesize_dimensions() -> Dimensions {
    let mut rng = rand::thread_rng();
    Dimensions {
        length: rng.gen_range(6..26),
        width: rng.gen_range(4..19),
        height: rng.gen_range(2..12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_weight_in_range() {
        for _ in 0..50 {
            let weight = synthesize_weight();
            assert!((1.0..=11.0).contains(&weight));
            // Two decimal places.
            assert!(((weight * 100.0).round() - weight * 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_synthesized_dimensions_in_range() {
        for _ in 0..50 {
            let dims = synthesize_dimensions();
            assert!((6..26).contains(&dims.length));
            assert!((4..19).contains(&dims.width));
            assert!((2..12).contains(&dims.height));
        }
    }

    #[test]
    fn test_job_payload_roundtrip() {
        let job = FulfillmentJob {
            order_id: OrderId::new(),
            order_number: "ORD-20260805-ABCDEF".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert!(value["orderId"].is_string());
        assert_eq!(value["orderNumber"], "ORD-20260805-ABCDEF");
        let parsed: FulfillmentJob = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.order_number, job.order_number);
    }
}
