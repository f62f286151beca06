//! End-to-end tests for the automated driver running inside the worker pool.

use std::sync::Arc;

use common::{CorrelationId, Priority};
use domain::{FulfillmentPipeline, FulfillmentService, NewOrder, NewOrderItem, OrderService};
use pubsub::{Channel, EventBus, RecordingSubscriber};
use queue::{JobOptions, JobQueue, JobStatus, QueueConfig, WorkerPool};
use store::seed::demo_products;
use store::{Dimensions, MemoryStore, Order, OrderStatus, Repository};
use worker::EventArchiver;

struct Harness {
    store: MemoryStore,
    bus: Arc<EventBus>,
    recorder: Arc<RecordingSubscriber>,
    queue: JobQueue,
    orders: OrderService<MemoryStore>,
}

async fn harness() -> Harness {
    let store = MemoryStore::with_products(demo_products()).await;
    let bus = Arc::new(EventBus::new(1024));
    let recorder = Arc::new(RecordingSubscriber::new());
    bus.subscribe(Channel::Tasks, recorder.clone()).await;
    bus.subscribe(Channel::Tasks, Arc::new(EventArchiver::new(store.clone())))
        .await;

    let queue = JobQueue::new(Arc::clone(&bus), QueueConfig::default());
    let orders = OrderService::new(store.clone(), Arc::clone(&bus), queue.clone());

    Harness {
        store,
        bus,
        recorder,
        queue,
        orders,
    }
}

fn start_pool(h: &Harness, concurrency: usize) -> WorkerPool {
    let pipeline = Arc::new(FulfillmentPipeline::new(
        h.store.clone(),
        Arc::clone(&h.bus),
    ));
    WorkerPool::start(h.queue.clone(), pipeline, concurrency)
}

async fn place_order(h: &Harness, sku: &str, quantity: u32) -> (Order, CorrelationId) {
    let product = h
        .store
        .get_product_by_sku(sku)
        .await
        .unwrap()
        .expect("seeded product missing");
    h.orders
        .create(NewOrder {
            customer_name: "Ada Lovelace".to_string(),
            customer_email: None,
            priority: Priority::Normal,
            items: vec![NewOrderItem {
                product_id: product.id,
                quantity,
            }],
        })
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn automated_run_fulfills_the_order_end_to_end() {
    let h = harness().await;
    let pool = start_pool(&h, 3);

    let (order, correlation_id) = place_order(&h, "WH-001", 2).await;

    h.queue.wait_idle().await;
    pool.shutdown().await;
    h.bus.flush().await;

    // Order reached the terminal happy state with every stage stamped.
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert!(stored.processed_at.is_some());
    assert!(stored.picked_at.is_some());
    assert!(stored.packed_at.is_some());
    assert!(stored.shipped_at.is_some());
    assert!(stored.completed_at.is_some());

    // Stock: still decremented, nothing left reserved.
    let product = h.store.get_product_by_sku("WH-001").await.unwrap().unwrap();
    assert_eq!(product.quantity, 148);
    assert_eq!(product.reserved, 0);

    // A label exists and shipping released the reservation exactly once.
    let label = h
        .store
        .get_label_for_order(order.id)
        .await
        .unwrap()
        .expect("label missing");
    assert!(!label.tracking_number.is_empty());

    // The job completed on its first attempt with milestone progress.
    let completions = h.recorder.of_type("task:completed");
    assert_eq!(completions.len(), 1);
    let job = h
        .queue
        .get_job(match &completions[0].kind {
            pubsub::WorkflowEvent::TaskCompleted(payload) => payload.task_id,
            other => panic!("unexpected event {}", other.event_type()),
        })
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.progress, 100);
    for milestone in [10, 20, 50, 75, 90, 100] {
        assert!(
            job.progress_history.contains(&milestone),
            "missing progress milestone {milestone} in {:?}",
            job.progress_history
        );
    }
    assert!(
        job.progress_history.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress must never regress: {:?}",
        job.progress_history
    );

    // Every event of the run carries the order's correlation id.
    let events = h.recorder.events();
    assert!(!events.is_empty());
    for event in &events {
        assert_eq!(
            event.correlation_id,
            correlation_id,
            "event {} broke correlation",
            event.event_type()
        );
    }

    // Order transitions were observed in forward sequence.
    let order_sequence: Vec<&str> = events
        .iter()
        .map(|event| event.event_type())
        .filter(|event_type| event_type.starts_with("order:"))
        .collect();
    assert_eq!(
        order_sequence,
        vec![
            "order:created",
            "order:processing",
            "order:picking",
            "order:picked",
            "order:packing",
            "order:packed",
            "order:shipped",
            "order:completed",
        ]
    );

    // Sub-workflow events all fired exactly once for a one-line order.
    for event_type in [
        "picklist:generated",
        "picklist:item_picked",
        "picklist:completed",
        "packing:started",
        "packing:item_verified",
        "packing:completed",
        "shipping:label_created",
    ] {
        assert_eq!(
            h.recorder.of_type(event_type).len(),
            1,
            "expected exactly one {event_type}"
        );
    }

    // The archiver persisted the same stream into the audit trail.
    let archived = h.store.events_by_correlation(correlation_id).await.unwrap();
    assert_eq!(archived.len(), events.len());
}

#[tokio::test(start_paused = true)]
async fn duplicate_fulfillment_enqueue_is_a_no_op() {
    let h = harness().await;

    let (order, correlation_id) = place_order(&h, "MS-003", 1).await;

    // A second enqueue under the order's stable key while the job is live
    // returns the existing job.
    let key = format!("order-fulfillment:{}", order.id);
    let duplicate = h.queue.enqueue(
        key,
        serde_json::json!({
            "orderId": order.id,
            "orderNumber": order.order_number,
        }),
        JobOptions::with_priority(order.priority),
        correlation_id,
    );

    let pool = start_pool(&h, 2);
    h.queue.wait_idle().await;
    pool.shutdown().await;
    h.bus.flush().await;

    // One run happened, not two: a single pick list, a single label.
    assert_eq!(
        h.recorder.of_type("picklist:generated").len(),
        1,
        "dedup must prevent a second run"
    );
    let job = h.queue.get_job(duplicate).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(h.recorder.of_type("task:created").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_leave_the_order_mid_pipeline() {
    let h = harness().await;

    let (order, _) = place_order(&h, "KB-002", 1).await;

    // Sabotage the final stage: drop the reservation behind the pipeline's
    // back so the release during shipping fails.
    let product = h.store.get_product_by_sku("KB-002").await.unwrap().unwrap();
    h.store.release_stock(product.id, 1).await.unwrap();

    let pool = start_pool(&h, 1);
    h.queue.wait_idle().await;
    pool.shutdown().await;
    h.bus.flush().await;

    // The first attempt got as far as `shipped`; the retries failed cleanly
    // at the state layer without re-running earlier side effects, and the
    // order is left mid-pipeline.
    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);

    let failures = h.recorder.of_type("task:failed");
    assert_eq!(failures.len(), 3, "one failure event per attempt");

    let task_id = match &failures[0].kind {
        pubsub::WorkflowEvent::TaskFailed(payload) => payload.task_id,
        other => panic!("unexpected event {}", other.event_type()),
    };
    let job = h.queue.get_job(task_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);

    // Exactly one pick list was generated: the retried attempts failed
    // before repeating any stage.
    assert_eq!(h.recorder.of_type("picklist:generated").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_and_automated_drivers_reach_the_same_end_state() {
    let h = harness().await;
    let manual = FulfillmentService::new(h.store.clone(), Arc::clone(&h.bus));

    // Automated order.
    let (automated_order, _) = place_order(&h, "WC-005", 2).await;
    let pool = start_pool(&h, 2);
    h.queue.wait_idle().await;
    pool.shutdown().await;

    // Manual order with the same line, walked stage by stage. Its queued
    // job is ignored: no pool is running anymore, and the manual driver
    // advances the same machine by hand.
    let product = h.store.get_product_by_sku("PB-010").await.unwrap().unwrap();
    let (manual_order, _) = h
        .orders
        .create(NewOrder {
            customer_name: "Grace Hopper".to_string(),
            customer_email: None,
            priority: Priority::Normal,
            items: vec![NewOrderItem {
                product_id: product.id,
                quantity: 2,
            }],
        })
        .await
        .unwrap();

    manual.generate_pick_list(manual_order.id).await.unwrap();
    manual.pick_item(manual_order.id, "PB-010").await.unwrap();
    manual.start_packing(manual_order.id).await.unwrap();
    manual.verify_item(manual_order.id, "PB-010").await.unwrap();
    manual
        .complete_packing(
            manual_order.id,
            4.5,
            Dimensions {
                length: 12,
                width: 9,
                height: 5,
            },
        )
        .await
        .unwrap();
    manual.create_label(manual_order.id, Some(0)).await.unwrap();
    manual.ship_order(manual_order.id).await.unwrap();

    // Both drivers finish in the identical terminal state with inventory
    // fully released and a label on file.
    for (order_id, sku) in [(automated_order.id, "WC-005"), (manual_order.id, "PB-010")] {
        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.shipped_at.is_some());
        assert!(order.completed_at.is_some());

        let product = h.store.get_product_by_sku(sku).await.unwrap().unwrap();
        assert_eq!(product.reserved, 0);

        assert!(
            h.store
                .get_label_for_order(order_id)
                .await
                .unwrap()
                .is_some()
        );
    }
}
