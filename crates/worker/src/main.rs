//! Worker entry point.
//!
//! Seeds the demo catalog, places a few orders, and runs the automated
//! fulfillment pipeline for them, logging every event. Runs until every job
//! has drained or a shutdown signal arrives.

use std::sync::Arc;

use common::Priority;
use domain::{FulfillmentPipeline, NewOrder, NewOrderItem, OrderService};
use pubsub::{Channel, EventBus};
use queue::{JobQueue, QueueConfig, WorkerPool};
use store::seed::demo_products;
use store::{MemoryStore, Repository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{Config, EventArchiver, LoggingSubscriber};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Seed the store and build the bus
    let store = MemoryStore::with_products(demo_products()).await;
    let bus = Arc::new(EventBus::new(config.bus_capacity));
    bus.subscribe(Channel::Tasks, Arc::new(LoggingSubscriber)).await;
    bus.subscribe(Channel::Tasks, Arc::new(EventArchiver::new(store.clone())))
        .await;

    // 4. Queue, pipeline, worker pool
    let queue = JobQueue::new(Arc::clone(&bus), QueueConfig::default());
    let pipeline = Arc::new(FulfillmentPipeline::new(store.clone(), Arc::clone(&bus)));
    let pool = WorkerPool::start(queue.clone(), pipeline, config.concurrency);

    let orders = OrderService::new(store.clone(), Arc::clone(&bus), queue.clone());

    // 5. Place demo orders; each enqueues its own fulfillment job
    let demo_orders = [
        ("Ada Lovelace", Priority::Normal, vec![("WH-001", 2)]),
        (
            "Grace Hopper",
            Priority::High,
            vec![("KB-002", 1), ("MS-003", 2)],
        ),
        (
            "Alan Turing",
            Priority::Critical,
            vec![("MN-004", 1), ("CH-007", 3), ("LP-008", 1)],
        ),
    ];
    for (customer, priority, items) in demo_orders {
        let mut order_items = Vec::new();
        for (sku, quantity) in items {
            let product = store
                .get_product_by_sku(sku)
                .await
                .expect("store unavailable")
                .expect("seeded product missing");
            order_items.push(NewOrderItem {
                product_id: product.id,
                quantity,
            });
        }
        match orders
            .create(NewOrder {
                customer_name: customer.to_string(),
                customer_email: None,
                priority,
                items: order_items,
            })
            .await
        {
            Ok((order, correlation_id)) => {
                tracing::info!(
                    order_number = %order.order_number,
                    %correlation_id,
                    "demo order placed"
                );
            }
            Err(error) => tracing::error!(%error, customer, "failed to place demo order"),
        }
    }

    // 6. Run until the queue drains or a signal arrives
    tokio::select! {
        () = queue.wait_idle() => {
            tracing::info!("all fulfillment jobs drained");
        }
        () = shutdown_signal() => {}
    }

    pool.shutdown().await;
    bus.shutdown().await;

    if let Ok(stats) = orders.stats().await {
        tracing::info!(
            orders = ?stats.orders_by_status,
            products = stats.total_products,
            low_stock = stats.low_stock,
            units_on_hand = stats.total_inventory,
            "final state"
        );
    }

    tracing::info!("worker shut down cleanly");
}
