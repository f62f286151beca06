//! Order creation and read-side queries.

use std::collections::HashMap;
use std::sync::Arc;

use common::{CorrelationId, Money, OrderId, Priority, ProductId};
use pubsub::{Channel, EventBus, OrderCreatedPayload, WorkflowEvent};
use queue::{JobOptions, JobQueue};
use rand::Rng;
use store::{Order, OrderLine, OrderStatus, Product, Repository};

use crate::error::{Result, WorkflowError};
use crate::inventory::InventoryLedger;
use crate::pipeline::FulfillmentJob;

const ORDER_NUMBER_SUFFIX_LEN: usize = 6;
const BASE36_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Threshold below which a product counts as low stock.
const LOW_STOCK_THRESHOLD: u32 = 20;

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Input for order creation.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub priority: Priority,
    pub items: Vec<NewOrderItem>,
}

/// Summary counters for dashboards.
#[derive(Debug, Clone)]
pub struct OrderStats {
    pub orders_by_status: HashMap<OrderStatus, usize>,
    pub total_products: usize,
    pub low_stock: usize,
    pub total_inventory: u64,
}

pub struct OrderService<R: Repository> {
    repo: R,
    bus: Arc<EventBus>,
    queue: JobQueue,
    ledger: InventoryLedger<R>,
}

impl<R: Repository> OrderService<R> {
    pub fn new(repo: R, bus: Arc<EventBus>, queue: JobQueue) -> Self {
        let ledger = InventoryLedger::new(repo.clone(), Arc::clone(&bus));
        Self {
            repo,
            bus,
            queue,
            ledger,
        }
    }

    /// Places an order: snapshots prices, reserves stock per line, emits
    /// `order:created`, and enqueues the fulfillment job under a stable
    /// order-derived key.
    ///
    /// One correlation id covers the whole call and rides the job, so the
    /// automated run that follows shares it.
    ///
    /// Line reservations are independent; a failure partway leaves earlier
    /// lines reserved. There is no compensating rollback.
    #[tracing::instrument(skip(self, input), fields(customer = %input.customer_name))]
    pub async fn create(&self, input: NewOrder) -> Result<(Order, CorrelationId)> {
        let correlation_id = CorrelationId::new();

        let mut lines = Vec::with_capacity(input.items.len());
        let mut total = Money::zero();
        for item in &input.items {
            let product = self
                .repo
                .get_product(item.product_id)
                .await?
                .ok_or(WorkflowError::NotFound {
                    entity: "product",
                    id: item.product_id.to_string(),
                })?;
            if product.quantity < item.quantity {
                return Err(WorkflowError::InsufficientStock {
                    sku: product.sku,
                    requested: item.quantity,
                    available: product.quantity,
                });
            }
            total += product.price.multiply(item.quantity);
            lines.push(OrderLine {
                product_id: product.id,
                sku: product.sku,
                name: product.name,
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        let order = self
            .repo
            .insert_order(Order::new(
                generate_order_number(),
                input.customer_name,
                input.customer_email,
                input.priority,
                total,
                lines,
            ))
            .await?;

        for line in &order.lines {
            self.ledger
                .reserve(line.product_id, line.quantity, correlation_id)
                .await?;
        }

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            lines = order.lines.len(),
            "order created"
        );

        self.bus.publish(
            Channel::Tasks,
            WorkflowEvent::OrderCreated(OrderCreatedPayload {
                order_id: order.id,
                order_number: order.order_number.clone(),
                customer_name: order.customer_name.clone(),
                total_amount: order.total_amount,
                item_count: order.lines.len(),
                priority: order.priority,
            }),
            correlation_id,
        );

        self.queue.enqueue(
            format!("order-fulfillment:{}", order.id),
            serde_json::to_value(FulfillmentJob {
                order_id: order.id,
                order_number: order.order_number.clone(),
            })?,
            JobOptions::with_priority(order.priority),
            correlation_id,
        );

        Ok((order, correlation_id))
    }

    /// Loads an order by id.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.repo.get_order(order_id).await?)
    }

    /// Lists orders, optionally filtered by status, newest first.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        Ok(self.repo.list_orders(status).await?)
    }

    /// Lists the product catalog.
    pub async fn products(&self) -> Result<Vec<Product>> {
        Ok(self.repo.list_products().await?)
    }

    /// Returns dashboard counters.
    pub async fn stats(&self) -> Result<OrderStats> {
        let orders_by_status = self.repo.count_orders_by_status().await?;
        let products = self.repo.list_products().await?;

        Ok(OrderStats {
            orders_by_status,
            total_products: products.len(),
            low_stock: products
                .iter()
                .filter(|product| product.quantity < LOW_STOCK_THRESHOLD)
                .count(),
            total_inventory: products
                .iter()
                .map(|product| product.quantity as u64)
                .sum(),
        })
    }
}

/// Generates an order number like `ORD-20260805-K3F9QZ`.
fn generate_order_number() -> String {
    let date = chrono::Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())] as char)
        .collect();
    format!("ORD-{date}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<_> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), ORDER_NUMBER_SUFFIX_LEN);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_order_numbers_vary() {
        assert_ne!(generate_order_number(), generate_order_number());
    }
}
