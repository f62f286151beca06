//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CorrelationId, OrderId, ProductId};
use tokio::sync::RwLock;

use crate::entities::{EventRecord, Order, PackingTask, PickList, Product, ShippingLabel};
use crate::error::{Result, StoreError};
use crate::repository::{OrderTransition, Repository, StockChange};
use crate::status::OrderStatus;

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    // Kept in insertion order so "latest for order" is a reverse scan.
    pick_lists: Vec<PickList>,
    packing_tasks: Vec<PackingTask>,
    labels: Vec<ShippingLabel>,
    events: Vec<EventRecord>,
}

/// In-memory [`Repository`] implementation.
///
/// All invariants (stock never negative, CAS on list versions, one label per
/// order) are enforced under a single write lock, which is the serialization
/// point the workflow layer relies on for concurrent item mutations.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with the given products.
    pub async fn with_products(products: Vec<Product>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for product in products {
                state.products.insert(product.id, product);
            }
        }
        store
    }
}

fn apply_status(order: &mut Order, status: OrderStatus) {
    order.status = status;
    let now = Utc::now();
    match status {
        OrderStatus::Processing => order.processed_at = Some(now),
        OrderStatus::Picked => order.picked_at = Some(now),
        OrderStatus::Packed => order.packed_at = Some(now),
        OrderStatus::Shipped => order.shipped_at = Some(now),
        OrderStatus::Completed => order.completed_at = Some(now),
        OrderStatus::Failed => order.failed_at = Some(now),
        OrderStatus::Pending | OrderStatus::Picking | OrderStatus::Packing => {}
    }
}

fn transition_order(state: &mut State, transition: OrderTransition) -> Result<()> {
    let order = state
        .orders
        .get_mut(&transition.order_id)
        .ok_or(StoreError::NotFound {
            entity: "order",
            id: transition.order_id.to_string(),
        })?;
    if order.status != transition.from {
        return Err(StoreError::StatusConflict {
            order: transition.order_id,
            expected: transition.from,
            actual: order.status,
        });
    }
    apply_status(order, transition.to);
    Ok(())
}

#[async_trait]
impl Repository for MemoryStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<StockChange> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "product",
            id: id.to_string(),
        })?;

        if product.quantity < quantity {
            return Err(StoreError::InsufficientStock {
                sku: product.sku.clone(),
                requested: quantity,
                available: product.quantity,
            });
        }

        let previous_quantity = product.quantity;
        product.quantity -= quantity;
        product.reserved += quantity;

        Ok(StockChange {
            product: product.clone(),
            previous_quantity,
        })
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "product",
            id: id.to_string(),
        })?;

        if product.reserved < quantity {
            return Err(StoreError::ReleaseExceedsReserved {
                sku: product.sku.clone(),
                requested: quantity,
                reserved: product.reserved,
            });
        }

        product.reserved -= quantity;
        Ok(product.clone())
    }

    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| status.is_none_or(|s| order.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        transition_order(
            &mut state,
            OrderTransition {
                order_id: id,
                from: expected,
                to: status,
            },
        )?;
        Ok(state.orders[&id].clone())
    }

    async fn count_orders_by_status(&self) -> Result<HashMap<OrderStatus, usize>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for order in state.orders.values() {
            *counts.entry(order.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_pick_list(&self, list: PickList) -> Result<PickList> {
        let mut state = self.state.write().await;
        state.pick_lists.push(list.clone());
        Ok(list)
    }

    async fn latest_pick_list(&self, order_id: OrderId) -> Result<Option<PickList>> {
        let state = self.state.read().await;
        Ok(state
            .pick_lists
            .iter()
            .rev()
            .find(|list| list.order_id == order_id)
            .cloned())
    }

    async fn update_pick_list(
        &self,
        mut list: PickList,
        transition: Option<OrderTransition>,
    ) -> Result<PickList> {
        let mut state = self.state.write().await;

        let stored_version = state
            .pick_lists
            .iter()
            .find(|stored| stored.id == list.id)
            .map(|stored| stored.version)
            .ok_or(StoreError::NotFound {
                entity: "pick list",
                id: list.id.to_string(),
            })?;
        if stored_version != list.version {
            return Err(StoreError::VersionConflict {
                entity: "pick list",
                id: list.id.to_string(),
                expected: list.version,
                actual: stored_version,
            });
        }

        if let Some(transition) = transition {
            transition_order(&mut state, transition)?;
        }

        list.version += 1;
        let slot = state
            .pick_lists
            .iter_mut()
            .find(|stored| stored.id == list.id)
            .expect("pick list disappeared under write lock");
        *slot = list.clone();
        Ok(list)
    }

    async fn insert_packing_task(&self, task: PackingTask) -> Result<PackingTask> {
        let mut state = self.state.write().await;
        state.packing_tasks.push(task.clone());
        Ok(task)
    }

    async fn latest_packing_task(&self, order_id: OrderId) -> Result<Option<PackingTask>> {
        let state = self.state.read().await;
        Ok(state
            .packing_tasks
            .iter()
            .rev()
            .find(|task| task.order_id == order_id)
            .cloned())
    }

    async fn update_packing_task(
        &self,
        mut task: PackingTask,
        transition: Option<OrderTransition>,
    ) -> Result<PackingTask> {
        let mut state = self.state.write().await;

        let stored_version = state
            .packing_tasks
            .iter()
            .find(|stored| stored.id == task.id)
            .map(|stored| stored.version)
            .ok_or(StoreError::NotFound {
                entity: "packing task",
                id: task.id.to_string(),
            })?;
        if stored_version != task.version {
            return Err(StoreError::VersionConflict {
                entity: "packing task",
                id: task.id.to_string(),
                expected: task.version,
                actual: stored_version,
            });
        }

        if let Some(transition) = transition {
            transition_order(&mut state, transition)?;
        }

        task.version += 1;
        let slot = state
            .packing_tasks
            .iter_mut()
            .find(|stored| stored.id == task.id)
            .expect("packing task disappeared under write lock");
        *slot = task.clone();
        Ok(task)
    }

    async fn insert_label(&self, label: ShippingLabel) -> Result<ShippingLabel> {
        let mut state = self.state.write().await;

        if state.labels.iter().any(|l| l.order_id == label.order_id) {
            return Err(StoreError::DuplicateLabel(label.order_id));
        }
        if state
            .labels
            .iter()
            .any(|l| l.tracking_number == label.tracking_number)
        {
            return Err(StoreError::DuplicateTrackingNumber(label.tracking_number));
        }

        state.labels.push(label.clone());
        Ok(label)
    }

    async fn get_label_for_order(&self, order_id: OrderId) -> Result<Option<ShippingLabel>> {
        let state = self.state.read().await;
        Ok(state
            .labels
            .iter()
            .find(|label| label.order_id == order_id)
            .cloned())
    }

    async fn insert_event(&self, record: EventRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.events.push(record);
        Ok(())
    }

    async fn events_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<EventRecord>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|record| record.correlation_id == correlation_id)
            .cloned()
            .collect())
    }
}
