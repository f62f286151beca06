//! The repository contract consumed by the workflow layer.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{CorrelationId, OrderId, ProductId};

use crate::entities::{EventRecord, Order, PackingTask, PickList, Product, ShippingLabel};
use crate::error::Result;
use crate::status::OrderStatus;

/// Result of an atomic stock reservation.
#[derive(Debug, Clone)]
pub struct StockChange {
    /// The product after the mutation.
    pub product: Product,
    /// Available quantity before the mutation.
    pub previous_quantity: u32,
}

/// An order status change committed atomically with a list update.
///
/// `from` is the status the caller observed; the store rejects the commit
/// with [`StoreError::StatusConflict`](crate::StoreError::StatusConflict)
/// if the order has moved since.
#[derive(Debug, Clone, Copy)]
pub struct OrderTransition {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// CRUD and status-update operations per entity.
///
/// List updates (`update_pick_list`, `update_packing_task`) are
/// compare-and-swap on the record `version`: the caller passes back the
/// record it read, and the store rejects the write if another writer got
/// there first. Passing an [`OrderTransition`] commits the order status
/// change in the same critical section, so observers never see a completed
/// list without the matching order stage.
#[async_trait]
pub trait Repository: Clone + Send + Sync + 'static {
    // Products

    async fn insert_product(&self, product: Product) -> Result<Product>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;
    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>>;
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Atomically moves `quantity` units from available to reserved.
    ///
    /// Fails without mutation when fewer than `quantity` units are available.
    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<StockChange>;

    /// Atomically decrements the reserved count by `quantity`.
    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product>;

    // Orders

    async fn insert_order(&self, order: Order) -> Result<Order>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>>;

    /// Sets the order status and stamps the matching stage timestamp.
    ///
    /// `expected` is the status the caller observed; a mismatch fails with
    /// `StatusConflict` and leaves the order untouched.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order>;

    async fn count_orders_by_status(&self) -> Result<HashMap<OrderStatus, usize>>;

    // Pick lists

    async fn insert_pick_list(&self, list: PickList) -> Result<PickList>;
    async fn latest_pick_list(&self, order_id: OrderId) -> Result<Option<PickList>>;
    async fn update_pick_list(
        &self,
        list: PickList,
        transition: Option<OrderTransition>,
    ) -> Result<PickList>;

    // Packing tasks

    async fn insert_packing_task(&self, task: PackingTask) -> Result<PackingTask>;
    async fn latest_packing_task(&self, order_id: OrderId) -> Result<Option<PackingTask>>;
    async fn update_packing_task(
        &self,
        task: PackingTask,
        transition: Option<OrderTransition>,
    ) -> Result<PackingTask>;

    // Shipping labels

    /// Inserts a label, enforcing one label per order and globally unique
    /// tracking numbers.
    async fn insert_label(&self, label: ShippingLabel) -> Result<ShippingLabel>;
    async fn get_label_for_order(&self, order_id: OrderId) -> Result<Option<ShippingLabel>>;

    // Event audit trail

    async fn insert_event(&self, record: EventRecord) -> Result<()>;
    async fn events_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<EventRecord>>;
}
