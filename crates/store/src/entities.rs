//! Entity records persisted by the store.

use chrono::{DateTime, Utc};
use common::{
    CorrelationId, LabelId, Money, OrderId, PackingTaskId, PickListId, Priority, ProductId,
};
use serde::{Deserialize, Serialize};

use crate::status::{OrderStatus, PackingStatus, PickListStatus};

/// A product in the warehouse catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Current unit price. Order lines snapshot it at creation time.
    pub price: Money,
    /// Units available for new reservations.
    pub quantity: u32,
    /// Units held for open orders, released on shipment.
    pub reserved: u32,
    /// Warehouse bin location, e.g. `A-1-01`.
    pub location: Option<String>,
}

impl Product {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
        location: Option<String>,
    ) -> Self {
        Self {
            id: ProductId::new(),
            sku: sku.into(),
            name: name.into(),
            description: None,
            price,
            quantity,
            reserved: 0,
            location,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A line of an order.
///
/// The SKU, name, and unit price are snapshots captured when the order was
/// placed, not live references into the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer order.
///
/// `status` is the single source of truth for the workflow stage. Orders are
/// never deleted; `completed` and `failed` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable number, e.g. `ORD-20260805-K3F9QZ`.
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub priority: Priority,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub picked_at: Option<DateTime<Utc>>,
    pub packed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        order_number: impl Into<String>,
        customer_name: impl Into<String>,
        customer_email: Option<String>,
        priority: Priority,
        total_amount: Money,
        lines: Vec<OrderLine>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            order_number: order_number.into(),
            customer_name: customer_name.into(),
            customer_email,
            priority,
            status: OrderStatus::Pending,
            total_amount,
            lines,
            created_at: Utc::now(),
            processed_at: None,
            picked_at: None,
            packed_at: None,
            shipped_at: None,
            completed_at: None,
            failed_at: None,
        }
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// One SKU to fetch from a warehouse location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Bin location; `"UNKNOWN"` when the product has none on file.
    pub location: String,
    pub picked: bool,
}

/// Per-order checklist of items to pick.
///
/// At most one active list per order; lookups take the most recently created
/// one. The `version` field is the store's compare-and-swap token for
/// item-level mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickList {
    pub id: PickListId,
    pub order_id: OrderId,
    pub items: Vec<PickItem>,
    pub status: PickListStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PickList {
    pub fn new(order_id: OrderId, items: Vec<PickItem>) -> Self {
        Self {
            id: PickListId::new(),
            order_id,
            items,
            status: PickListStatus::InProgress,
            version: 0,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    /// Number of items already picked.
    pub fn picked_count(&self) -> usize {
        self.items.iter().filter(|item| item.picked).count()
    }

    /// Returns true when every item has been picked.
    pub fn all_picked(&self) -> bool {
        self.items.iter().all(|item| item.picked)
    }
}

/// One SKU to verify while packing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub verified: bool,
}

/// Parcel dimensions in inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.length, self.width, self.height)
    }
}

/// Per-order checklist of items to verify while packing, plus the final
/// parcel weight and dimensions once completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingTask {
    pub id: PackingTaskId,
    pub order_id: OrderId,
    pub items: Vec<PackItem>,
    pub status: PackingStatus,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PackingTask {
    pub fn new(order_id: OrderId, items: Vec<PackItem>) -> Self {
        Self {
            id: PackingTaskId::new(),
            order_id,
            items,
            status: PackingStatus::InProgress,
            weight: None,
            dimensions: None,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Number of items already verified.
    pub fn verified_count(&self) -> usize {
        self.items.iter().filter(|item| item.verified).count()
    }

    /// Returns true when every item has been verified.
    pub fn all_verified(&self) -> bool {
        self.items.iter().all(|item| item.verified)
    }
}

/// A shipping label minted for a packed order. Exactly one per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingLabel {
    pub id: LabelId,
    pub order_id: OrderId,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub rate: Money,
    pub estimated_days: u32,
    pub label_url: String,
    pub created_at: DateTime<Utc>,
}

/// Audit row for a published event, queryable by correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub correlation_id: CorrelationId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, cents: i64) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(),
            sku: "WH-001".to_string(),
            name: "Wireless Headphones".to_string(),
            quantity,
            unit_price: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_order_line_total() {
        assert_eq!(line(2, 7999).total_price().cents(), 15998);
    }

    #[test]
    fn test_order_total_quantity() {
        let order = Order::new(
            "ORD-1",
            "Ada",
            None,
            Priority::Normal,
            Money::zero(),
            vec![line(2, 100), line(3, 100)],
        );
        assert_eq!(order.total_quantity(), 5);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_pick_list_progress() {
        let mut list = PickList::new(
            OrderId::new(),
            vec![
                PickItem {
                    product_id: ProductId::new(),
                    sku: "WH-001".to_string(),
                    name: "Wireless Headphones".to_string(),
                    quantity: 2,
                    location: "A-1-01".to_string(),
                    picked: false,
                },
                PickItem {
                    product_id: ProductId::new(),
                    sku: "KB-002".to_string(),
                    name: "Mechanical Keyboard".to_string(),
                    quantity: 1,
                    location: "A-1-02".to_string(),
                    picked: false,
                },
            ],
        );
        assert_eq!(list.picked_count(), 0);
        assert!(!list.all_picked());

        list.items[0].picked = true;
        assert_eq!(list.picked_count(), 1);

        list.items[1].picked = true;
        assert!(list.all_picked());
    }

    #[test]
    fn test_dimensions_display() {
        let dims = Dimensions {
            length: 10,
            width: 8,
            height: 4,
        };
        assert_eq!(dims.to_string(), "10x8x4");
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let order = Order::new(
            "ORD-20260805-ABCDEF",
            "Ada",
            Some("ada@example.com".to_string()),
            Priority::High,
            Money::from_cents(15998),
            vec![line(2, 7999)],
        );
        let json = serde_json::to_string(&order).unwrap();
        let parsed: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, parsed);
    }
}
