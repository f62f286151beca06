//! The closed event vocabulary.
//!
//! One variant per event type, each carrying its exact payload struct.
//! Field names serialize camelCase because the event JSON is the
//! compatibility surface consumed by dashboards and downstream triggers.

use chrono::{DateTime, Utc};
use common::{CorrelationId, JobId, LabelId, Money, OrderId, PackingTaskId, PickListId, Priority, ProductId};
use serde::{Deserialize, Serialize};
use store::{Dimensions, OrderStatus, PackingStatus};

/// Every event type the system can publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WorkflowEvent {
    #[serde(rename = "order:created")]
    OrderCreated(OrderCreatedPayload),
    #[serde(rename = "order:processing")]
    OrderProcessing(OrderStatusPayload),
    #[serde(rename = "order:picking")]
    OrderPicking(OrderStatusPayload),
    #[serde(rename = "order:picked")]
    OrderPicked(OrderStatusPayload),
    #[serde(rename = "order:packing")]
    OrderPacking(OrderStatusPayload),
    #[serde(rename = "order:packed")]
    OrderPacked(OrderStatusPayload),
    #[serde(rename = "order:shipped")]
    OrderShipped(OrderStatusPayload),
    #[serde(rename = "order:completed")]
    OrderCompleted(OrderStatusPayload),
    #[serde(rename = "order:failed")]
    OrderFailed(OrderStatusPayload),
    #[serde(rename = "inventory:updated")]
    InventoryUpdated(InventoryUpdatePayload),
    #[serde(rename = "picklist:generated")]
    PickListGenerated(PickListGeneratedPayload),
    #[serde(rename = "picklist:item_picked")]
    PickItemPicked(PickItemPayload),
    #[serde(rename = "picklist:completed")]
    PickListCompleted(PickListCompletedPayload),
    #[serde(rename = "packing:started")]
    PackingStarted(PackingPayload),
    #[serde(rename = "packing:item_verified")]
    PackingItemVerified(PackingProgressPayload),
    #[serde(rename = "packing:completed")]
    PackingCompleted(PackingPayload),
    #[serde(rename = "shipping:label_created")]
    ShippingLabelCreated(ShippingLabelPayload),
    #[serde(rename = "task:created")]
    TaskCreated(TaskCreatedPayload),
    #[serde(rename = "task:started")]
    TaskStarted(TaskStartedPayload),
    #[serde(rename = "task:completed")]
    TaskCompleted(TaskCompletedPayload),
    #[serde(rename = "task:failed")]
    TaskFailed(TaskFailedPayload),
    #[serde(rename = "job:progress")]
    JobProgress(JobProgressPayload),
}

impl WorkflowEvent {
    /// Returns the wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::OrderCreated(_) => "order:created",
            WorkflowEvent::OrderProcessing(_) => "order:processing",
            WorkflowEvent::OrderPicking(_) => "order:picking",
            WorkflowEvent::OrderPicked(_) => "order:picked",
            WorkflowEvent::OrderPacking(_) => "order:packing",
            WorkflowEvent::OrderPacked(_) => "order:packed",
            WorkflowEvent::OrderShipped(_) => "order:shipped",
            WorkflowEvent::OrderCompleted(_) => "order:completed",
            WorkflowEvent::OrderFailed(_) => "order:failed",
            WorkflowEvent::InventoryUpdated(_) => "inventory:updated",
            WorkflowEvent::PickListGenerated(_) => "picklist:generated",
            WorkflowEvent::PickItemPicked(_) => "picklist:item_picked",
            WorkflowEvent::PickListCompleted(_) => "picklist:completed",
            WorkflowEvent::PackingStarted(_) => "packing:started",
            WorkflowEvent::PackingItemVerified(_) => "packing:item_verified",
            WorkflowEvent::PackingCompleted(_) => "packing:completed",
            WorkflowEvent::ShippingLabelCreated(_) => "shipping:label_created",
            WorkflowEvent::TaskCreated(_) => "task:created",
            WorkflowEvent::TaskStarted(_) => "task:started",
            WorkflowEvent::TaskCompleted(_) => "task:completed",
            WorkflowEvent::TaskFailed(_) => "task:failed",
            WorkflowEvent::JobProgress(_) => "job:progress",
        }
    }
}

/// Payload for `order:created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedPayload {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_name: String,
    pub total_amount: Money,
    pub item_count: usize,
    pub priority: Priority,
}

/// Payload shared by every order status transition event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusPayload {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub previous_status: OrderStatus,
    pub message: String,
}

/// Payload for `inventory:updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdatePayload {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub previous_qty: u32,
    pub new_qty: u32,
    pub reserved: u32,
}

/// One line of a `picklist:generated` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickListItemSummary {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub location: String,
}

/// Payload for `picklist:generated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickListGeneratedPayload {
    pub pick_list_id: PickListId,
    pub order_id: OrderId,
    pub order_number: String,
    pub item_count: usize,
    pub items: Vec<PickListItemSummary>,
}

/// Payload for `picklist:item_picked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickItemPayload {
    pub pick_list_id: PickListId,
    pub order_number: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub location: String,
    /// Progress indicator, e.g. `"2 of 3"`.
    pub progress: String,
}

/// Payload for `picklist:completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickListCompletedPayload {
    pub pick_list_id: PickListId,
    pub order_number: String,
    pub message: String,
}

/// Payload for `packing:started` and `packing:completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackingPayload {
    pub packing_task_id: PackingTaskId,
    pub order_number: String,
    pub status: PackingStatus,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
}

/// Payload for `packing:item_verified`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackingProgressPayload {
    pub packing_task_id: PackingTaskId,
    pub order_number: String,
    pub sku: String,
    pub name: String,
    /// Progress indicator, e.g. `"1 of 3 verified"`.
    pub progress: String,
}

/// Payload for `shipping:label_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingLabelPayload {
    pub label_id: LabelId,
    pub order_id: OrderId,
    pub order_number: String,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub rate: Money,
    pub estimated_days: u32,
}

/// Payload for `task:created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedPayload {
    pub task_id: JobId,
    pub name: String,
    pub priority: Priority,
}

/// Payload for `task:started`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStartedPayload {
    pub task_id: JobId,
    pub name: String,
    pub attempt: u32,
}

/// Payload for `task:completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletedPayload {
    pub task_id: JobId,
    pub result: serde_json::Value,
    pub duration_ms: u64,
}

/// Payload for `task:failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailedPayload {
    pub task_id: JobId,
    pub error: String,
    pub attempt: u32,
}

/// Payload for `job:progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressPayload {
    pub job_id: JobId,
    pub progress: u8,
    pub message: Option<String>,
}

/// An event as delivered to subscribers: the typed payload plus the
/// envelope fields shared by every emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub kind: WorkflowEvent,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: CorrelationId,
}

impl Event {
    /// Wraps a workflow event in an envelope stamped with the current time.
    pub fn new(kind: WorkflowEvent, correlation_id: CorrelationId) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            correlation_id,
        }
    }

    /// Returns the wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event() -> WorkflowEvent {
        WorkflowEvent::OrderPicked(OrderStatusPayload {
            order_id: OrderId::new(),
            order_number: "ORD-20260805-ABCDEF".to_string(),
            status: OrderStatus::Picked,
            previous_status: OrderStatus::Processing,
            message: "All items picked, ready for packing".to_string(),
        })
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(status_event().event_type(), "order:picked");
        assert_eq!(
            WorkflowEvent::JobProgress(JobProgressPayload {
                job_id: JobId::new(),
                progress: 50,
                message: None,
            })
            .event_type(),
            "job:progress"
        );
    }

    #[test]
    fn test_envelope_wire_format() {
        let correlation_id = CorrelationId::new();
        let event = Event::new(status_event(), correlation_id);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "order:picked");
        assert_eq!(json["payload"]["status"], "picked");
        assert_eq!(json["payload"]["previousStatus"], "processing");
        assert_eq!(json["correlationId"], correlation_id.to_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let event = Event::new(status_event(), CorrelationId::new());
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn test_payload_field_casing() {
        let payload = InventoryUpdatePayload {
            product_id: ProductId::new(),
            sku: "WH-001".to_string(),
            name: "Wireless Headphones".to_string(),
            previous_qty: 150,
            new_qty: 148,
            reserved: 2,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["previousQty"], 150);
        assert_eq!(json["newQty"], 148);
    }
}
