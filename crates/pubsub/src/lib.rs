//! Event vocabulary and the in-process event bus.
//!
//! Every observable change in the fulfillment workflow is published as a
//! [`WorkflowEvent`] wrapped in an [`Event`] envelope carrying a timestamp
//! and the correlation id of the logical operation that produced it. The
//! [`EventBus`] fans events out to channel subscribers from a dedicated
//! dispatch task; publishing never blocks and never fails the workflow.

pub mod bus;
pub mod event;
pub mod subscribers;

pub use bus::{Channel, EventBus, Subscriber};
pub use event::{
    Event, InventoryUpdatePayload, JobProgressPayload, OrderCreatedPayload, OrderStatusPayload,
    PackingPayload, PackingProgressPayload, PickItemPayload, PickListCompletedPayload,
    PickListGeneratedPayload, PickListItemSummary, ShippingLabelPayload, TaskCompletedPayload,
    TaskCreatedPayload, TaskFailedPayload, TaskStartedPayload, WorkflowEvent,
};
pub use subscribers::RecordingSubscriber;
