//! Order fulfillment workflow.
//!
//! This crate is the core of the system: the order state machine, the
//! pick-list / packing / shipping sub-managers, the inventory ledger, and
//! the two drivers that advance the same machine. [`FulfillmentPipeline`]
//! runs every stage inside one queued job; [`FulfillmentService`] exposes
//! one operation per stage for human-paced progression. Every observable
//! change publishes a correlation-tagged event on the bus.

pub mod error;
pub mod fulfillment;
pub mod inventory;
pub mod machine;
pub mod orders;
pub mod packing;
pub mod picklist;
pub mod pipeline;
pub mod shipping;

pub use error::WorkflowError;
pub use fulfillment::FulfillmentService;
pub use inventory::InventoryLedger;
pub use machine::OrderMachine;
pub use orders::{NewOrder, NewOrderItem, OrderService, OrderStats};
pub use packing::{PackProgress, PackingManager, PackingPolicy};
pub use picklist::{PickListManager, PickProgress};
pub use pipeline::{FulfillmentJob, FulfillmentOutcome, FulfillmentPipeline, StageDelays};
pub use shipping::{CARRIERS, CarrierOption, ShippingManager};
