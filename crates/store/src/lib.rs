//! Persistence layer for the warehouse fulfillment system.
//!
//! This crate defines the entity records, their status enums, the
//! [`Repository`] contract consumed by the workflow layer, and an in-memory
//! implementation used by the worker and the test suites. Item-level list
//! mutations go through a compare-and-swap on the record version, and the
//! pick/pack completion cascades commit the list status and the order status
//! as one atomic update.

pub mod entities;
pub mod error;
pub mod memory;
pub mod repository;
pub mod seed;
pub mod status;

pub use entities::{
    Dimensions, EventRecord, Order, OrderLine, PackItem, PackingTask, PickItem, PickList, Product,
    ShippingLabel,
};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use repository::{OrderTransition, Repository, StockChange};
pub use status::{OrderStatus, PackingStatus, PickListStatus};
