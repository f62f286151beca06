//! Shared types for the warehouse fulfillment system.
//!
//! This crate provides the typed identifiers used across every other crate,
//! the [`Money`] value type, and the [`Priority`] ordering used by both
//! orders and the job queue.

pub mod ids;
pub mod money;
pub mod priority;

pub use ids::{CorrelationId, JobId, LabelId, OrderId, PackingTaskId, PickListId, ProductId};
pub use money::Money;
pub use priority::Priority;
