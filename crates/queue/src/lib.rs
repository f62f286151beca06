//! Background job queue.
//!
//! Jobs are enqueued under a stable key; a duplicate enqueue while a job
//! with the same key is still live is a no-op, which is what guarantees at
//! most one automated fulfillment run per order. A [`WorkerPool`] consumes
//! the queue with a fixed concurrency ceiling and retries failed jobs with
//! exponential backoff up to a bounded number of attempts. Job lifecycle
//! and progress are published to the event bus as `task:*` / `job:progress`
//! events.

pub mod job;
pub mod queue;
pub mod worker;

pub use job::{Job, JobOptions, JobStatus};
pub use queue::{JobQueue, QueueConfig};
pub use worker::{HandlerError, JobContext, JobHandler, WorkerPool};
