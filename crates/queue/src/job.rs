//! Job records.

use chrono::{DateTime, Utc};
use common::{CorrelationId, JobId, Priority};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    /// Returns true once the job will never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options accepted by [`JobQueue::enqueue`](crate::JobQueue::enqueue).
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub priority: Priority,
    /// Delay before the job becomes runnable.
    pub delay: Option<Duration>,
}

impl JobOptions {
    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            delay: None,
        }
    }
}

/// A unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Stable deduplication key, e.g. `order-fulfillment:<order id>`.
    pub key: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub priority: Priority,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Last reported fractional progress, 0-100.
    pub progress: u8,
    /// Every progress value reported, in order.
    pub progress_history: Vec<u8>,
    pub correlation_id: CorrelationId,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(
        key: String,
        payload: serde_json::Value,
        options: &JobOptions,
        max_attempts: u32,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            id: JobId::new(),
            key,
            payload,
            status: JobStatus::Pending,
            priority: options.priority,
            attempts: 0,
            max_attempts,
            progress: 0,
            progress_history: Vec::new(),
            correlation_id,
            result: None,
            error: None,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new(
            "order-fulfillment:abc".to_string(),
            serde_json::json!({}),
            &JobOptions::default(),
            3,
            CorrelationId::new(),
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.progress, 0);
        assert!(job.progress_history.is_empty());
    }
}
