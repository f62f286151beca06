//! Queue state: pending heap, delayed jobs, and key deduplication.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use common::{CorrelationId, JobId};
use pubsub::{Channel, EventBus, TaskCreatedPayload, WorkflowEvent};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::job::{Job, JobOptions, JobStatus};

/// Queue-wide settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Attempts a job is allowed before it is marked permanently failed.
    pub max_attempts: u32,
    /// First retry delay; doubles on every further attempt.
    pub backoff_base: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Entry in the ready heap. Pops lowest priority rank first, then FIFO.
#[derive(Debug)]
struct ReadyEntry {
    rank: u8,
    seq: u64,
    job_id: JobId,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for ReadyEntry {}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the smallest (rank, seq) pops first.
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry in the delayed heap, ordered by readiness time.
#[derive(Debug)]
struct DelayedEntry {
    ready_at: Instant,
    seq: u64,
    job_id: JobId,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for DelayedEntry {}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ready_at
            .cmp(&other.ready_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    ready: BinaryHeap<ReadyEntry>,
    delayed: BinaryHeap<Reverse<DelayedEntry>>,
    /// Live (non-terminal) job per deduplication key.
    keys: HashMap<String, JobId>,
    seq: u64,
}

pub(crate) enum Next {
    /// A job is ready to run.
    Job(Job),
    /// Nothing runnable; the instant the earliest delayed job becomes ready,
    /// if any.
    Wait(Option<Instant>),
}

struct Inner {
    config: QueueConfig,
    bus: Arc<EventBus>,
    state: Mutex<QueueState>,
    /// Woken whenever a job becomes runnable.
    runnable: Notify,
    /// Woken whenever the set of live jobs may have emptied.
    idle: Notify,
}

/// The job queue.
///
/// Cheap to clone; all clones share state. Enqueues are deduplicated by key:
/// while a job with the same key is live (not yet completed or permanently
/// failed), a second enqueue returns the existing job id and changes
/// nothing.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    /// Creates a queue publishing lifecycle events on the given bus.
    pub fn new(bus: Arc<EventBus>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                bus,
                state: Mutex::new(QueueState::default()),
                runnable: Notify::new(),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueues a job, or returns the live job already holding the key.
    pub fn enqueue(
        &self,
        key: impl Into<String>,
        payload: serde_json::Value,
        options: JobOptions,
        correlation_id: CorrelationId,
    ) -> JobId {
        let key = key.into();
        let job = {
            let mut state = self.inner.state.lock().unwrap();

            if let Some(&existing) = state.keys.get(&key) {
                tracing::debug!(%key, job_id = %existing, "duplicate enqueue ignored");
                metrics::counter!("queue_jobs_deduplicated_total").increment(1);
                return existing;
            }

            let job = Job::new(
                key.clone(),
                payload,
                &options,
                self.inner.config.max_attempts,
                correlation_id,
            );
            state.keys.insert(key, job.id);
            state.seq += 1;
            let seq = state.seq;
            match options.delay {
                Some(delay) if !delay.is_zero() => {
                    state.delayed.push(Reverse(DelayedEntry {
                        ready_at: Instant::now() + delay,
                        seq,
                        job_id: job.id,
                    }));
                }
                _ => {
                    state.ready.push(ReadyEntry {
                        rank: job.priority.rank(),
                        seq,
                        job_id: job.id,
                    });
                }
            }
            state.jobs.insert(job.id, job.clone());
            job
        };

        self.inner.runnable.notify_waiters();
        metrics::counter!("queue_jobs_enqueued_total").increment(1);
        tracing::info!(job_id = %job.id, key = %job.key, priority = %job.priority, "job enqueued");

        self.inner.bus.publish(
            Channel::Tasks,
            WorkflowEvent::TaskCreated(TaskCreatedPayload {
                task_id: job.id,
                name: job.key.clone(),
                priority: job.priority,
            }),
            correlation_id,
        );

        job.id
    }

    /// Returns a snapshot of a job.
    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.inner.state.lock().unwrap().jobs.get(&id).cloned()
    }

    /// Waits until no live (non-terminal) jobs remain.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().unwrap().keys.is_empty() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub(crate) fn runnable_notified(&self) -> &Notify {
        &self.inner.runnable
    }

    /// Promotes due delayed jobs, then pops the highest-priority ready job.
    pub(crate) fn take_next(&self) -> Next {
        let mut state = self.inner.state.lock().unwrap();
        let now = Instant::now();

        while let Some(Reverse(entry)) = state.delayed.peek() {
            if entry.ready_at > now {
                break;
            }
            let Reverse(entry) = state.delayed.pop().unwrap();
            let rank = state
                .jobs
                .get(&entry.job_id)
                .map(|job| job.priority.rank())
                .unwrap_or(u8::MAX);
            state.ready.push(ReadyEntry {
                rank,
                seq: entry.seq,
                job_id: entry.job_id,
            });
        }

        if let Some(entry) = state.ready.pop()
            && let Some(job) = state.jobs.get(&entry.job_id)
        {
            return Next::Job(job.clone());
        }

        Next::Wait(state.delayed.peek().map(|Reverse(entry)| entry.ready_at))
    }

    pub(crate) fn record_started(&self, id: JobId) -> Option<Job> {
        let mut state = self.inner.state.lock().unwrap();
        let job = state.jobs.get_mut(&id)?;
        job.status = JobStatus::Processing;
        job.attempts += 1;
        job.started_at = Some(Utc::now());
        Some(job.clone())
    }

    pub(crate) fn record_completed(&self, id: JobId, result: serde_json::Value) -> Option<Job> {
        let snapshot = {
            let mut state = self.inner.state.lock().unwrap();
            let job = state.jobs.get_mut(&id)?;
            job.status = JobStatus::Completed;
            job.result = Some(result);
            job.finished_at = Some(Utc::now());
            let snapshot = job.clone();
            state.keys.remove(&snapshot.key);
            snapshot
        };
        self.inner.idle.notify_waiters();
        metrics::counter!("queue_jobs_completed_total").increment(1);
        Some(snapshot)
    }

    /// Records a failed attempt. Returns the job snapshot and the backoff
    /// before the next attempt, or `None` when the job is permanently
    /// failed.
    pub(crate) fn record_failure(&self, id: JobId, error: &str) -> Option<(Job, Option<Duration>)> {
        let (snapshot, backoff) = {
            let mut state = self.inner.state.lock().unwrap();
            let job = state.jobs.get_mut(&id)?;
            job.error = Some(error.to_string());

            if job.attempts < job.max_attempts {
                job.status = JobStatus::Retrying;
                let exponent = job.attempts.saturating_sub(1);
                let backoff = self.inner.config.backoff_base * 2u32.pow(exponent);
                let snapshot = job.clone();
                state.seq += 1;
                let seq = state.seq;
                state.delayed.push(Reverse(DelayedEntry {
                    ready_at: Instant::now() + backoff,
                    seq,
                    job_id: id,
                }));
                (snapshot, Some(backoff))
            } else {
                job.status = JobStatus::Failed;
                job.finished_at = Some(Utc::now());
                let snapshot = job.clone();
                state.keys.remove(&snapshot.key);
                (snapshot, None)
            }
        };

        match backoff {
            Some(delay) => {
                self.inner.runnable.notify_waiters();
                metrics::counter!("queue_jobs_retried_total").increment(1);
                tracing::warn!(
                    job_id = %snapshot.id,
                    attempt = snapshot.attempts,
                    backoff_ms = delay.as_millis() as u64,
                    %error,
                    "job failed, retrying"
                );
            }
            None => {
                self.inner.idle.notify_waiters();
                metrics::counter!("queue_jobs_failed_total").increment(1);
                tracing::error!(
                    job_id = %snapshot.id,
                    attempts = snapshot.attempts,
                    %error,
                    "job permanently failed"
                );
            }
        }

        Some((snapshot, backoff))
    }

    pub(crate) fn record_progress(&self, id: JobId, progress: u8) -> Option<Job> {
        let mut state = self.inner.state.lock().unwrap();
        let job = state.jobs.get_mut(&id)?;
        job.progress = progress;
        job.progress_history.push(progress);
        Some(job.clone())
    }
}
