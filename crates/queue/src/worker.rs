//! Worker pool consuming the job queue.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::{CorrelationId, JobId};
use pubsub::{
    Channel, JobProgressPayload, TaskCompletedPayload, TaskFailedPayload, TaskStartedPayload,
    WorkflowEvent,
};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

use crate::job::Job;
use crate::queue::{JobQueue, Next};

/// Error type handlers may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handle a single job attempt.
///
/// The returned value is stored as the job result. An error marks the
/// attempt failed; the queue owns the retry policy, handlers must not retry
/// internally.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: JobContext) -> Result<serde_json::Value, HandlerError>;
}

/// Per-attempt context handed to a [`JobHandler`].
#[derive(Clone)]
pub struct JobContext {
    queue: JobQueue,
    pub job_id: JobId,
    pub payload: serde_json::Value,
    /// Correlation id the job was enqueued under; handlers thread it through
    /// every event they publish.
    pub correlation_id: CorrelationId,
    pub attempt: u32,
}

impl JobContext {
    /// Reports fractional progress (0-100) on the job record and publishes a
    /// `job:progress` event.
    pub fn report_progress(&self, progress: u8) {
        self.queue.record_progress(self.job_id, progress);
        self.queue.bus().publish(
            Channel::Tasks,
            WorkflowEvent::JobProgress(JobProgressPayload {
                job_id: self.job_id,
                progress,
                message: None,
            }),
            self.correlation_id,
        );
    }
}

/// Pulls jobs from a [`JobQueue`] and runs them through a handler with a
/// fixed concurrency ceiling. Excess jobs stay queued rather than blocking
/// producers.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
}

impl WorkerPool {
    /// Starts the dispatch loop.
    pub fn start(queue: JobQueue, handler: Arc<dyn JobHandler>, concurrency: usize) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let dispatcher = tokio::spawn(dispatch_loop(queue, handler, concurrency, shutdown_rx));
        tracing::info!(concurrency, "worker pool started");
        Self {
            shutdown,
            dispatcher,
        }
    }

    /// Stops pulling new jobs and waits for in-flight jobs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.dispatcher.await {
            tracing::error!(%error, "worker dispatcher task panicked");
        }
        tracing::info!("worker pool shut down");
    }
}

async fn dispatch_loop(
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));

    loop {
        // Hold a permit before taking a job so the ceiling bounds pickup,
        // not just execution.
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.changed() => break,
        };

        let job = loop {
            let notified = queue.runnable_notified().notified();
            match queue.take_next() {
                Next::Job(job) => break Some(job),
                Next::Wait(deadline) => {
                    let stop = match deadline {
                        Some(ready_at) => tokio::select! {
                            _ = notified => false,
                            _ = tokio::time::sleep_until(ready_at) => false,
                            _ = shutdown.changed() => true,
                        },
                        None => tokio::select! {
                            _ = notified => false,
                            _ = shutdown.changed() => true,
                        },
                    };
                    if stop {
                        break None;
                    }
                }
            }
        };

        let Some(job) = job else { break };

        let queue = queue.clone();
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            process_job(queue, handler, job).await;
            drop(permit);
        });
    }

    // Drain: wait for every in-flight job before returning.
    let _ = semaphore.acquire_many(concurrency as u32).await;
}

async fn process_job(queue: JobQueue, handler: Arc<dyn JobHandler>, job: Job) {
    let Some(job) = queue.record_started(job.id) else {
        return;
    };
    let started = Instant::now();

    tracing::info!(job_id = %job.id, key = %job.key, attempt = job.attempts, "job started");
    queue.bus().publish(
        Channel::Tasks,
        WorkflowEvent::TaskStarted(TaskStartedPayload {
            task_id: job.id,
            name: job.key.clone(),
            attempt: job.attempts,
        }),
        job.correlation_id,
    );

    let ctx = JobContext {
        queue: queue.clone(),
        job_id: job.id,
        payload: job.payload.clone(),
        correlation_id: job.correlation_id,
        attempt: job.attempts,
    };

    match handler.handle(ctx).await {
        Ok(result) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            queue.record_completed(job.id, result.clone());
            tracing::info!(job_id = %job.id, key = %job.key, duration_ms, "job completed");
            metrics::histogram!("queue_job_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            queue.bus().publish(
                Channel::Tasks,
                WorkflowEvent::TaskCompleted(TaskCompletedPayload {
                    task_id: job.id,
                    result,
                    duration_ms,
                }),
                job.correlation_id,
            );
        }
        Err(error) => {
            let message = error.to_string();
            queue.record_failure(job.id, &message);
            queue.bus().publish(
                Channel::Tasks,
                WorkflowEvent::TaskFailed(TaskFailedPayload {
                    task_id: job.id,
                    error: message,
                    attempt: job.attempts,
                }),
                job.correlation_id,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobOptions, JobStatus};
    use crate::queue::QueueConfig;
    use pubsub::EventBus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_queue() -> JobQueue {
        JobQueue::new(Arc::new(EventBus::new(256)), QueueConfig::default())
    }

    struct Succeeding;

    #[async_trait]
    impl JobHandler for Succeeding {
        async fn handle(&self, ctx: JobContext) -> Result<serde_json::Value, HandlerError> {
            ctx.report_progress(100);
            Ok(serde_json::json!({ "ok": true }))
        }
    }

    struct Failing;

    #[async_trait]
    impl JobHandler for Failing {
        async fn handle(&self, _ctx: JobContext) -> Result<serde_json::Value, HandlerError> {
            Err("always fails".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_job_to_completion() {
        let queue = test_queue();
        let pool = WorkerPool::start(queue.clone(), Arc::new(Succeeding), 2);

        let id = queue.enqueue(
            "job",
            serde_json::json!({}),
            JobOptions::default(),
            CorrelationId::new(),
        );
        queue.wait_idle().await;
        pool.shutdown().await;

        let job = queue.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result, Some(serde_json::json!({ "ok": true })));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff_then_fails_permanently() {
        let queue = test_queue();
        let pool = WorkerPool::start(queue.clone(), Arc::new(Failing), 1);

        let id = queue.enqueue(
            "job",
            serde_json::json!({}),
            JobOptions::default(),
            CorrelationId::new(),
        );
        queue.wait_idle().await;
        pool.shutdown().await;

        let job = queue.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.error.as_deref(), Some("always fails"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_ceiling_is_respected() {
        struct Tracking {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl JobHandler for Arc<Tracking> {
            async fn handle(&self, _ctx: JobContext) -> Result<serde_json::Value, HandlerError> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(serde_json::json!(null))
            }
        }

        let tracking = Arc::new(Tracking {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let queue = test_queue();
        let pool = WorkerPool::start(queue.clone(), Arc::new(Arc::clone(&tracking)), 2);

        for n in 0..6 {
            queue.enqueue(
                format!("job-{n}"),
                serde_json::json!({}),
                JobOptions::default(),
                CorrelationId::new(),
            );
        }
        queue.wait_idle().await;
        pool.shutdown().await;

        assert!(tracking.peak.load(Ordering::SeqCst) <= 2);
        assert!(tracking.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_jobs() {
        struct Slow(Arc<AtomicUsize>);

        #[async_trait]
        impl JobHandler for Slow {
            async fn handle(&self, _ctx: JobContext) -> Result<serde_json::Value, HandlerError> {
                tokio::time::sleep(Duration::from_millis(200)).await;
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!(null))
            }
        }

        let finished = Arc::new(AtomicUsize::new(0));
        let queue = test_queue();
        let pool = WorkerPool::start(queue.clone(), Arc::new(Slow(Arc::clone(&finished))), 1);

        queue.enqueue(
            "slow",
            serde_json::json!({}),
            JobOptions::default(),
            CorrelationId::new(),
        );
        // Give the dispatcher a chance to pick the job up.
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.shutdown().await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
