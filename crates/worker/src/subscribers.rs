//! Bus subscribers wired up by the worker binary.

use async_trait::async_trait;
use chrono::Utc;
use pubsub::{Event, Subscriber};
use store::{EventRecord, Repository};

/// Logs every event at info level.
#[derive(Debug, Default)]
pub struct LoggingSubscriber;

#[async_trait]
impl Subscriber for LoggingSubscriber {
    async fn handle(
        &self,
        event: &Event,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            event_type = event.event_type(),
            correlation_id = %event.correlation_id,
            "event"
        );
        Ok(())
    }
}

/// Persists every event into the store's audit trail, queryable by
/// correlation id.
pub struct EventArchiver<R: Repository> {
    repo: R,
}

impl<R: Repository> EventArchiver<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R: Repository> Subscriber for EventArchiver<R> {
    async fn handle(
        &self,
        event: &Event,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_value(&event.kind)?;
        self.repo
            .insert_event(EventRecord {
                event_type: event.event_type().to_string(),
                payload,
                correlation_id: event.correlation_id,
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CorrelationId, JobId};
    use pubsub::{JobProgressPayload, WorkflowEvent};
    use store::MemoryStore;

    #[tokio::test]
    async fn archiver_persists_events_under_their_correlation() {
        let store = MemoryStore::new();
        let archiver = EventArchiver::new(store.clone());
        let correlation_id = CorrelationId::new();

        let event = Event::new(
            WorkflowEvent::JobProgress(JobProgressPayload {
                job_id: JobId::new(),
                progress: 50,
                message: None,
            }),
            correlation_id,
        );
        archiver.handle(&event).await.unwrap();

        let records = store.events_by_correlation(correlation_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "job:progress");
    }
}
