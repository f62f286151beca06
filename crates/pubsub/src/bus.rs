//! The event bus.
//!
//! An explicit object with an owned lifecycle: construct it, register
//! subscribers per channel, publish, and shut it down to drain. There is no
//! process-wide registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::CorrelationId;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::event::{Event, WorkflowEvent};

/// Named channels events are published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Tasks,
    Notifications,
    System,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Tasks => "channel:tasks",
            Channel::Notifications => "channel:notifications",
            Channel::System => "channel:system",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives events from channels it subscribed to.
///
/// Handler failures are logged by the bus and never affect the publisher or
/// sibling subscribers.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: &Event)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

enum Dispatch {
    Deliver(Channel, Event),
    Flush(oneshot::Sender<()>),
}

type SubscriberMap = HashMap<Channel, Vec<Arc<dyn Subscriber>>>;

/// In-process publish/subscribe fan-out.
///
/// Publishing pushes onto a bounded queue consumed by a single dispatch
/// task, so callers never wait on subscriber work and delivery order matches
/// publish order. When the queue is full the event is dropped with a
/// warning; event delivery is best-effort by design.
pub struct EventBus {
    tx: Mutex<Option<mpsc::Sender<Dispatch>>>,
    subscribers: Arc<RwLock<SubscriberMap>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Creates a bus with the given dispatch queue capacity and starts its
    /// dispatch task.
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Dispatch>(capacity);
        let subscribers: Arc<RwLock<SubscriberMap>> = Arc::new(RwLock::new(HashMap::new()));

        let dispatch_subscribers = Arc::clone(&subscribers);
        let dispatcher = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    Dispatch::Deliver(channel, event) => {
                        let handlers = dispatch_subscribers
                            .read()
                            .await
                            .get(&channel)
                            .cloned()
                            .unwrap_or_default();
                        for handler in handlers {
                            if let Err(error) = handler.handle(&event).await {
                                tracing::error!(
                                    %channel,
                                    event_type = event.event_type(),
                                    %error,
                                    "event subscriber failed"
                                );
                            }
                        }
                    }
                    Dispatch::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            subscribers,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Registers a subscriber on a channel.
    pub async fn subscribe(&self, channel: Channel, subscriber: Arc<dyn Subscriber>) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(channel).or_default().push(subscriber);
    }

    /// Publishes an event. Fire-and-forget: never blocks, never fails the
    /// caller.
    pub fn publish(&self, channel: Channel, kind: WorkflowEvent, correlation_id: CorrelationId) {
        let event = Event::new(kind, correlation_id);
        tracing::debug!(
            %channel,
            event_type = event.event_type(),
            %correlation_id,
            "publishing event"
        );

        let sender = self.tx.lock().expect("bus sender lock poisoned").clone();
        let Some(sender) = sender else {
            tracing::warn!(
                event_type = event.event_type(),
                "event dropped: bus is shut down"
            );
            return;
        };

        match sender.try_send(Dispatch::Deliver(channel, event)) {
            Ok(()) => {
                metrics::counter!("events_published_total").increment(1);
            }
            Err(error) => {
                metrics::counter!("events_dropped_total").increment(1);
                tracing::warn!(%channel, %error, "event dropped: dispatch queue unavailable");
            }
        }
    }

    /// Waits until every event published so far has been delivered.
    pub async fn flush(&self) {
        let sender = self.tx.lock().expect("bus sender lock poisoned").clone();
        let Some(sender) = sender else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if sender.send(Dispatch::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Shuts the bus down, draining already-queued events and unregistering
    /// every subscriber. Later publishes are dropped with a warning.
    pub async fn shutdown(&self) {
        let sender = self.tx.lock().expect("bus sender lock poisoned").take();
        drop(sender);

        let dispatcher = self
            .dispatcher
            .lock()
            .expect("bus dispatcher lock poisoned")
            .take();
        if let Some(handle) = dispatcher {
            if let Err(error) = handle.await {
                tracing::error!(%error, "event dispatcher task panicked");
            }
        }

        self.subscribers.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{JobProgressPayload, WorkflowEvent};
    use crate::subscribers::RecordingSubscriber;
    use common::JobId;

    fn progress_event(progress: u8) -> WorkflowEvent {
        WorkflowEvent::JobProgress(JobProgressPayload {
            job_id: JobId::new(),
            progress,
            message: None,
        })
    }

    #[tokio::test]
    async fn delivers_to_all_channel_subscribers() {
        let bus = EventBus::new(16);
        let first = Arc::new(RecordingSubscriber::new());
        let second = Arc::new(RecordingSubscriber::new());
        bus.subscribe(Channel::Tasks, first.clone()).await;
        bus.subscribe(Channel::Tasks, second.clone()).await;

        bus.publish(Channel::Tasks, progress_event(10), CorrelationId::new());
        bus.flush().await;

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = EventBus::new(16);
        let tasks = Arc::new(RecordingSubscriber::new());
        let system = Arc::new(RecordingSubscriber::new());
        bus.subscribe(Channel::Tasks, tasks.clone()).await;
        bus.subscribe(Channel::System, system.clone()).await;

        bus.publish(Channel::Tasks, progress_event(10), CorrelationId::new());
        bus.flush().await;

        assert_eq!(tasks.events().len(), 1);
        assert!(system.events().is_empty());
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_drop_others() {
        struct Failing;

        #[async_trait]
        impl Subscriber for Failing {
            async fn handle(
                &self,
                _event: &Event,
            ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
                Err("boom".into())
            }
        }

        let bus = EventBus::new(16);
        let recorder = Arc::new(RecordingSubscriber::new());
        bus.subscribe(Channel::Tasks, Arc::new(Failing)).await;
        bus.subscribe(Channel::Tasks, recorder.clone()).await;

        bus.publish(Channel::Tasks, progress_event(10), CorrelationId::new());
        bus.flush().await;

        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn delivery_preserves_publish_order() {
        let bus = EventBus::new(16);
        let recorder = Arc::new(RecordingSubscriber::new());
        bus.subscribe(Channel::Tasks, recorder.clone()).await;

        for progress in [10, 20, 50] {
            bus.publish(
                Channel::Tasks,
                progress_event(progress),
                CorrelationId::new(),
            );
        }
        bus.flush().await;

        let seen: Vec<u8> = recorder
            .events()
            .iter()
            .map(|event| match &event.kind {
                WorkflowEvent::JobProgress(payload) => payload.progress,
                other => panic!("unexpected event {}", other.event_type()),
            })
            .collect();
        assert_eq!(seen, vec![10, 20, 50]);
    }

    #[tokio::test]
    async fn shutdown_drains_then_drops_later_publishes() {
        let bus = EventBus::new(16);
        let recorder = Arc::new(RecordingSubscriber::new());
        bus.subscribe(Channel::Tasks, recorder.clone()).await;

        bus.publish(Channel::Tasks, progress_event(10), CorrelationId::new());
        bus.shutdown().await;
        assert_eq!(recorder.events().len(), 1);

        bus.publish(Channel::Tasks, progress_event(20), CorrelationId::new());
        bus.flush().await;
        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn correlation_id_is_carried_verbatim() {
        let bus = EventBus::new(16);
        let recorder = Arc::new(RecordingSubscriber::new());
        bus.subscribe(Channel::Tasks, recorder.clone()).await;

        let correlation_id = CorrelationId::new();
        bus.publish(Channel::Tasks, progress_event(10), correlation_id);
        bus.flush().await;

        assert_eq!(recorder.events()[0].correlation_id, correlation_id);
    }
}
