//! Reusable subscribers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::bus::Subscriber;
use crate::event::Event;

/// Records every delivered event.
///
/// Used by the test suites to assert on emission order and correlation
/// grouping.
#[derive(Clone, Default)]
pub struct RecordingSubscriber {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event seen so far, in delivery order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("recorder lock poisoned").clone()
    }

    /// Returns the events matching the given wire type name.
    pub fn of_type(&self, event_type: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.event_type() == event_type)
            .collect()
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.events.lock().expect("recorder lock poisoned").clear();
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    async fn handle(
        &self,
        event: &Event,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .push(event.clone());
        Ok(())
    }
}
