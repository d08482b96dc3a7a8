//! Outbound message publishing.

use std::sync::{Mutex, PoisonError};

/// Fire-and-forget publisher for replies and domain events.
///
/// Implementations own their delivery failures; callers are never told.
pub trait Publisher {
    fn publish(&self, topic: &str, payload: &str);
}

impl<P: Publisher + ?Sized> Publisher for &P {
    fn publish(&self, topic: &str, payload: &str) {
        (**self).publish(topic, payload);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

/// Keeps every published message in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.lock().clone()
    }

    /// Messages published on one topic.
    pub fn on_topic(&self, topic: &str) -> Vec<PublishedMessage> {
        self.lock()
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }

    /// Drains and returns all recorded messages.
    pub fn take(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PublishedMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        self.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
    }
}
