//! An in-memory `EventSink` that records every publish in order, instead of
//! talking to a broker. Used exclusively by test suites (`orchestrator`'s in
//! particular, to assert the event-ordering invariant) that
//! need to observe what was published without standing up RabbitMQ.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::envelope::enrich;
use crate::error::EventsError;
use crate::EventSink;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub routing_key: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct RecordingEventSink {
    source: String,
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every routing key published so far, in publish order.
    pub async fn routing_keys(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .map(|e| e.routing_key.clone())
            .collect()
    }

    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, routing_key: &str, payload: Value) -> Result<(), EventsError> {
        let enriched = enrich(payload, &self.source);
        self.events.lock().await.push(RecordedEvent {
            routing_key: routing_key.to_string(),
            payload: enriched,
        });
        Ok(())
    }
}
