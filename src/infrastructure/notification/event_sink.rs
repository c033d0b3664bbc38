//! Event sink implementations

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::notification::{EventSink, EventType};
use crate::domain::DomainError;

/// Writes every event to the log and counts it
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event_type: EventType, payload: serde_json::Value) -> Result<(), DomainError> {
        counter!("approval_events_total", "event" => event_type.name()).increment(1);
        info!(event = %event_type, payload = %payload, "Approval event");
        Ok(())
    }
}

/// An event kept by [`InMemoryEventSink`]
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecordedEvent {
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

/// Keeps emitted events in memory, in emission order
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().await.clone()
    }

    pub async fn event_types(&self) -> Vec<EventType> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn emit(&self, event_type: EventType, payload: serde_json::Value) -> Result<(), DomainError> {
        self.events.write().await.push(RecordedEvent {
            event_type,
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_keeps_order() {
        let sink = InMemoryEventSink::new();
        sink.emit(EventType::ApplicationCreated, serde_json::json!({"application_id": 1}))
            .await
            .unwrap();
        sink.emit(EventType::ApplicationSubmitted, serde_json::json!({"application_id": 1}))
            .await
            .unwrap();

        assert_eq!(
            sink.event_types().await,
            vec![EventType::ApplicationCreated, EventType::ApplicationSubmitted]
        );
        assert_eq!(sink.events().await[0].payload["application_id"], 1);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingEventSink::new();
        let result = sink
            .emit(EventType::WorkflowCloned, serde_json::json!({"workflow_id": 3}))
            .await;
        assert!(result.is_ok());
    }
}
