//! Notification infrastructure - event sinks and delivery channel defaults

mod event_sink;
mod static_channels;

pub use event_sink::{InMemoryEventSink, RecordedEvent, TracingEventSink};
pub use static_channels::StaticDeliveryChannelResolver;
