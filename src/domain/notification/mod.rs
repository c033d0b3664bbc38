//! Notification domain module
//!
//! The engine never formats or delivers messages. It keeps notification
//! preferences per extended context, asks a [`DeliveryChannelResolver`] for
//! channel defaults and hands named events to an [`EventSink`].

mod channel;
mod event;
mod preference;

pub use channel::DeliveryChannelResolver;
pub use event::{EventSink, EventType};
pub use preference::{NotifiableEventPreference, NotificationPreference, TextFormat};

#[cfg(test)]
pub use channel::MockDeliveryChannelResolver;
#[cfg(test)]
pub use event::MockEventSink;
