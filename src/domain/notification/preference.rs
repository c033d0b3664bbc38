//! Notification preferences attached to extended contexts

use serde::{Deserialize, Serialize};

use crate::domain::context::ExtendedContext;
use crate::domain::ids::{NotifiableEventPreferenceId, NotificationPreferenceId};
use crate::domain::storage::StorageEntity;

/// Text format of a subject or body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
    Markdown,
    Json,
}

/// A configured notification for one event resolver at one extended context.
///
/// A preference may override a `parent` defined higher up the context tree;
/// `ancestor_id` points at the topmost preference of that chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreference {
    id: NotificationPreferenceId,
    extended_context: ExtendedContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<NotificationPreferenceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ancestor_id: Option<NotificationPreferenceId>,
    resolver_class_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    subject_format: TextFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    body_format: TextFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_criteria: Option<serde_json::Value>,
    enabled: bool,
    schedule_offset: i64,
    #[serde(default)]
    recipients: Vec<String>,
    #[serde(default)]
    forced_delivery_channels: Vec<String>,
}

impl NotificationPreference {
    pub fn new(extended_context: ExtendedContext, resolver_class_name: impl Into<String>) -> Self {
        Self {
            id: NotificationPreferenceId::UNSAVED,
            extended_context,
            parent_id: None,
            ancestor_id: None,
            resolver_class_name: resolver_class_name.into(),
            notification_class_name: None,
            title: None,
            subject: None,
            subject_format: TextFormat::default(),
            body: None,
            body_format: TextFormat::default(),
            additional_criteria: None,
            enabled: true,
            schedule_offset: 0,
            recipients: Vec::new(),
            forced_delivery_channels: Vec::new(),
        }
    }

    // Builder methods

    pub fn with_parent(mut self, parent: &NotificationPreference) -> Self {
        self.parent_id = Some(parent.id);
        self.ancestor_id = Some(parent.ancestor_id.unwrap_or(parent.id));
        self
    }

    pub fn with_notification_class_name(mut self, name: impl Into<String>) -> Self {
        self.notification_class_name = Some(name.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>, format: TextFormat) -> Self {
        self.subject = Some(subject.into());
        self.subject_format = format;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>, format: TextFormat) -> Self {
        self.body = Some(body.into());
        self.body_format = format;
        self
    }

    pub fn with_additional_criteria(mut self, criteria: serde_json::Value) -> Self {
        self.additional_criteria = Some(criteria);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_schedule_offset(mut self, offset: i64) -> Self {
        self.schedule_offset = offset;
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_forced_delivery_channels(mut self, channels: Vec<String>) -> Self {
        self.forced_delivery_channels = channels;
        self
    }

    /// Copy of this preference for another workflow, not yet persisted.
    /// The copy overrides nothing; `ancestor_id` still names the chain it
    /// came from.
    pub fn clone_into(&self, extended_context: ExtendedContext) -> Self {
        Self {
            parent_id: None,
            ..self.placed_at(extended_context)
        }
    }

    /// This preference stored at `extended_context`, parent included
    pub fn placed_at(&self, extended_context: ExtendedContext) -> Self {
        Self {
            id: NotificationPreferenceId::UNSAVED,
            extended_context,
            ..self.clone()
        }
    }

    // Getters

    pub fn id(&self) -> NotificationPreferenceId {
        self.id
    }

    pub fn extended_context(&self) -> &ExtendedContext {
        &self.extended_context
    }

    pub fn parent_id(&self) -> Option<NotificationPreferenceId> {
        self.parent_id
    }

    pub fn ancestor_id(&self) -> Option<NotificationPreferenceId> {
        self.ancestor_id
    }

    pub fn resolver_class_name(&self) -> &str {
        &self.resolver_class_name
    }

    pub fn notification_class_name(&self) -> Option<&str> {
        self.notification_class_name.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn schedule_offset(&self) -> i64 {
        self.schedule_offset
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn forced_delivery_channels(&self) -> &[String] {
        &self.forced_delivery_channels
    }
}

impl StorageEntity for NotificationPreference {
    type Key = NotificationPreferenceId;
    const TABLE: &'static str = "notification_preference";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}

/// Whether an event resolver notifies at an extended context, and on which
/// channels by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiableEventPreference {
    id: NotifiableEventPreferenceId,
    extended_context: ExtendedContext,
    resolver_class_name: String,
    enabled: bool,
    /// `None` means the resolver's own defaults apply
    default_delivery_channels: Option<Vec<String>>,
}

impl NotifiableEventPreference {
    pub fn new(
        extended_context: ExtendedContext,
        resolver_class_name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            id: NotifiableEventPreferenceId::UNSAVED,
            extended_context,
            resolver_class_name: resolver_class_name.into(),
            enabled,
            default_delivery_channels: None,
        }
    }

    pub fn with_default_delivery_channels(mut self, channels: Option<Vec<String>>) -> Self {
        self.default_delivery_channels = channels;
        self
    }

    pub fn id(&self) -> NotifiableEventPreferenceId {
        self.id
    }

    pub fn extended_context(&self) -> &ExtendedContext {
        &self.extended_context
    }

    pub fn resolver_class_name(&self) -> &str {
        &self.resolver_class_name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_delivery_channels(&self) -> Option<&[String]> {
        self.default_delivery_channels.as_deref()
    }
}

impl StorageEntity for NotifiableEventPreference {
    type Key = NotifiableEventPreferenceId;
    const TABLE: &'static str = "notifiable_event_preference";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{ContextId, StageId};

    #[test]
    fn test_parent_sets_ancestor() {
        let mut root = NotificationPreference::new(
            ExtendedContext::natural(ContextId::new(1)),
            "stage_started",
        );
        root.set_key(NotificationPreferenceId::new(10));

        let mut middle = NotificationPreference::new(
            ExtendedContext::natural(ContextId::new(3)),
            "stage_started",
        )
        .with_parent(&root);
        middle.set_key(NotificationPreferenceId::new(11));
        assert_eq!(middle.ancestor_id(), Some(NotificationPreferenceId::new(10)));

        let leaf = NotificationPreference::new(
            ExtendedContext::for_stage(ContextId::new(17), StageId::new(2)),
            "stage_started",
        )
        .with_parent(&middle);
        assert_eq!(leaf.parent_id(), Some(NotificationPreferenceId::new(11)));
        assert_eq!(leaf.ancestor_id(), Some(NotificationPreferenceId::new(10)));
    }

    #[test]
    fn test_clone_into_keeps_content() {
        let mut original = NotificationPreference::new(
            ExtendedContext::for_stage(ContextId::new(17), StageId::new(2)),
            "level_started",
        )
        .with_title("Approval needed")
        .with_subject("Please review", TextFormat::Plain)
        .with_schedule_offset(-86400)
        .with_enabled(false);
        original.set_key(NotificationPreferenceId::new(4));

        let target = ExtendedContext::for_stage(ContextId::new(20), StageId::new(9));
        let copy = original.clone_into(target.clone());

        assert_eq!(copy.id(), NotificationPreferenceId::UNSAVED);
        assert_eq!(copy.extended_context(), &target);
        assert_eq!(copy.title(), Some("Approval needed"));
        assert_eq!(copy.schedule_offset(), -86400);
        assert!(!copy.is_enabled());
    }

    #[test]
    fn test_clone_into_drops_parent() {
        let mut parent = NotificationPreference::new(
            ExtendedContext::natural(ContextId::new(3)),
            "level_started",
        );
        parent.set_key(NotificationPreferenceId::new(11));
        let child = NotificationPreference::new(
            ExtendedContext::for_stage(ContextId::new(17), StageId::new(2)),
            "level_started",
        )
        .with_parent(&parent);

        let target = ExtendedContext::for_stage(ContextId::new(20), StageId::new(9));
        let copy = child.clone_into(target.clone());
        assert_eq!(copy.parent_id(), None);
        assert_eq!(copy.ancestor_id(), Some(NotificationPreferenceId::new(11)));

        let placed = child.placed_at(target.clone());
        assert_eq!(placed.id(), NotificationPreferenceId::UNSAVED);
        assert_eq!(placed.extended_context(), &target);
        assert_eq!(placed.parent_id(), Some(NotificationPreferenceId::new(11)));
    }
}
