//! Form data submitted at a stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::ids::{ApplicationId, ApplicationSubmissionId, StageId, UserId};
use crate::domain::storage::StorageEntity;
use crate::domain::workflow::Formview;
use crate::domain::DomainError;

/// Form data of one application at one stage.
///
/// A submission starts unpublished while the applicant edits it and is
/// published when the stage is submitted. Coming back to the stage and
/// submitting again supersedes the earlier submissions for that stage, so
/// at most one submission per stage is current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    id: ApplicationSubmissionId,
    application_id: ApplicationId,
    workflow_stage_id: StageId,
    /// Last editor, then the submitter once published
    user_id: UserId,
    form_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted_at: Option<DateTime<Utc>>,
    superseded: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationSubmission {
    /// Unpublished submission
    pub fn new(
        application_id: ApplicationId,
        workflow_stage_id: StageId,
        user_id: UserId,
        form_data: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationSubmissionId::UNSAVED,
            application_id,
            workflow_stage_id,
            user_id,
            form_data,
            submitted_at: None,
            superseded: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Keeps the fields a stage lets the applicant fill in. A stage without
    /// formviews takes the data as given.
    pub fn form_data_for_stage(form_data: Value, formviews: &[Formview]) -> Result<Value, DomainError> {
        let Value::Object(fields) = form_data else {
            return Err(DomainError::validation("Form data must be a JSON object"));
        };
        if formviews.is_empty() {
            return Ok(Value::Object(fields));
        }

        let kept: Map<String, Value> = fields
            .into_iter()
            .filter(|(key, _)| {
                formviews
                    .iter()
                    .any(|f| f.field_key() == key && !f.is_disabled())
            })
            .collect();
        Ok(Value::Object(kept))
    }

    pub fn id(&self) -> ApplicationSubmissionId {
        self.id
    }

    pub fn application_id(&self) -> ApplicationId {
        self.application_id
    }

    pub fn workflow_stage_id(&self) -> StageId {
        self.workflow_stage_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn form_data(&self) -> &Value {
        &self.form_data
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn is_published(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    /// Not superseded and recorded for `stage_id` of `application_id`
    pub fn is_current_for(&self, application_id: ApplicationId, stage_id: StageId) -> bool {
        !self.superseded
            && self.application_id == application_id
            && self.workflow_stage_id == stage_id
    }

    /// Required fields of the stage that have no value
    pub fn missing_required_fields<'f>(&self, formviews: &'f [Formview]) -> Vec<&'f str> {
        formviews
            .iter()
            .filter(|f| f.is_required())
            .filter(|f| match self.form_data.get(f.field_key()) {
                None | Some(Value::Null) => true,
                Some(Value::String(value)) => value.trim().is_empty(),
                Some(_) => false,
            })
            .map(|f| f.field_key())
            .collect()
    }

    pub fn set_form_data(&mut self, form_data: Value, user_id: UserId) {
        self.form_data = form_data;
        self.user_id = user_id;
        self.updated_at = Utc::now();
    }

    pub fn publish(&mut self, submitter_id: UserId) -> Result<(), DomainError> {
        if self.is_published() {
            return Err(DomainError::validation(format!(
                "Submission {} is already published",
                self.id
            )));
        }
        let now = Utc::now();
        self.user_id = submitter_id;
        self.submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn supersede(&mut self) {
        self.superseded = true;
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for ApplicationSubmission {
    type Key = ApplicationSubmissionId;
    const TABLE: &'static str = "application_submission";

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
    use crate::domain::workflow::FormviewVisibility;
    use serde_json::json;

    fn formviews() -> Vec<Formview> {
        vec![
            Formview::new(StageId::new(1), "reason", FormviewVisibility::EditableAndRequired),
            Formview::new(StageId::new(1), "days", FormviewVisibility::Editable),
            Formview::new(StageId::new(1), "grade", FormviewVisibility::ReadOnly),
        ]
    }

    #[test]
    fn test_form_data_for_stage_keeps_editable_fields() {
        let data = json!({"reason": "Holiday", "days": 3, "grade": "A", "extra": true});
        let kept = ApplicationSubmission::form_data_for_stage(data.clone(), &formviews()).unwrap();
        assert_eq!(kept, json!({"reason": "Holiday", "days": 3}));

        let untouched = ApplicationSubmission::form_data_for_stage(data.clone(), &[]).unwrap();
        assert_eq!(untouched, data);

        let invalid = ApplicationSubmission::form_data_for_stage(json!([1, 2]), &[]);
        assert!(matches!(invalid, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_missing_required_fields() {
        let formviews = formviews();
        let mut submission = ApplicationSubmission::new(
            ApplicationId::new(1),
            StageId::new(1),
            UserId::new(10),
            json!({"reason": "  ", "days": 2}),
        );
        assert_eq!(submission.missing_required_fields(&formviews), vec!["reason"]);

        submission.set_form_data(json!({"reason": "Holiday"}), UserId::new(10));
        assert!(submission.missing_required_fields(&formviews).is_empty());
    }

    #[test]
    fn test_publish_once() {
        let mut submission = ApplicationSubmission::new(
            ApplicationId::new(1),
            StageId::new(1),
            UserId::new(10),
            json!({}),
        );
        assert!(!submission.is_published());
        assert!(submission.is_current_for(ApplicationId::new(1), StageId::new(1)));

        submission.publish(UserId::new(11)).unwrap();
        assert!(submission.is_published());
        assert_eq!(submission.user_id(), UserId::new(11));
        assert!(submission.publish(UserId::new(11)).is_err());

        submission.supersede();
        assert!(!submission.is_current_for(ApplicationId::new(1), StageId::new(1)));
    }
}
