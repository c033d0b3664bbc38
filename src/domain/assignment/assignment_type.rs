//! Assignment type registry and the target adapter

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::directory::DirectoryEntry;
use crate::domain::workflow::ApprovalError;

/// Kind of organisational scope an assignment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    Organisation,
    Position,
    Cohort,
}

impl AssignmentType {
    pub const ALL: [AssignmentType; 3] = [
        AssignmentType::Organisation,
        AssignmentType::Position,
        AssignmentType::Cohort,
    ];

    pub fn from_code(code: i32) -> Result<Self, ApprovalError> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| ApprovalError::undefined_assignment_type(code.to_string()))
    }

    pub fn from_enum(name: &str) -> Result<Self, ApprovalError> {
        Self::ALL
            .into_iter()
            .find(|t| t.enum_name() == name)
            .ok_or_else(|| ApprovalError::undefined_assignment_type(name))
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Organisation => 1,
            Self::Position => 2,
            Self::Cohort => 3,
        }
    }

    pub fn enum_name(&self) -> &'static str {
        match self {
            Self::Organisation => "organisation",
            Self::Position => "position",
            Self::Cohort => "cohort",
        }
    }

    /// Key of the localized label used for blank names
    pub fn untitled_key(&self) -> String {
        format!("untitled_{}", self.enum_name())
    }

    /// Id-number used when the entity has none: `<TYPE>_<id>`
    pub fn fallback_id_number(&self, entity_id: i64) -> String {
        format!("{}_{}", self.enum_name().to_uppercase(), entity_id)
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.enum_name())
    }
}

/// Localized labels for untitled assignment targets, keyed by `untitled_<type>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UntitledLabels(HashMap<String, String>);

impl UntitledLabels {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self(labels)
    }

    /// Label for a type; the key itself when no translation is configured
    pub fn label(&self, assignment_type: AssignmentType) -> String {
        let key = assignment_type.untitled_key();
        self.0.get(&key).cloned().unwrap_or(key)
    }
}

/// One external organisation, position or cohort seen through its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTarget {
    assignment_type: AssignmentType,
    entity_id: i64,
    name: String,
    id_number: String,
}

impl AssignmentTarget {
    /// Adapts a directory entry; blank names and id-numbers are replaced
    pub fn from_entry(
        assignment_type: AssignmentType,
        entry: &DirectoryEntry,
        labels: &UntitledLabels,
    ) -> Self {
        let name = match entry.name.trim() {
            "" => labels.label(assignment_type),
            name => name.to_string(),
        };
        let id_number = match entry.id_number.trim() {
            "" => assignment_type.fallback_id_number(entry.id),
            id_number => id_number.to_string(),
        };

        Self {
            assignment_type,
            entity_id: entry.id,
            name,
            id_number,
        }
    }

    pub fn assignment_type(&self) -> AssignmentType {
        self.assignment_type
    }

    pub fn entity_id(&self) -> i64 {
        self.entity_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Never empty
    pub fn id_number(&self) -> &str {
        &self.id_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, name: &str, id_number: &str) -> DirectoryEntry {
        DirectoryEntry {
            id,
            name: name.to_string(),
            id_number: id_number.to_string(),
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(AssignmentType::from_code(3).unwrap(), AssignmentType::Cohort);
        assert_eq!(
            AssignmentType::from_enum("organisation").unwrap(),
            AssignmentType::Organisation
        );

        let err = AssignmentType::from_code(7).unwrap_err();
        assert!(matches!(err, ApprovalError::UndefinedAssignmentType(_)));
        assert!(AssignmentType::from_enum("team").is_err());
    }

    #[test]
    fn test_fallback_id_number_format() {
        for assignment_type in AssignmentType::ALL {
            let target = AssignmentTarget::from_entry(
                assignment_type,
                &entry(42, "Somewhere", ""),
                &UntitledLabels::default(),
            );
            assert_eq!(
                target.id_number(),
                format!("{}_42", assignment_type.enum_name().to_uppercase())
            );
        }

        let cohort = AssignmentTarget::from_entry(
            AssignmentType::Cohort,
            &entry(42, "", "  "),
            &UntitledLabels::default(),
        );
        assert_eq!(cohort.id_number(), "COHORT_42");
    }

    #[test]
    fn test_id_number_kept_when_present() {
        let target = AssignmentTarget::from_entry(
            AssignmentType::Position,
            &entry(5, "Manager", "POS-MGR"),
            &UntitledLabels::default(),
        );
        assert_eq!(target.id_number(), "POS-MGR");
        assert_eq!(target.name(), "Manager");
    }

    #[test]
    fn test_untitled_name() {
        let mut labels = HashMap::new();
        labels.insert("untitled_cohort".to_string(), "Untitled audience".to_string());
        let labels = UntitledLabels::new(labels);

        let cohort = AssignmentTarget::from_entry(AssignmentType::Cohort, &entry(1, " ", ""), &labels);
        assert_eq!(cohort.name(), "Untitled audience");

        let position =
            AssignmentTarget::from_entry(AssignmentType::Position, &entry(1, "", ""), &labels);
        assert_eq!(position.name(), "untitled_position");
    }
}
