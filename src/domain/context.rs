//! Permission contexts
//!
//! Contexts form a tree. Each context stores its materialised path
//! (`/1/3/17`, ancestors first, own id last), so ancestry is a prefix test.

use serde::{Deserialize, Serialize};

use crate::domain::ids::{ContextId, StageId};
use crate::domain::storage::StorageEntity;

/// Component owning approval workflow extended contexts
pub const APPROVAL_COMPONENT: &str = "mod_approval";

/// Area of stage-scoped extended contexts
pub const WORKFLOW_STAGE_AREA: &str = "workflow_stage";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    id: ContextId,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<ContextId>,
    path: String,
}

impl Context {
    /// New top-level context
    pub fn root() -> Self {
        Self {
            id: ContextId::UNSAVED,
            parent_id: None,
            path: String::new(),
        }
    }

    /// New context below `parent`. The path is completed when the store
    /// assigns the id.
    pub fn child_of(parent: &Context) -> Self {
        Self {
            id: ContextId::UNSAVED,
            parent_id: Some(parent.id),
            path: parent.path.clone(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ContextId> {
        self.parent_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True when `self` is `other` or one of its ancestors
    pub fn contains(&self, other: &Context) -> bool {
        path_contains(&self.path, &other.path)
    }
}

/// True when `ancestor` equals `path` or is a proper prefix of it on a
/// segment boundary
pub fn path_contains(ancestor: &str, path: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl StorageEntity for Context {
    type Key = ContextId;
    const TABLE: &'static str = "context";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn set_key(&mut self, key: Self::Key) {
        self.id = key;
        self.path = format!("{}/{}", self.path, key);
    }
}

/// A context narrowed to one item of a component area
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendedContext {
    pub context_id: ContextId,
    pub component: String,
    pub area: String,
    pub item_id: i64,
}

impl ExtendedContext {
    /// The plain context with no narrowing
    pub fn natural(context_id: ContextId) -> Self {
        Self {
            context_id,
            component: String::new(),
            area: String::new(),
            item_id: 0,
        }
    }

    /// Where notification preferences of a workflow stage live
    pub fn for_stage(context_id: ContextId, stage_id: StageId) -> Self {
        Self {
            context_id,
            component: APPROVAL_COMPONENT.to_string(),
            area: WORKFLOW_STAGE_AREA.to_string(),
            item_id: stage_id.value(),
        }
    }

    pub fn is_natural(&self) -> bool {
        self.component.is_empty() && self.area.is_empty() && self.item_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_assigned_on_key() {
        let mut system = Context::root();
        system.set_key(ContextId::new(1));
        assert_eq!(system.path(), "/1");

        let mut category = Context::child_of(&system);
        category.set_key(ContextId::new(3));
        assert_eq!(category.path(), "/1/3");
        assert_eq!(category.parent_id(), Some(ContextId::new(1)));

        assert!(system.contains(&category));
        assert!(!category.contains(&system));
        assert!(category.contains(&category));
    }

    #[test]
    fn test_path_contains_respects_segments() {
        assert!(path_contains("/1/3", "/1/3/17"));
        assert!(!path_contains("/1/3", "/1/31"));
        assert!(!path_contains("/1/4", "/1/3/17"));
    }

    #[test]
    fn test_stage_extended_context() {
        let ctx = ExtendedContext::for_stage(ContextId::new(17), StageId::new(5));
        assert_eq!(ctx.component, "mod_approval");
        assert_eq!(ctx.area, "workflow_stage");
        assert_eq!(ctx.item_id, 5);
        assert!(!ctx.is_natural());
        assert!(ExtendedContext::natural(ContextId::new(17)).is_natural());
    }
}
