//! Capability checker backed by a static grant table

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{GrantConfig, GrantScope};
use crate::domain::capability::{Capability, CapabilityChecker, CapabilityScope};
use crate::domain::ids::UserId;
use crate::domain::DomainError;

/// Grants capabilities per user, optionally limited to the user's own
/// applications
#[derive(Debug, Clone, Default)]
pub struct GrantCapabilityChecker {
    grants: HashMap<(UserId, Capability), Vec<GrantScope>>,
}

impl GrantCapabilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from configured grants. Unknown capability names are
    /// a configuration error.
    pub fn from_config(grants: &[GrantConfig]) -> Result<Self, DomainError> {
        grants.iter().try_fold(Self::new(), |checker, grant| {
            let capability = Capability::from_short_name(&grant.capability).ok_or_else(|| {
                DomainError::configuration(format!("Unknown capability '{}'", grant.capability))
            })?;
            Ok(checker.grant(UserId::new(grant.user_id), capability, grant.scope))
        })
    }

    pub fn grant(mut self, user_id: UserId, capability: Capability, scope: GrantScope) -> Self {
        self.grants
            .entry((user_id, capability))
            .or_default()
            .push(scope);
        self
    }

    /// Grants every capability with scope `Any`
    pub fn grant_all(self, user_id: UserId) -> Self {
        Capability::ALL
            .into_iter()
            .fold(self, |checker, capability| {
                checker.grant(user_id, capability, GrantScope::Any)
            })
    }

    fn covers(scope: GrantScope, actor: UserId, target: &CapabilityScope) -> bool {
        match scope {
            GrantScope::Any => true,
            GrantScope::Applicant => target.applicant_id == Some(actor),
            GrantScope::Owner => target.owner_id == Some(actor),
        }
    }
}

#[async_trait]
impl CapabilityChecker for GrantCapabilityChecker {
    async fn can(
        &self,
        actor: UserId,
        capability: Capability,
        scope: &CapabilityScope,
    ) -> Result<bool, DomainError> {
        let allowed = self
            .grants
            .get(&(actor, capability))
            .is_some_and(|scopes| scopes.iter().any(|s| Self::covers(*s, actor, scope)));

        debug!(
            actor = %actor,
            capability = %capability,
            context_id = %scope.context_id,
            allowed = allowed,
            "Capability check"
        );
        Ok(allowed)
    }
}
