//! Delivery channel defaults

use async_trait::async_trait;

use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Resolves which delivery channels an event resolver uses by default
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryChannelResolver: Send + Sync {
    /// Default channels of a resolver
    async fn defaults_for(&self, resolver_class_name: &str) -> Result<Vec<String>, DomainError>;

    /// Keeps the channels of `list` the resolver can deliver through
    async fn from_list(
        &self,
        resolver_class_name: &str,
        list: &[String],
    ) -> Result<Vec<String>, DomainError>;
}
