//! Delivery channel defaults taken from configuration

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::notification::DeliveryChannelResolver;
use crate::domain::DomainError;

/// Resolves channels from a fixed list of available channels, with optional
/// per-resolver defaults
#[derive(Debug, Clone)]
pub struct StaticDeliveryChannelResolver {
    available: Vec<String>,
    defaults: HashMap<String, Vec<String>>,
}

impl StaticDeliveryChannelResolver {
    pub fn new(available: Vec<String>) -> Self {
        Self {
            available,
            defaults: HashMap::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: HashMap<String, Vec<String>>) -> Self {
        self.defaults = defaults;
        self
    }

    fn is_available(&self, channel: &str) -> bool {
        self.available.iter().any(|c| c == channel)
    }
}

#[async_trait]
impl DeliveryChannelResolver for StaticDeliveryChannelResolver {
    async fn defaults_for(&self, resolver_class_name: &str) -> Result<Vec<String>, DomainError> {
        match self.defaults.get(resolver_class_name) {
            Some(channels) => Ok(channels
                .iter()
                .filter(|c| self.is_available(c))
                .cloned()
                .collect()),
            None => Ok(self.available.clone()),
        }
    }

    async fn from_list(
        &self,
        _resolver_class_name: &str,
        list: &[String],
    ) -> Result<Vec<String>, DomainError> {
        let mut channels: Vec<String> = Vec::with_capacity(list.len());
        for channel in list {
            let channel = channel.trim();
            if self.is_available(channel) && !channels.iter().any(|c| c == channel) {
                channels.push(channel.to_string());
            }
        }
        Ok(channels)
    }
}
