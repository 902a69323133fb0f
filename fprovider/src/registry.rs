//! Backend lookup with a retry policy bound to each registered provider.
//!
//! ```rust
//! use fprovider::{ProviderId, ProviderRegistry, RetryPolicy};
//!
//! let registry = ProviderRegistry::new();
//! assert!(registry.is_empty());
//! assert_eq!(registry.policy_for(ProviderId::OpenRouter), RetryPolicy::default());
//! assert_eq!(registry.policy_for(ProviderId::OpenAi), RetryPolicy::single_attempt());
//! ```

use std::sync::Arc;

use fcommon::Registry;

use crate::{ModelProvider, ProviderId, RetryPolicy};

struct Binding {
    provider: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
}

#[derive(Default)]
pub struct ProviderRegistry {
    bindings: Registry<ProviderId, Binding>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider with the default policy for its id.
    pub fn register<P>(&mut self, provider: P)
    where
        P: ModelProvider + 'static,
    {
        let policy = default_policy(provider.id());
        self.register_with_policy(provider, policy);
    }

    pub fn register_with_policy<P>(&mut self, provider: P, policy: RetryPolicy)
    where
        P: ModelProvider + 'static,
    {
        self.register_shared(Arc::new(provider), policy);
    }

    pub fn register_shared(&mut self, provider: Arc<dyn ModelProvider>, policy: RetryPolicy) {
        self.bindings
            .insert(provider.id(), Binding { provider, policy });
    }

    pub fn get(&self, provider_id: ProviderId) -> Option<Arc<dyn ModelProvider>> {
        self.bindings
            .get(&provider_id)
            .map(|binding| Arc::clone(&binding.provider))
    }

    /// Policy bound at registration, or the id's default when nothing is registered.
    pub fn policy_for(&self, provider_id: ProviderId) -> RetryPolicy {
        self.bindings
            .get(&provider_id)
            .map(|binding| binding.policy.clone())
            .unwrap_or_else(|| default_policy(provider_id))
    }

    pub fn remove(&mut self, provider_id: ProviderId) -> Option<Arc<dyn ModelProvider>> {
        self.bindings
            .remove(&provider_id)
            .map(|binding| binding.provider)
    }

    pub fn contains(&self, provider_id: ProviderId) -> bool {
        self.bindings.contains_key(&provider_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// The routed backend retries transient failures; the direct one does not.
pub fn default_policy(provider_id: ProviderId) -> RetryPolicy {
    match provider_id {
        ProviderId::OpenRouter => RetryPolicy::default(),
        ProviderId::OpenAi => RetryPolicy::single_attempt(),
    }
}
