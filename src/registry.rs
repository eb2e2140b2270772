//! Provider registry.

use std::collections::HashMap;

use crate::closure::Closure;
use crate::error::{JabError, JabResult};
use crate::key::TypeKey;
use crate::provider::{Provider, ProviderBuilder};
use crate::signature::Component;

/// Providers keyed by produced name, in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    providers: Vec<Provider>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider. Produced names are unique.
    pub fn register(&mut self, provider: Provider) -> JabResult<()> {
        if let Some(&existing) = self.index.get(provider.name()) {
            return Err(JabError::DuplicateProvide {
                name: provider.name().to_string(),
                new: provider.describe(),
                existing: self.providers[existing].describe(),
            });
        }

        tracing::debug!(provider = provider.name(), kind = %provider.kind(), "registered provider");
        self.index.insert(provider.name().to_string(), self.providers.len());
        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.index.get(name).map(|&i| &self.providers[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// First provider producing exactly `key`.
    pub fn find_by_type(&self, key: &TypeKey) -> Option<&Provider> {
        self.providers.iter().find(|p| p.produces() == *key)
    }

    /// Providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Anything that can be handed to [`Harness::provide`](crate::Harness::provide).
pub trait Provide {
    fn into_providers(self) -> JabResult<Vec<Provider>>;
}

impl Provide for Provider {
    fn into_providers(self) -> JabResult<Vec<Provider>> {
        Ok(vec![self])
    }
}

impl<T: Component> Provide for ProviderBuilder<T> {
    fn into_providers(self) -> JabResult<Vec<Provider>> {
        Ok(vec![self.build()?])
    }
}

impl<T: Component> Provide for &Closure<T> {
    fn into_providers(self) -> JabResult<Vec<Provider>> {
        Ok(vec![self.provider()?])
    }
}

impl<T: Component> Provide for Closure<T> {
    fn into_providers(self) -> JabResult<Vec<Provider>> {
        (&self).into_providers()
    }
}

impl Provide for &Registry {
    fn into_providers(self) -> JabResult<Vec<Provider>> {
        Ok(self.providers.clone())
    }
}
