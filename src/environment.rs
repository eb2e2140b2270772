//! The constructed environment: one instance per provider.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{JabError, JabResult};
use crate::graph::{start_phase_uses_default_logger, DependencyGraph, Edge};
use crate::key::TypeKey;
use crate::logging::{default_logger, DEFAULT_LOGGER};
use crate::provider::{Dependencies, Injected};
use crate::registry::Registry;

/// Constructed instances keyed by provider name, in construction order.
#[derive(Clone, Default)]
pub struct Environment {
    instances: HashMap<String, Injected>,
    order: Vec<String>,
}

impl Environment {
    /// Invokes every provider in graph order, awaiting each before the next.
    pub(crate) async fn construct(registry: &Registry, graph: &DependencyGraph) -> JabResult<Self> {
        let mut env = Environment::default();

        // Bound only by on_start hooks: recorded ahead of everything else.
        if !graph.uses_default_logger() && start_phase_uses_default_logger(registry) {
            env.insert(default_logger());
        }

        for name in graph.order() {
            if name == DEFAULT_LOGGER {
                env.insert(default_logger());
                continue;
            }

            let provider = registry
                .get(name)
                .ok_or_else(|| JabError::UnknownConstructor { name: name.clone() })?;
            let deps = env.dependencies_for(name, graph.dependencies(name))?;

            tracing::debug!(provider = %name, params = deps.len(), "constructing");
            let instance = provider
                .construct(deps)
                .await
                .map_err(|source| JabError::ConstructionFailed {
                    provider: name.clone(),
                    source,
                })?;

            env.insert(Injected::new(name.clone(), instance, provider.views()));
        }

        Ok(env)
    }

    fn insert(&mut self, injected: Injected) {
        let name = injected.name().to_string();
        if self.instances.insert(name.clone(), injected).is_none() {
            self.order.push(name);
        }
    }

    /// Dependency bag for `owner` built from already constructed instances.
    pub(crate) fn dependencies_for(&self, owner: &str, edges: &[Edge]) -> JabResult<Dependencies> {
        let values = edges
            .iter()
            .map(|edge| {
                self.instances
                    .get(&edge.target)
                    .cloned()
                    .map(|injected| (edge.parameter.clone(), injected))
                    .ok_or_else(|| JabError::UnknownConstructor { name: edge.target.clone() })
            })
            .collect::<JabResult<Vec<_>>>()?;
        Ok(Dependencies::new(owner, values))
    }

    pub fn get(&self, name: &str) -> Option<&Injected> {
        self.instances.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// Instance `name` as its concrete type.
    pub fn resolve<T: std::any::Any + Send + Sync>(&self, name: &str) -> JabResult<Arc<T>> {
        self.lookup(name)?
            .downcast::<T>()
            .ok_or_else(|| mismatch::<T>(name))
    }

    /// Instance `name` viewed through a capability trait object.
    pub fn capability<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> JabResult<Arc<C>> {
        self.lookup(name)?
            .view::<C>()
            .ok_or_else(|| mismatch::<C>(name))
    }

    /// Instances exposing the trait object view `key`, in construction order.
    pub fn exposing(&self, key: &TypeKey) -> Vec<&Injected> {
        self.iter().filter(|injected| injected.exposes(key)).collect()
    }

    /// Construction order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Injected> {
        self.order.iter().filter_map(|name| self.instances.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn lookup(&self, name: &str) -> JabResult<&Injected> {
        self.instances
            .get(name)
            .ok_or_else(|| JabError::UnknownConstructor { name: name.to_string() })
    }
}

fn mismatch<T: ?Sized>(name: &str) -> JabError {
    JabError::TypeMismatch {
        provider: name.to_string(),
        parameter: name.to_string(),
        expected: std::any::type_name::<T>(),
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.order).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::signature::{Component, TypeRef};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Leaf(usize);
    impl Component for Leaf {}

    struct Branch {
        leaf: Arc<Leaf>,
    }
    impl Component for Branch {}

    struct Other {
        leaf: Arc<Leaf>,
    }
    impl Component for Other {}

    #[tokio::test]
    async fn test_each_provider_constructed_once_and_shared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = Registry::new();
        registry
            .register(
                Provider::constructor(|deps| Ok(Branch { leaf: deps.get("leaf")? }))
                    .param("leaf", TypeRef::component::<Leaf>())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Provider::factory(|deps: Dependencies| async move {
                    let leaf = deps.get::<Leaf>("leaf")?;
                    Ok::<_, crate::BoxError>(Other { leaf })
                })
                    .param("leaf", TypeRef::component::<Leaf>())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Provider::constructor(move |_| Ok(Leaf(counter.fetch_add(1, Ordering::SeqCst))))
                    .no_dependencies()
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let graph = DependencyGraph::build(&registry).unwrap();
        let env = Environment::construct(&registry, &graph).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(env.order(), ["Leaf", "Branch", "Other"]);

        let leaf = env.resolve::<Leaf>("Leaf").unwrap();
        assert!(Arc::ptr_eq(&leaf, &env.resolve::<Branch>("Branch").unwrap().leaf));
        assert!(Arc::ptr_eq(&leaf, &env.resolve::<Other>("Other").unwrap().leaf));
        assert!(matches!(env.resolve::<Branch>("Leaf"), Err(JabError::TypeMismatch { .. })));
        assert!(matches!(env.resolve::<Leaf>("Nope"), Err(JabError::UnknownConstructor { .. })));
    }

    #[tokio::test]
    async fn test_construction_failure_is_reported() {
        let mut registry = Registry::new();
        registry
            .register(
                Provider::constructor(|_| -> Result<Leaf, crate::BoxError> { Err("disk full".into()) })
                    .no_dependencies()
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let graph = DependencyGraph::build(&registry).unwrap();
        let err = Environment::construct(&registry, &graph).await.unwrap_err();
        assert!(matches!(err, JabError::ConstructionFailed { ref provider, .. } if provider == "Leaf"));
        assert!(err.to_string().contains("disk full"));
    }
}
