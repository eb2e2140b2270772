//! Dependency graph construction.
//!
//! Every declared parameter is bound to exactly one provider:
//!
//! - a capability parameter binds to the first provider, in registration
//!   order, whose shape satisfies the capability and which exposes the
//!   capability's trait object view;
//! - a concrete parameter binds to the first provider producing that exact type;
//! - an unsatisfied `dyn Logger` parameter binds to the default logger.
//!
//! Anything else is a [`JabError::MissingDependency`].

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{JabError, JabResult};
use crate::internal::toposort;
use crate::logging::{is_logger_capability, DEFAULT_LOGGER};
use crate::matcher;
use crate::provider::HookKind;
use crate::registry::Registry;
use crate::signature::{CapabilityRef, Param, TypeRef};

/// A resolved parameter: `parameter` is satisfied by provider `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub parameter: String,
    pub target: String,
}

/// Resolved dependencies of every provider plus their construction order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: HashMap<String, Vec<Edge>>,
    order: Vec<String>,
}

impl DependencyGraph {
    pub fn build(registry: &Registry) -> JabResult<Self> {
        let mut edges = HashMap::with_capacity(registry.len());
        for provider in registry.iter() {
            let resolved = resolve_params(registry, provider.name(), provider.params())?;
            edges.insert(provider.name().to_string(), resolved);
        }

        let nodes: Vec<String> = registry.names().map(str::to_string).collect();
        let order = toposort::order(
            nodes.iter().map(String::as_str),
            nodes.iter().flat_map(|name| {
                edges
                    .get(name)
                    .into_iter()
                    .flatten()
                    .map(move |edge: &Edge| (name.as_str(), edge.target.as_str()))
            }),
        )?;

        tracing::debug!(order = ?order, "dependency graph built");
        Ok(Self { nodes, edges, order })
    }

    /// Construction order. Includes the default logger when it is used.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Registered provider names, in registration order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Resolved parameters of `name`, in declaration order.
    pub fn dependencies(&self, name: &str) -> &[Edge] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Providers that depend on `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter(|n| self.dependencies(n).iter().any(|e| e.target == name))
            .map(String::as_str)
            .collect()
    }

    pub fn uses_default_logger(&self) -> bool {
        self.order.iter().any(|n| n == DEFAULT_LOGGER)
    }
}

/// Binds each parameter of `owner` to a provider name.
pub(crate) fn resolve_params(registry: &Registry, owner: &str, params: &[Param]) -> JabResult<Vec<Edge>> {
    params
        .iter()
        .map(|param| {
            resolve(registry, owner, param).map(|target| Edge {
                parameter: param.name.clone(),
                target,
            })
        })
        .collect()
}

/// Whether some `on_start` hook binds the default logger. Resolution errors
/// are left for the start phase to report.
pub(crate) fn start_phase_uses_default_logger(registry: &Registry) -> bool {
    registry
        .iter()
        .filter(|provider| provider.has_hook(HookKind::OnStart))
        .filter_map(|provider| resolve_params(registry, provider.name(), provider.start_params()).ok())
        .flatten()
        .any(|edge| edge.target == DEFAULT_LOGGER)
}

fn resolve(registry: &Registry, owner: &str, param: &Param) -> JabResult<String> {
    let found = match &param.ty {
        TypeRef::Capability(capability) => find_capability(registry, capability)?,
        TypeRef::Concrete { key, .. } => registry.find_by_type(key).map(|p| p.name().to_string()),
        TypeRef::Union(_) | TypeRef::Unannotated => None,
    };

    match found {
        Some(target) => Ok(target),
        None if is_logger_capability(&param.ty) => Ok(DEFAULT_LOGGER.to_string()),
        None => Err(JabError::MissingDependency {
            provider: owner.to_string(),
            parameter: param.name.clone(),
            required: param.ty.to_string(),
        }),
    }
}

fn find_capability(registry: &Registry, capability: &CapabilityRef) -> JabResult<Option<String>> {
    let required = capability.shape();
    for provider in registry.iter() {
        if !matcher::satisfies(provider.shape(), &required)? {
            continue;
        }

        if let Some(view) = capability.view() {
            if !provider.exposes(&view) {
                tracing::debug!(
                    provider = provider.name(),
                    capability = required.name(),
                    "structurally compatible but exposes no view, skipped"
                );
                continue;
            }
        }

        return Ok(Some(provider.name().to_string()));
    }
    Ok(None)
}
