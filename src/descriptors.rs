//! Read-only introspection of a built harness.
//!
//! [`Harness::describe`] walks the environment and returns, for every
//! provider, the instance it produced and the providers bound to each of its
//! parameters, recursively. [`Harness::snapshot`] flattens the same
//! information into a serializable graph for export.
//!
//! # Examples
//!
//! ```rust
//! use jab::{Component, Harness, Logger, Provider, TypeRef, DEFAULT_LOGGER};
//!
//! struct Service;
//! impl Component for Service {}
//!
//! # async fn example() -> jab::JabResult<()> {
//! let mut harness = Harness::new();
//! harness.provide(
//!     Provider::constructor(|_| Ok(Service)).param("log", TypeRef::capability::<dyn Logger>()),
//! )?;
//! harness.build().await?;
//!
//! let service = harness.describe_type::<Service>()?;
//! assert_eq!(service.dependencies[0].provided.name, DEFAULT_LOGGER);
//! assert!(service.dependencies[0].provided.provider.is_none());
//!
//! let dot = harness.snapshot()?.to_dot();
//! assert!(dot.contains("\"Service\" -> \"DEFAULT LOGGER\""));
//! # Ok(())
//! # }
//! ```

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{JabError, JabResult};
use crate::harness::Harness;
use crate::provider::{HookKind, Injected, Provider};
use crate::signature::TypeRef;

/// A constructed provider and what it was built from.
#[derive(Debug, Clone)]
pub struct Provided {
    pub name: String,
    /// `None` for the default logger, which has no registered provider.
    pub provider: Option<Provider>,
    pub instance: Injected,
    pub dependencies: Vec<DependencyRecord>,
}

/// One resolved parameter of a [`Provided`].
#[derive(Debug, Clone)]
pub struct DependencyRecord {
    pub parameter: String,
    /// Type the parameter declared.
    pub required: TypeRef,
    pub provided: Box<Provided>,
}

impl Harness {
    /// Every provider, in registration order.
    pub fn describe(&self) -> JabResult<Vec<Provided>> {
        self.registry()
            .names()
            .map(|name| self.describe_provider(name))
            .collect()
    }

    /// The provider registered under `name`.
    pub fn describe_provider(&self, name: &str) -> JabResult<Provided> {
        let unknown = || JabError::UnknownConstructor { name: name.to_string() };
        let env = self.environment().map_err(|_| unknown())?;
        let instance = env.get(name).ok_or_else(unknown)?.clone();

        let Some(provider) = self.registry().get(name).cloned() else {
            return Ok(Provided {
                name: name.to_string(),
                provider: None,
                instance,
                dependencies: Vec::new(),
            });
        };

        let graph = self.graph().map_err(|_| unknown())?;
        let dependencies = graph
            .dependencies(name)
            .iter()
            .map(|edge| {
                let required = provider
                    .params()
                    .iter()
                    .find(|p| p.name == edge.parameter)
                    .map(|p| p.ty.clone())
                    .unwrap_or(TypeRef::Unannotated);
                Ok(DependencyRecord {
                    parameter: edge.parameter.clone(),
                    required,
                    provided: Box::new(self.describe_provider(&edge.target)?),
                })
            })
            .collect::<JabResult<Vec<_>>>()?;

        Ok(Provided {
            name: name.to_string(),
            provider: Some(provider),
            instance,
            dependencies,
        })
    }

    /// The first constructed instance of type `T`.
    pub fn describe_type<T: std::any::Any + Send + Sync>(&self) -> JabResult<Provided> {
        let unknown = || JabError::UnknownConstructor {
            name: std::any::type_name::<T>().to_string(),
        };
        let env = self.environment().map_err(|_| unknown())?;
        let found = env.iter().find(|i| i.downcast::<T>().is_some()).ok_or_else(unknown)?;
        self.describe_provider(found.name())
    }

    /// Nodes and edges of the built graph, in construction order.
    pub fn snapshot(&self) -> JabResult<GraphSnapshot> {
        let graph = self.graph()?;
        let mut snapshot = GraphSnapshot::default();

        for name in graph.order() {
            let provider = self.registry().get(name);
            snapshot.nodes.push(NodeSnapshot {
                name: name.clone(),
                kind: provider.map_or_else(|| "default".to_string(), |p| p.kind().to_string()),
                type_name: provider
                    .map(|p| p.produces().type_name().to_string())
                    .unwrap_or_else(|| std::any::type_name::<crate::logging::TracingLogger>().to_string()),
                hooks: provider
                    .map(|p| {
                        [HookKind::OnStart, HookKind::Run, HookKind::OnStop]
                            .into_iter()
                            .filter(|kind| p.has_hook(*kind))
                            .map(|kind| kind.to_string())
                            .collect()
                    })
                    .unwrap_or_default(),
            });

            for edge in graph.dependencies(name) {
                snapshot.edges.push(EdgeSnapshot {
                    from: name.clone(),
                    to: edge.target.clone(),
                    parameter: edge.parameter.clone(),
                });
            }
        }

        Ok(snapshot)
    }
}

/// Serializable view of the dependency graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub type_name: String,
    /// `constructor`, `factory` or `default`.
    pub kind: String,
    pub hooks: Vec<String>,
}

/// `from` depends on `to` through `parameter`.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub from: String,
    pub to: String,
    pub parameter: String,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Graphviz DOT rendering.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph jab {\n    rankdir=LR;\n");
        for node in &self.nodes {
            let _ = writeln!(out, "    {:?} [label={:?}];", node.name, format!("{}\n{}", node.name, node.kind));
        }
        for edge in &self.edges {
            let _ = writeln!(out, "    {:?} -> {:?} [label={:?}];", edge.from, edge.to, edge.parameter);
        }
        out.push_str("}\n");
        out
    }
}
