//! # jab
//!
//! Structural dependency injection with an async start/run/stop lifecycle.
//!
//! ## Features
//!
//! - **Structural capabilities**: depend on `dyn Trait` capabilities matched by
//!   declared shape, or on concrete types matched exactly
//! - **Single construction**: every provider is constructed once, after its
//!   dependencies, and the same `Arc` is shared with every dependent
//! - **Lifecycle hooks**: `on_start` (ordered by its own parameters), `run`
//!   (concurrent), `on_stop` (reverse construction order)
//! - **Introspection**: describe what was built and export the graph
//!
//! ## Quick Start
//!
//! ```rust
//! use jab::{Capability, Component, Harness, Provider, Shape, Signature, TypeRef};
//! use std::sync::Arc;
//!
//! trait NumberProvider: Send + Sync {
//!     fn provide_number(&self) -> i64;
//! }
//!
//! impl Capability for dyn NumberProvider {
//!     fn shape() -> Shape {
//!         Shape::new("NumberProvider")
//!             .method("provide_number", Signature::new().returns(TypeRef::of::<i64>()))
//!     }
//! }
//!
//! struct ConcreteNumber;
//!
//! impl Component for ConcreteNumber {
//!     fn shape() -> Shape {
//!         Shape::of::<Self>()
//!             .method("provide_number", Signature::new().returns(TypeRef::of::<i64>()))
//!     }
//! }
//!
//! impl NumberProvider for ConcreteNumber {
//!     fn provide_number(&self) -> i64 {
//!         5
//!     }
//! }
//!
//! struct ClassBasic {
//!     number: i64,
//! }
//!
//! impl Component for ClassBasic {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jab::JabResult<()> {
//! let mut harness = Harness::new();
//! harness
//!     .provide(
//!         Provider::constructor(|deps| {
//!             let n = deps.capability::<dyn NumberProvider>("n")?;
//!             Ok(ClassBasic { number: n.provide_number() })
//!         })
//!         .param("n", TypeRef::capability::<dyn NumberProvider>()),
//!     )?
//!     .provide(
//!         Provider::constructor(|_| Ok(ConcreteNumber))
//!             .no_dependencies()
//!             .exposes::<dyn NumberProvider>(|this| this),
//!     )?;
//!
//! harness.build().await?;
//! let basic = harness.environment()?.resolve::<ClassBasic>("ClassBasic")?;
//! assert_eq!(basic.number, 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! [`Harness::run`] builds the harness, runs every `on_start` hook, drives all
//! `run` hooks concurrently until they finish or the harness is interrupted
//! (Ctrl-C or [`Harness::interrupt`]), and finally runs every `on_stop` hook.
//! A failing `on_stop` hook is reported without preventing the others.

pub mod adapter;
pub mod cancellation;
pub mod closure;
pub mod config;
pub mod descriptors;
pub mod environment;
pub mod error;
pub mod graph;
pub mod harness;
pub mod key;
pub mod lifecycle;
pub mod logging;
pub mod matcher;
pub mod provider;
pub mod registry;
pub mod signature;

mod internal;

pub use adapter::{EventKind, Gateway, RequestHandler, Scope};
pub use cancellation::InterruptToken;
pub use closure::Closure;
pub use config::{HandlerPolicy, HarnessConfig};
pub use descriptors::{DependencyRecord, GraphSnapshot, Provided};
pub use environment::Environment;
pub use error::{BoxError, JabError, JabResult};
pub use graph::{DependencyGraph, Edge};
pub use harness::Harness;
pub use key::TypeKey;
pub use lifecycle::{LifecycleReport, LifecycleState, Outcome, StopReport};
pub use logging::{init_subscriber, Logger, TracingLogger, DEFAULT_LOGGER};
pub use provider::{Dependencies, HookKind, HookResult, Injected, Provider, ProviderBuilder, ProviderKind};
pub use registry::{Provide, Registry};
pub use signature::{Capability, Component, Member, Param, Shape, Signature, TypeRef};
