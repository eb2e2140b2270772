//! The harness: registration, build, and lifecycle entry points.

use crate::cancellation::InterruptToken;
use crate::config::HarnessConfig;
use crate::environment::Environment;
use crate::error::{JabError, JabResult};
use crate::graph::DependencyGraph;
use crate::lifecycle::{Lifecycle, LifecycleReport, LifecycleState, Outcome, StopReport};
use crate::provider::Provider;
use crate::registry::{Provide, Registry};

/// Dependency-injection container driving a start/run/stop lifecycle.
///
/// # Examples
///
/// ```rust
/// use jab::{Component, Harness, Provider, TypeRef};
/// use std::sync::Arc;
///
/// struct Greeting(String);
/// impl Component for Greeting {}
///
/// struct Greeter { greeting: Arc<Greeting> }
/// impl Component for Greeter {}
///
/// #[tokio::main]
/// async fn main() -> jab::JabResult<()> {
///     let mut harness = Harness::new();
///     harness
///         .provide(Provider::constructor(|_| Ok(Greeting("hi".into()))).no_dependencies())?
///         .provide(
///             Provider::constructor(|deps| Ok(Greeter { greeting: deps.get("greeting")? }))
///                 .param("greeting", TypeRef::component::<Greeting>()),
///         )?;
///
///     let report = harness.run().await?;
///     assert!(report.start.is_completed());
///     Ok(())
/// }
/// ```
pub struct Harness {
    registry: Registry,
    config: HarnessConfig,
    graph: Option<DependencyGraph>,
    env: Option<Environment>,
    state: LifecycleState,
    token: InterruptToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
            graph: None,
            env: None,
            state: LifecycleState::Registering,
            token: InterruptToken::new(),
        }
    }

    /// Registers providers: a builder, a built [`Provider`], a
    /// [`Closure`](crate::Closure), or another harness whose providers are copied.
    pub fn provide<P: Provide>(&mut self, item: P) -> JabResult<&mut Self> {
        self.state.require("provide", &[LifecycleState::Registering])?;
        for provider in item.into_providers()? {
            self.registry.register(provider)?;
        }
        Ok(self)
    }

    /// Resolves the dependency graph and constructs every provider once.
    pub async fn build(&mut self) -> JabResult<()> {
        self.state.require("build", &[LifecycleState::Registering])?;

        let graph = DependencyGraph::build(&self.registry)?;
        let env = Environment::construct(&self.registry, &graph).await?;
        tracing::debug!(providers = env.len(), "harness built");

        self.graph = Some(graph);
        self.env = Some(env);
        self.state = LifecycleState::Built;
        Ok(())
    }

    /// Runs `on_start` hooks. Becomes Running on success, Interrupted otherwise.
    pub async fn start(&mut self) -> JabResult<Outcome> {
        self.state.require("start", &[LifecycleState::Built])?;
        self.state = LifecycleState::Starting;

        let outcome = self.lifecycle()?.start().await;
        self.state = if outcome.is_completed() {
            LifecycleState::Running
        } else {
            LifecycleState::Interrupted
        };
        Ok(outcome)
    }

    /// Drives every `run` hook concurrently until all finish, one fails, or the
    /// harness is interrupted.
    pub async fn run_hooks(&mut self) -> JabResult<Outcome> {
        self.state.require("run", &[LifecycleState::Running])?;
        Ok(self.lifecycle()?.run_hooks().await)
    }

    /// Runs `on_stop` hooks in reverse construction order.
    pub async fn stop(&mut self) -> JabResult<StopReport> {
        self.state.require("stop", &[LifecycleState::Running, LifecycleState::Interrupted])?;
        self.state = LifecycleState::Stopping;

        let report = self.lifecycle()?.stop().await;
        self.state = LifecycleState::Stopped;
        Ok(report)
    }

    /// Builds if needed, starts, runs, and always stops once Starting began.
    /// Ctrl-C interrupts the harness while this is in progress.
    pub async fn run(&mut self) -> JabResult<LifecycleReport> {
        if self.state == LifecycleState::Registering {
            self.build().await?;
        }
        self.state.require("run", &[LifecycleState::Built])?;

        let _ctrl_c = AbortOnDrop(self.token.interrupt_on_ctrl_c());

        let start = self.start().await?;
        let run = if start.is_completed() {
            Some(self.run_hooks().await?)
        } else {
            None
        };
        let stop = self.stop().await?;

        Ok(LifecycleReport { start, run, stop })
    }

    /// Signals the interrupt token.
    pub fn interrupt(&self) {
        self.token.interrupt();
    }

    pub fn interrupt_token(&self) -> InterruptToken {
        self.token.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> JabResult<&DependencyGraph> {
        self.graph.as_ref().ok_or_else(|| JabError::InvalidState {
            operation: "inspect the graph",
            state: self.state.to_string(),
        })
    }

    pub fn environment(&self) -> JabResult<&Environment> {
        self.env.as_ref().ok_or_else(|| JabError::InvalidState {
            operation: "inspect the environment",
            state: self.state.to_string(),
        })
    }

    fn lifecycle(&self) -> JabResult<Lifecycle<'_>> {
        Ok(Lifecycle {
            registry: &self.registry,
            env: self.environment()?,
            config: &self.config,
            token: &self.token,
        })
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("state", &self.state)
            .field("providers", &self.registry)
            .finish()
    }
}

impl Provide for &Harness {
    fn into_providers(self) -> JabResult<Vec<Provider>> {
        Ok(self.registry.iter().cloned().collect())
    }
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
