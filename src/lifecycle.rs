//! Start, run and stop phases.
//!
//! - **Starting**: `on_start` hooks run one at a time, ordered by the extra
//!   parameters they declare. The first failure or an interrupt ends the
//!   phase.
//! - **Running**: every `run` hook is launched at once and joined in a single
//!   task, raced against the interrupt token.
//! - **Stopping**: `on_stop` hooks run one at a time in reverse construction
//!   order. A failing hook is recorded and the others still run.

use std::collections::HashMap;
use std::fmt;

use futures::future::try_join_all;
use serde::Serialize;
use tokio::time::Instant;

use crate::cancellation::InterruptToken;
use crate::config::HarnessConfig;
use crate::environment::Environment;
use crate::error::{BoxError, JabError, JabResult};
use crate::graph::{resolve_params, Edge};
use crate::internal::toposort;
use crate::provider::{Dependencies, HookKind};
use crate::registry::Registry;

/// Harness lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleState {
    /// Accepting providers.
    Registering,
    /// Graph resolved and every instance constructed.
    Built,
    Starting,
    /// Starting did not complete.
    Interrupted,
    Running,
    Stopping,
    Stopped,
}

impl LifecycleState {
    /// Fails with [`JabError::InvalidState`] unless the state is one of `allowed`.
    pub(crate) fn require(self, operation: &'static str, allowed: &[LifecycleState]) -> JabResult<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(JabError::InvalidState {
                operation,
                state: self.to_string(),
            })
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Registering => "registering",
            LifecycleState::Built => "built",
            LifecycleState::Starting => "starting",
            LifecycleState::Interrupted => "interrupted",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        })
    }
}

/// How a start or run phase ended.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// The interrupt token fired.
    Interrupted,
    Failed(JabError),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Outcome::Interrupted)
    }

    pub fn error(&self) -> Option<&JabError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Result of the stop phase.
#[derive(Debug, Default)]
pub struct StopReport {
    /// Providers whose `on_stop` completed, in the order they ran.
    pub stopped: Vec<String>,
    pub failures: Vec<JabError>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of [`Harness::run`](crate::Harness::run).
#[derive(Debug)]
pub struct LifecycleReport {
    pub start: Outcome,
    /// `None` when Starting did not complete.
    pub run: Option<Outcome>,
    pub stop: StopReport,
}

/// Drives hooks over a constructed environment.
pub(crate) struct Lifecycle<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) env: &'a Environment,
    pub(crate) config: &'a HarnessConfig,
    pub(crate) token: &'a InterruptToken,
}

impl Lifecycle<'_> {
    pub(crate) async fn start(&self) -> Outcome {
        tracing::debug!("executing on_start methods");

        tokio::select! {
            biased;
            _ = self.token.interrupted() => {
                tracing::error!("interrupted during execution of on_start methods");
                Outcome::Interrupted
            }
            result = self.start_hooks() => match result {
                Ok(()) => Outcome::Completed,
                Err(err) => {
                    tracing::error!(error = %err, "on_start failed");
                    Outcome::Failed(err)
                }
            },
        }
    }

    /// Providers with an `on_start` hook, ordered by the hook's own parameters.
    fn start_plan(&self) -> JabResult<Vec<(String, Vec<Edge>)>> {
        let mut plan = Vec::new();
        for name in self.env.order() {
            let Some(provider) = self.registry.get(name) else {
                continue;
            };
            if provider.has_hook(HookKind::OnStart) {
                let edges = resolve_params(self.registry, name, provider.start_params())?;
                plan.push((name.clone(), edges));
            }
        }

        let order = toposort::order(
            plan.iter().map(|(name, _)| name.as_str()),
            plan.iter()
                .flat_map(|(name, edges)| edges.iter().map(move |e| (name.as_str(), e.target.as_str()))),
        )?;

        // Targets without an on_start hook only constrain the order.
        let mut hooked: HashMap<String, Vec<Edge>> = plan.into_iter().collect();
        Ok(order
            .into_iter()
            .filter_map(|name| hooked.remove(&name).map(|edges| (name, edges)))
            .collect())
    }

    async fn start_hooks(&self) -> JabResult<()> {
        let plan = self.start_plan()?;
        let budget = self.config.start_timeout();
        let deadline = budget.map(|limit| Instant::now() + limit);

        for (name, edges) in plan {
            let (Some(provider), Some(injected)) = (self.registry.get(&name), self.env.get(&name)) else {
                continue;
            };
            let Some(hook) = provider.hook(HookKind::OnStart) else {
                continue;
            };

            if self.config.require_async_start && !hook.is_async() {
                return Err(JabError::InvalidLifecycleMethod {
                    provider: name,
                    hook: HookKind::OnStart,
                    reason: "on_start must be asynchronous",
                });
            }

            let deps = self.env.dependencies_for(&name, &edges)?;
            let call = hook.invoke(injected.instance().clone(), deps, self.token.clone());
            let result = match (deadline, budget) {
                (Some(deadline), Some(limit)) => tokio::time::timeout_at(deadline, call)
                    .await
                    .map_err(|_| JabError::HookTimedOut {
                        provider: name.clone(),
                        hook: HookKind::OnStart,
                        timeout: limit,
                    })?,
                _ => call.await,
            };
            result.map_err(|source| JabError::HookFailed {
                provider: name.clone(),
                hook: HookKind::OnStart,
                source,
            })?;

            tracing::debug!(provider = %name, "executed on_start");
        }
        Ok(())
    }

    pub(crate) async fn run_hooks(&self) -> Outcome {
        let mut launched = Vec::new();
        for injected in self.env.iter() {
            let Some(hook) = self.registry.get(injected.name()).and_then(|p| p.hook(HookKind::Run)) else {
                continue;
            };
            if !hook.is_async() {
                let err = JabError::InvalidLifecycleMethod {
                    provider: injected.name().to_string(),
                    hook: HookKind::Run,
                    reason: "run must be asynchronous",
                };
                tracing::error!(error = %err, "refusing to execute run methods");
                return Outcome::Failed(err);
            }
            tracing::debug!(provider = injected.name(), "added run method");
            launched.push((injected.name().to_string(), hook.clone(), injected.instance().clone()));
        }

        if launched.is_empty() {
            return Outcome::Completed;
        }

        let hooks = launched.into_iter().map(|(name, hook, instance)| {
            let token = self.token.clone();
            async move {
                let deps = Dependencies::new(name.clone(), Vec::new());
                hook.invoke(instance, deps, token)
                    .await
                    .map_err(|source| JabError::HookFailed {
                        provider: name,
                        hook: HookKind::Run,
                        source,
                    })
            }
        });

        tracing::debug!("executing run methods");
        tokio::select! {
            biased;
            _ = self.token.interrupted() => {
                tracing::error!("interrupted during execution of run methods");
                Outcome::Interrupted
            }
            result = try_join_all(hooks) => match result {
                Ok(_) => Outcome::Completed,
                Err(err) => {
                    tracing::error!(error = %err, "unexpected error during execution of run methods");
                    Outcome::Failed(err)
                }
            },
        }
    }

    pub(crate) async fn stop(&self) -> StopReport {
        let mut report = StopReport::default();

        for injected in self.env.iter().rev() {
            let name = injected.name();
            let Some(hook) = self.registry.get(name).and_then(|p| p.hook(HookKind::OnStop)) else {
                continue;
            };

            let call = hook.invoke(
                injected.instance().clone(),
                Dependencies::new(name, Vec::new()),
                self.token.clone(),
            );
            let failed = |source: BoxError| JabError::HookFailed {
                provider: name.to_string(),
                hook: HookKind::OnStop,
                source,
            };
            let result = match self.config.stop_hook_timeout() {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result.map_err(failed),
                    Err(_) => Err(JabError::HookTimedOut {
                        provider: name.to_string(),
                        hook: HookKind::OnStop,
                        timeout: limit,
                    }),
                },
                None => call.await.map_err(failed),
            };

            match result {
                Ok(()) => {
                    tracing::debug!(provider = name, "executed on_stop");
                    report.stopped.push(name.to_string());
                }
                Err(err) => {
                    tracing::error!(error = %err, "on_stop failed, continuing");
                    report.failures.push(err);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_guard() {
        assert!(LifecycleState::Built.require("start", &[LifecycleState::Built]).is_ok());
        let err = LifecycleState::Stopped
            .require("start", &[LifecycleState::Built])
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot start while the harness is stopped");
    }

    #[test]
    fn test_outcome_accessors() {
        assert!(Outcome::Completed.is_completed());
        assert!(Outcome::Interrupted.is_interrupted());
        let failed = Outcome::Failed(JabError::NoRequestHandler);
        assert!(failed.error().is_some());
        assert!(!failed.is_completed());
        assert!(StopReport::default().is_clean());
    }
}
