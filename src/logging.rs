//! Logging capability and the default logger.
//!
//! Components that want a logger depend on `dyn Logger`. When no provided
//! component satisfies it, the harness injects a [`TracingLogger`] under the
//! name [`DEFAULT_LOGGER`]. This is the only dependency the harness ever
//! supplies by default.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::config::HarnessConfig;
use crate::error::{JabError, JabResult};
use crate::key::TypeKey;
use crate::provider::{AnyArc, Injected, ViewTable};
use crate::signature::{Capability, Component, Shape, Signature, TypeRef};

/// Produced name of the default logger. Contains a space, so it can never
/// collide with a type-derived provider name.
pub const DEFAULT_LOGGER: &str = "DEFAULT LOGGER";

/// Environment variable read by [`init_subscriber`].
pub const LOG_ENV: &str = "JAB_LOG";

/// Leveled logging capability.
pub trait Logger: Send + Sync {
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn warning(&self, msg: &str);
    fn error(&self, msg: &str);
    fn critical(&self, msg: &str);
}

fn logging_methods(shape: Shape) -> Shape {
    ["debug", "info", "warning", "error", "critical"]
        .into_iter()
        .fold(shape, |shape, level| {
            shape.method(level, Signature::new().param("msg", TypeRef::of::<str>()))
        })
}

impl Capability for dyn Logger {
    fn shape() -> Shape {
        logging_methods(Shape::new("Logger"))
    }
}

/// Logger forwarding every call to `tracing` under the `jab` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Component for TracingLogger {
    fn shape() -> Shape {
        logging_methods(Shape::of::<Self>())
    }
}

impl Logger for TracingLogger {
    fn debug(&self, msg: &str) {
        tracing::debug!(target: "jab", "{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!(target: "jab", "{}", msg);
    }

    fn warning(&self, msg: &str) {
        tracing::warn!(target: "jab", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "jab", "{}", msg);
    }

    // tracing has no level above error
    fn critical(&self, msg: &str) {
        tracing::error!(target: "jab", critical = true, "{}", msg);
    }
}

/// Key of the `dyn Logger` view.
pub(crate) fn logger_key() -> TypeKey {
    TypeKey::of::<dyn Logger>()
}

/// Whether a declared parameter asks for the logging capability.
pub(crate) fn is_logger_capability(ty: &TypeRef) -> bool {
    ty.as_capability()
        .and_then(|cap| cap.view())
        .is_some_and(|view| view == logger_key())
}

static DEFAULT: OnceCell<Injected> = OnceCell::new();

/// The process-wide default logger. Every harness binds the same instance.
pub(crate) fn default_logger() -> Injected {
    DEFAULT
        .get_or_init(|| {
            let mut views = ViewTable::default();
            views.insert::<TracingLogger, dyn Logger>(|this| this);
            let instance: AnyArc = Arc::new(TracingLogger::new());
            Injected::new(DEFAULT_LOGGER, instance, Arc::new(views))
        })
        .clone()
}

/// Installs a global `tracing` fmt subscriber.
///
/// The filter comes from `JAB_LOG` when set, otherwise from
/// [`HarnessConfig::log_filter`]. Fails if a global subscriber is already set.
pub fn init_subscriber(config: &HarnessConfig) -> JabResult<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| JabError::Config(format!("unable to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher;

    #[test]
    fn test_tracing_logger_satisfies_capability() {
        let logger = <dyn Logger as Capability>::shape();
        assert!(matcher::satisfies(&TracingLogger::shape(), &logger).unwrap());
        assert!(!matcher::satisfies(&Shape::new("Silent"), &logger).unwrap());
    }

    #[test]
    fn test_default_logger_exposes_view() {
        let injected = default_logger();
        assert_eq!(injected.name(), DEFAULT_LOGGER);
        let logger = injected.view::<dyn Logger>().expect("logger view");
        logger.info("hello from the default logger");
        assert!(injected.same_instance(&default_logger()));
        assert!(is_logger_capability(&TypeRef::capability::<dyn Logger>()));
        assert!(!is_logger_capability(&TypeRef::structural(<dyn Logger as Capability>::shape())));
    }
}
