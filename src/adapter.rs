//! Request-serving adapter.
//!
//! A protocol server hands every connection to [`Gateway::dispatch`] together
//! with a receive and a send primitive. Lifespan connections drive the
//! harness: `lifespan.startup` builds and starts it, `lifespan.shutdown`
//! stops it. Http and websocket connections are forwarded untouched to the
//! component that implements [`RequestHandler`].
//!
//! # Examples
//!
//! ```rust
//! use jab::adapter::{EventKind, Gateway, Message, ReceiveFn, Scope, SendFn};
//! use jab::Harness;
//! use futures::FutureExt;
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! # async fn example() -> Result<(), jab::BoxError> {
//! let gateway = Gateway::new(Harness::new());
//!
//! let inbox = Arc::new(Mutex::new(vec![json!({ "type": "lifespan.startup" })]));
//! let receive: ReceiveFn = Arc::new(move || {
//!     let next = inbox.lock().unwrap().pop();
//!     async move { next.ok_or_else(|| jab::BoxError::from("closed")) }.boxed()
//! });
//! let sent = Arc::new(Mutex::new(Vec::<Message>::new()));
//! let outbox = sent.clone();
//! let send: SendFn = Arc::new(move |msg: Message| {
//!     outbox.lock().unwrap().push(msg);
//!     async { Ok::<(), jab::BoxError>(()) }.boxed()
//! });
//!
//! // No component handles requests, so startup reports a failure.
//! let _ = gateway.dispatch(Scope::new(EventKind::Lifespan))(receive, send).await;
//! assert_eq!(sent.lock().unwrap()[0]["type"], "lifespan.startup.failed");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::config::HandlerPolicy;
use crate::error::{BoxError, JabError, JabResult};
use crate::harness::Harness;
use crate::key::TypeKey;
use crate::lifecycle::{LifecycleState, Outcome};
use crate::matcher;
use crate::signature::{Capability, Shape, Signature, TypeRef};

/// Protocol message: a JSON object with a `"type"` field.
pub type Message = Value;

/// Reads the next message of a connection.
pub type ReceiveFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Message, BoxError>> + Send + Sync>;

/// Writes a message to a connection.
pub type SendFn = Arc<dyn Fn(Message) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Connection handler returned by [`Gateway::dispatch`].
pub type EventHandler = Box<dyn FnOnce(ReceiveFn, SendFn) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Lifespan,
    Http,
    Websocket,
}

/// Connection metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Scope {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            attributes: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Parses a scope object such as `{"type": "http", "path": "/"}`.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// Capability of a component that serves http and websocket connections.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, scope: Scope, receive: ReceiveFn, send: SendFn) -> Result<(), BoxError>;
}

/// Signature of [`RequestHandler::handle`], for use in component shapes.
pub fn handle_signature() -> Signature {
    Signature::new()
        .param("scope", TypeRef::of::<Scope>())
        .param("receive", TypeRef::of::<ReceiveFn>())
        .param("send", TypeRef::of::<SendFn>())
        .returns(TypeRef::of::<Result<(), BoxError>>())
}

impl Capability for dyn RequestHandler {
    fn shape() -> Shape {
        Shape::new("RequestHandler").method("handle", handle_signature())
    }
}

type Bound = Arc<RwLock<Option<Arc<dyn RequestHandler>>>>;

/// Entry point for a protocol server.
#[derive(Clone)]
pub struct Gateway {
    harness: Arc<Mutex<Harness>>,
    handler: Bound,
}

impl Gateway {
    pub fn new(harness: Harness) -> Self {
        Self {
            harness: Arc::new(Mutex::new(harness)),
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Shared handle to the wrapped harness.
    pub fn harness(&self) -> Arc<Mutex<Harness>> {
        self.harness.clone()
    }

    /// Handler for a new connection.
    pub fn dispatch(&self, scope: Scope) -> EventHandler {
        let harness = self.harness.clone();
        let bound = self.handler.clone();

        match scope.kind {
            EventKind::Lifespan => Box::new(move |receive, send| lifespan(harness, bound, receive, send).boxed()),
            EventKind::Http | EventKind::Websocket => Box::new(move |receive, send| {
                async move {
                    let handler = bound.read().await.clone().ok_or(JabError::NoRequestHandler)?;
                    handler.handle(scope, receive, send).await
                }
                .boxed()
            }),
        }
    }
}

async fn lifespan(
    harness: Arc<Mutex<Harness>>,
    bound: Bound,
    receive: ReceiveFn,
    send: SendFn,
) -> Result<(), BoxError> {
    loop {
        let msg = receive().await?;
        match msg.get("type").and_then(Value::as_str) {
            Some("lifespan.startup") => {
                let mut harness = harness.lock().await;
                let reply = match startup(&mut harness).await {
                    Ok(handler) => {
                        *bound.write().await = Some(handler);
                        json!({ "type": "lifespan.startup.complete" })
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "lifespan startup failed");
                        shutdown(&mut harness).await;
                        json!({ "type": "lifespan.startup.failed", "message": err.to_string() })
                    }
                };
                send(reply).await?;
            }
            Some("lifespan.shutdown") => {
                shutdown(&mut *harness.lock().await).await;
                bound.write().await.take();
                send(json!({ "type": "lifespan.shutdown.complete" })).await?;
                return Ok(());
            }
            other => tracing::debug!(message = ?other, "ignoring lifespan message"),
        }
    }
}

async fn startup(harness: &mut Harness) -> JabResult<Arc<dyn RequestHandler>> {
    if harness.state() == LifecycleState::Registering {
        harness.build().await?;
    }
    match harness.start().await? {
        Outcome::Completed => bind_handler(harness),
        Outcome::Interrupted => Err(JabError::InvalidState {
            operation: "serve requests",
            state: LifecycleState::Interrupted.to_string(),
        }),
        Outcome::Failed(err) => Err(err),
    }
}

async fn shutdown(harness: &mut Harness) {
    if !matches!(harness.state(), LifecycleState::Running | LifecycleState::Interrupted) {
        return;
    }
    match harness.stop().await {
        Ok(report) => {
            for failure in &report.failures {
                tracing::warn!(error = %failure, "on_stop failed during lifespan shutdown");
            }
        }
        Err(err) => tracing::error!(error = %err, "lifespan shutdown failed"),
    }
}

/// First constructed instance exposing and satisfying `dyn RequestHandler`.
fn bind_handler(harness: &Harness) -> JabResult<Arc<dyn RequestHandler>> {
    let required = <dyn RequestHandler as Capability>::shape();
    let env = harness.environment()?;

    let mut candidates = Vec::new();
    for injected in env.exposing(&TypeKey::of::<dyn RequestHandler>()) {
        let Some(provider) = harness.registry().get(injected.name()) else {
            continue;
        };
        if matcher::satisfies(provider.shape(), &required)? {
            candidates.push(injected);
        }
    }

    let Some(first) = candidates.first() else {
        return Err(JabError::NoRequestHandler);
    };

    if candidates.len() > 1 {
        let names: Vec<String> = candidates.iter().map(|c| c.name().to_string()).collect();
        match harness.config().handler_policy {
            HandlerPolicy::Reject => return Err(JabError::AmbiguousHandler { candidates: names }),
            HandlerPolicy::FirstMatch => {
                tracing::warn!(bound = first.name(), candidates = ?names, "several request handlers provided, using the first")
            }
        }
    }

    first.view::<dyn RequestHandler>().ok_or(JabError::NoRequestHandler)
}
