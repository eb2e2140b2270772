//! Error types for the harness.

use std::time::Duration;

use crate::provider::HookKind;

/// Boxed error returned by user constructors, factories and lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Harness errors
///
/// Covers registration, graph construction, structural matching, lifecycle
/// and introspection failures.
///
/// # Examples
///
/// ```rust
/// use jab::JabError;
///
/// let missing = JabError::MissingDependency {
///     provider: "ClassBasic".to_string(),
///     parameter: "n".to_string(),
///     required: "NumberProvider".to_string(),
/// };
/// assert_eq!(
///     missing.to_string(),
///     "Can't build dependencies for ClassBasic. Missing suitable argument for parameter n [NumberProvider]"
/// );
///
/// let cycle = JabError::CircularDependency { cycle: vec!["A".into(), "B".into()] };
/// assert_eq!(cycle.to_string(), "Circular dependency between: A, B");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum JabError {
    /// A provider was registered without a constructor or factory
    #[error("Provided argument '{provider}' does not have a constructor function")]
    NoConstructor { provider: String },

    /// A provider declared no parameter information, or an unannotated parameter
    #[error("Provided argument '{provider}' does not have a type-annotated constructor")]
    NoAnnotation { provider: String },

    /// Two providers claim the same produced name
    #[error("Cannot provide object {new} under name \"{name}\". Name is already taken by object {existing}")]
    DuplicateProvide {
        name: String,
        new: String,
        existing: String,
    },

    /// No provider satisfies a declared parameter
    #[error("Can't build dependencies for {provider}. Missing suitable argument for parameter {parameter} [{required}]")]
    MissingDependency {
        provider: String,
        parameter: String,
        required: String,
    },

    /// No acyclic ordering exists
    #[error("Circular dependency between: {}", cycle.join(", "))]
    CircularDependency { cycle: Vec<String> },

    /// A lifecycle hook is not in the required asynchronous form
    #[error("{provider}.{hook} is not a valid lifecycle method: {reason}")]
    InvalidLifecycleMethod {
        provider: String,
        hook: HookKind,
        reason: &'static str,
    },

    /// Introspection of something that was never registered or built
    #[error("{name} not registered with jab harness")]
    UnknownConstructor { name: String },

    /// A union return type makes structural satisfaction undecidable
    #[error("Member {member} returns union {union}; satisfaction cannot be decided statically")]
    AmbiguousReturnType { member: String, union: String },

    /// A dependency bag could not produce the requested type
    #[error("Parameter {parameter} of {provider} cannot be viewed as {expected}")]
    TypeMismatch {
        provider: String,
        parameter: String,
        expected: &'static str,
    },

    /// A constructor or factory returned an error
    #[error("Constructing {provider} failed: {source}")]
    ConstructionFailed {
        provider: String,
        #[source]
        source: BoxError,
    },

    /// A lifecycle hook returned an error
    #[error("{provider}.{hook} failed: {source}")]
    HookFailed {
        provider: String,
        hook: HookKind,
        #[source]
        source: BoxError,
    },

    /// A lifecycle hook exceeded its configured timeout
    #[error("{provider}.{hook} did not finish within {timeout:?}")]
    HookTimedOut {
        provider: String,
        hook: HookKind,
        timeout: Duration,
    },

    /// Operation attempted in the wrong lifecycle state
    #[error("Cannot {operation} while the harness is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// A request arrived but no component implements the request handler capability
    #[error("No provided component implements the request handler capability")]
    NoRequestHandler,

    /// Several components implement the request handler capability
    #[error("Several components implement the request handler capability: {}", candidates.join(", "))]
    AmbiguousHandler { candidates: Vec<String> },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for harness operations
///
/// # Examples
///
/// ```rust
/// use jab::{JabError, JabResult};
///
/// fn lookup(name: &str) -> JabResult<()> {
///     Err(JabError::UnknownConstructor { name: name.to_string() })
/// }
///
/// assert!(lookup("Nope").is_err());
/// ```
pub type JabResult<T> = Result<T, JabError>;
