//! Ready-made values with their own identity.
//!
//! Constructors are keyed by the type they produce, so two instances of the
//! same type cannot be provided side by side. A [`Closure`] wraps an existing
//! value and names it `"<ShortTypeName>-<uuid>"`, giving every closure a
//! distinct produced name while dependents still match it by type or shape.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::JabResult;
use crate::key::short_name_of;
use crate::provider::{Provider, ProviderBuilder};
use crate::signature::Component;

/// A provided value with a unique name.
///
/// # Examples
///
/// ```rust
/// use jab::{Closure, Component};
///
/// struct Route { path: &'static str }
/// impl Component for Route {}
///
/// let a = Closure::new(Route { path: "/a" });
/// let b = Closure::new(Route { path: "/b" });
///
/// assert!(a.id().starts_with("Route-"));
/// assert_ne!(a.id(), b.id());
/// assert_eq!(a.path, "/a");
/// ```
pub struct Closure<T> {
    id: String,
    value: Arc<T>,
}

impl<T: Component> Closure<T> {
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(value: Arc<T>) -> Self {
        Self {
            id: format!("{}-{}", short_name_of::<T>(), Uuid::new_v4()),
            value,
        }
    }

    /// Unique produced name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The shared value handed to every dependent.
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// Provider builder for this closure, for adding views or hooks before
    /// providing it.
    pub fn builder(&self) -> ProviderBuilder<T> {
        ProviderBuilder::new()
            .shared(self.value.clone())
            .named(self.id.clone())
            .no_dependencies()
    }

    /// Factory provider named by [`id`](Self::id).
    pub fn provider(&self) -> JabResult<Provider> {
        self.builder().build()
    }
}

impl<T> Clone for Closure<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> Deref for Closure<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> fmt::Debug for Closure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Closure").field(&self.id).finish()
    }
}
