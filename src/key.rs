//! Type identity used for exact (nominal) dependency matching.

use std::any::TypeId;
use std::fmt;

/// Stable identifier for a Rust type.
///
/// Equality and hashing only look at the `TypeId`; the full `type_name` is
/// kept for diagnostics.
///
/// # Examples
///
/// ```rust
/// use jab::TypeKey;
///
/// let key = TypeKey::of::<Vec<String>>();
/// assert_eq!(key, TypeKey::of::<Vec<String>>());
/// assert_ne!(key, TypeKey::of::<Vec<u8>>());
/// assert_eq!(key.short_name(), "Vec<String>");
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`. Works for unsized types such as `dyn Trait`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full `std::any::type_name` of the type.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths removed.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strips module paths from every path segment of a type name.
///
/// `alloc::vec::Vec<my_app::Thing>` becomes `Vec<Thing>`, `dyn my_app::Logger`
/// becomes `dyn Logger`.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}

/// Short name of `T`, as used for the produced name of a constructor.
pub fn short_name_of<T: ?Sized + 'static>() -> String {
    short_type_name(std::any::type_name::<T>())
}
