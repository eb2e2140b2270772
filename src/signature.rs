//! Declared signatures: the static description of what a type exposes.
//!
//! Structural matching never inspects values. Every concrete type declares a
//! [`Shape`] (its fields and method signatures) through [`Component`], and every
//! capability declares the shape it requires through [`Capability`]. The
//! [`matcher`](crate::matcher) compares the two.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::key::{short_name_of, TypeKey};

/// Lazily evaluated shape. Function pointers keep self-referencing shapes finite.
pub type ShapeFn = fn() -> Shape;

/// A type implemented by something that can be provided to the harness.
///
/// The default shape is named after the type and exposes no members, which is
/// enough for types that are only ever requested by concrete type.
///
/// # Examples
///
/// ```rust
/// use jab::{Component, Shape, Signature, TypeRef};
///
/// struct ConcreteNumber;
///
/// impl Component for ConcreteNumber {
///     fn shape() -> Shape {
///         Shape::of::<Self>()
///             .method("provide_number", Signature::new().returns(TypeRef::of::<i64>()))
///     }
/// }
///
/// assert_eq!(ConcreteNumber::shape().name(), "ConcreteNumber");
/// ```
pub trait Component: Any + Send + Sync {
    /// Declared members of this type.
    fn shape() -> Shape {
        Shape::of::<Self>()
    }
}

/// A structural interface, implemented for the `dyn Trait` object type that
/// dependents receive.
///
/// # Examples
///
/// ```rust
/// use jab::{Capability, Shape, Signature, TypeRef};
///
/// trait NumberProvider: Send + Sync {
///     fn provide_number(&self) -> i64;
/// }
///
/// impl Capability for dyn NumberProvider {
///     fn shape() -> Shape {
///         Shape::new("NumberProvider")
///             .method("provide_number", Signature::new().returns(TypeRef::of::<i64>()))
///     }
/// }
///
/// assert!(TypeRef::capability::<dyn NumberProvider>().is_capability());
/// ```
pub trait Capability: 'static {
    /// Members a type must expose to satisfy this capability.
    fn shape() -> Shape;
}

#[derive(Clone)]
enum ShapeSource {
    Lazy(ShapeFn),
    Shared(Arc<Shape>),
}

impl ShapeSource {
    fn get(&self) -> Arc<Shape> {
        match self {
            ShapeSource::Lazy(f) => Arc::new(f()),
            ShapeSource::Shared(shape) => shape.clone(),
        }
    }
}

/// Reference to a capability inside a signature.
#[derive(Clone)]
pub struct CapabilityRef {
    shape: ShapeSource,
    view: Option<TypeKey>,
}

impl CapabilityRef {
    /// Shape required by the capability.
    pub fn shape(&self) -> Arc<Shape> {
        self.shape.get()
    }

    /// Key of the `dyn Trait` object instances are viewed through, if any.
    pub fn view(&self) -> Option<TypeKey> {
        self.view
    }

    pub fn name(&self) -> String {
        self.shape().name().to_string()
    }
}

/// A declared type.
#[derive(Clone)]
pub enum TypeRef {
    /// A nominal type, optionally with its declared shape.
    Concrete { key: TypeKey, shape: Option<ShapeFn> },
    /// A structural interface.
    Capability(CapabilityRef),
    /// One of several types.
    Union(Vec<TypeRef>),
    /// Missing type information.
    Unannotated,
}

impl TypeRef {
    /// Nominal type without a declared shape (`String`, `i64`, `Vec<u8>`...).
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeRef::Concrete { key: TypeKey::of::<T>(), shape: None }
    }

    /// Nominal type carrying the shape declared by its [`Component`] impl.
    pub fn component<T: Component>() -> Self {
        TypeRef::Concrete {
            key: TypeKey::of::<T>(),
            shape: Some(<T as Component>::shape),
        }
    }

    /// Capability backed by a `dyn Trait` view.
    pub fn capability<C: ?Sized + Capability>() -> Self {
        TypeRef::Capability(CapabilityRef {
            shape: ShapeSource::Lazy(<C as Capability>::shape),
            view: Some(TypeKey::of::<C>()),
        })
    }

    /// Capability described only by its shape, with no trait object behind it.
    pub fn structural(shape: Shape) -> Self {
        TypeRef::Capability(CapabilityRef {
            shape: ShapeSource::Shared(Arc::new(shape)),
            view: None,
        })
    }

    /// Union of the given branches. Nested unions are flattened, duplicates
    /// removed, and a single remaining branch is returned as is.
    pub fn union(branches: impl IntoIterator<Item = TypeRef>) -> Self {
        let mut flat: Vec<TypeRef> = Vec::new();
        for branch in branches {
            let nested = match branch {
                TypeRef::Union(inner) => inner,
                other => vec![other],
            };
            for ty in nested {
                if !flat.contains(&ty) {
                    flat.push(ty);
                }
            }
        }

        if flat.len() == 1 {
            flat.remove(0)
        } else {
            TypeRef::Union(flat)
        }
    }

    pub fn unannotated() -> Self {
        TypeRef::Unannotated
    }

    pub fn is_capability(&self) -> bool {
        matches!(self, TypeRef::Capability(_))
    }

    pub fn is_annotated(&self) -> bool {
        !matches!(self, TypeRef::Unannotated)
    }

    pub fn as_capability(&self) -> Option<&CapabilityRef> {
        match self {
            TypeRef::Capability(cap) => Some(cap),
            _ => None,
        }
    }

    /// Shape declared for this type, if it has one.
    pub fn declared_shape(&self) -> Option<Arc<Shape>> {
        match self {
            TypeRef::Concrete { shape: Some(f), .. } => Some(Arc::new(f())),
            TypeRef::Capability(cap) => Some(cap.shape()),
            _ => None,
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::Concrete { key: a, .. }, TypeRef::Concrete { key: b, .. }) => a == b,
            (TypeRef::Capability(a), TypeRef::Capability(b)) => match (a.view, b.view) {
                (Some(va), Some(vb)) => va == vb,
                _ => a.name() == b.name(),
            },
            (TypeRef::Union(a), TypeRef::Union(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.contains(x))
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Concrete { key, .. } => write!(f, "{}", key),
            TypeRef::Capability(cap) => f.write_str(&cap.name()),
            TypeRef::Union(branches) => {
                let names: Vec<String> = branches.iter().map(|b| b.to_string()).collect();
                f.write_str(&names.join(" | "))
            }
            TypeRef::Unannotated => f.write_str("<unannotated>"),
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A named, typed parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Declared method signature (receiver excluded).
#[derive(Clone, Debug)]
pub struct Signature {
    params: Vec<Param>,
    ret: TypeRef,
}

impl Signature {
    /// A signature with no parameters returning `()`.
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            ret: TypeRef::of::<()>(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.ret = ty;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn ret(&self) -> &TypeRef {
        &self.ret
    }

    /// True when every parameter and the return carry a type.
    pub fn is_annotated(&self) -> bool {
        self.ret.is_annotated() && self.params.iter().all(|p| p.ty.is_annotated())
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

/// A declared member.
#[derive(Clone, Debug)]
pub enum Member {
    Field(TypeRef),
    Method(Signature),
}

/// The declared members of a type or capability.
#[derive(Clone, Debug)]
pub struct Shape {
    name: String,
    members: Vec<(String, Member)>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Empty shape named after `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(short_name_of::<T>())
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.push(name.into(), Member::Field(ty));
        self
    }

    pub fn method(mut self, name: impl Into<String>, signature: Signature) -> Self {
        self.push(name.into(), Member::Method(signature));
        self
    }

    // Redeclaring a member replaces it.
    fn push(&mut self, name: String, member: Member) {
        if let Some(slot) = self.members.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = member;
        } else {
            self.members.push((name, member));
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_flattens_and_dedups() {
        let u = TypeRef::union([
            TypeRef::of::<String>(),
            TypeRef::union([TypeRef::of::<i64>(), TypeRef::of::<String>()]),
        ]);
        match &u {
            TypeRef::Union(branches) => assert_eq!(branches.len(), 2),
            other => panic!("expected union, got {}", other),
        }
        assert_eq!(u.to_string(), "String | i64");

        let single = TypeRef::union([TypeRef::of::<u8>(), TypeRef::of::<u8>()]);
        assert_eq!(single, TypeRef::of::<u8>());
    }

    #[test]
    fn test_union_equality_is_order_insensitive() {
        let a = TypeRef::union([TypeRef::of::<u8>(), TypeRef::of::<u16>()]);
        let b = TypeRef::union([TypeRef::of::<u16>(), TypeRef::of::<u8>()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unannotated_never_equal() {
        assert_ne!(TypeRef::Unannotated, TypeRef::Unannotated);
        assert!(!Signature::new().returns(TypeRef::unannotated()).is_annotated());
    }

    #[test]
    fn test_structural_capabilities_compare_by_name() {
        let a = TypeRef::structural(Shape::new("Stringer"));
        let b = TypeRef::structural(Shape::new("Stringer"));
        let c = TypeRef::structural(Shape::new("Other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_redeclared_member_replaces() {
        let shape = Shape::new("S")
            .field("x", TypeRef::of::<u8>())
            .field("x", TypeRef::of::<u16>());
        assert_eq!(shape.len(), 1);
        match shape.member("x") {
            Some(Member::Field(ty)) => assert_eq!(*ty, TypeRef::of::<u16>()),
            _ => panic!("expected field"),
        }
    }
}
