//! Structural capability matching.
//!
//! A concrete [`Shape`] satisfies a capability [`Shape`] when it exposes every
//! member the capability names with a compatible declaration:
//!
//! - fields must have exactly the same type;
//! - methods must have the same parameters (names and types, in order) and a
//!   compatible return type;
//! - a return type that is itself a capability is satisfied by any return type
//!   whose declared shape satisfies it, recursively;
//! - a union return type is only accepted when every branch is compatible.
//!   When some branches are compatible and others are not, no static analysis
//!   can tell which one is returned at runtime, and matching fails with
//!   [`JabError::AmbiguousReturnType`].
//!
//! # Examples
//!
//! ```rust
//! use jab::{matcher, Shape, Signature, TypeRef};
//!
//! let stringer = Shape::new("Stringer")
//!     .method("string", Signature::new().returns(TypeRef::of::<String>()));
//!
//! let name = Shape::new("Name")
//!     .field("first", TypeRef::of::<String>())
//!     .method("string", Signature::new().returns(TypeRef::of::<String>()));
//!
//! assert!(matcher::satisfies(&name, &stringer).unwrap());
//! assert!(!matcher::satisfies(&Shape::new("Empty"), &stringer).unwrap());
//! ```

use std::collections::HashSet;

use crate::error::{JabError, JabResult};
use crate::signature::{Member, Shape, Signature, TypeRef};

/// Whether `concrete` structurally satisfies `capability`.
pub fn satisfies(concrete: &Shape, capability: &Shape) -> JabResult<bool> {
    Matcher::default().satisfies(concrete, capability)
}

/// Whether a single concrete method declaration satisfies a capability method.
pub fn function_satisfies(concrete: &Signature, capability: &Signature) -> JabResult<bool> {
    Matcher::default().function_satisfies("<method>", concrete, capability)
}

/// Whether a value declared as `actual` can be used where `expected` is required.
pub fn type_satisfies(actual: &TypeRef, expected: &TypeRef) -> JabResult<bool> {
    Matcher::default().return_satisfies("<value>", actual, expected)
}

#[derive(Default)]
struct Matcher {
    // (concrete, capability) pairs currently under examination
    in_progress: HashSet<(String, String)>,
}

impl Matcher {
    fn satisfies(&mut self, concrete: &Shape, capability: &Shape) -> JabResult<bool> {
        let pair = (concrete.name().to_string(), capability.name().to_string());
        if !self.in_progress.insert(pair.clone()) {
            return Ok(true);
        }

        let result = self.members_satisfy(concrete, capability);
        self.in_progress.remove(&pair);
        result
    }

    fn members_satisfy(&mut self, concrete: &Shape, capability: &Shape) -> JabResult<bool> {
        for (name, required) in capability.members() {
            let Some(found) = concrete.member(name) else {
                tracing::trace!(
                    concrete = concrete.name(),
                    capability = capability.name(),
                    member = name,
                    "member missing"
                );
                return Ok(false);
            };

            let qualified = format!("{}.{}", concrete.name(), name);
            let ok = match (found, required) {
                (Member::Field(actual), Member::Field(expected)) => actual == expected,
                (Member::Method(actual), Member::Method(expected)) => {
                    self.function_satisfies(&qualified, actual, expected)?
                }
                _ => false,
            };

            if !ok {
                tracing::trace!(member = %qualified, capability = capability.name(), "member incompatible");
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn function_satisfies(
        &mut self,
        member: &str,
        concrete: &Signature,
        required: &Signature,
    ) -> JabResult<bool> {
        if !concrete.is_annotated() {
            return Ok(false);
        }

        // The return is checked first so an undecidable union is reported even
        // when the parameters would not line up either.
        if !self.return_satisfies(member, concrete.ret(), required.ret())? {
            return Ok(false);
        }

        if concrete.params().len() != required.params().len() {
            return Ok(false);
        }

        Ok(concrete
            .params()
            .iter()
            .zip(required.params())
            .all(|(a, b)| a.name == b.name && a.ty == b.ty))
    }

    fn return_satisfies(
        &mut self,
        member: &str,
        actual: &TypeRef,
        expected: &TypeRef,
    ) -> JabResult<bool> {
        let TypeRef::Union(branches) = actual else {
            return self.type_satisfies(actual, expected);
        };

        if actual == expected {
            return Ok(true);
        }

        let mut compatible = 0;
        for branch in branches {
            if self.type_satisfies(branch, expected)? {
                compatible += 1;
            }
        }

        match compatible {
            0 => Ok(false),
            n if n == branches.len() => Ok(true),
            _ => Err(JabError::AmbiguousReturnType {
                member: member.to_string(),
                union: actual.to_string(),
            }),
        }
    }

    fn type_satisfies(&mut self, actual: &TypeRef, expected: &TypeRef) -> JabResult<bool> {
        let TypeRef::Capability(capability) = expected else {
            return Ok(actual == expected);
        };

        if actual == expected {
            return Ok(true);
        }

        match actual.declared_shape() {
            Some(shape) => self.satisfies(&shape, &capability.shape()),
            None => Ok(false),
        }
    }
}
