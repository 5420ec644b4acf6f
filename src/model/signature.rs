//! Type signatures and generic instantiation.
//!
//! [`TypeSig`] is the structural form in which types appear wherever the model refers to them:
//! base types, parameter types, instruction operands, generic arguments. Two signatures are the
//! same type exactly when they are structurally equal, which is also how the provenance graph
//! canonicalizes type-specification nodes.

use serde::{Deserialize, Serialize};

use crate::model::TypeId;

/// A structural type signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeSig {
    /// `void`, only valid as a return type
    Void,
    /// A non-generic type definition, or an open generic definition
    Def(TypeId),
    /// A closed or partially closed generic instantiation, e.g. `List<int>`
    GenericInst(TypeId, Vec<TypeSig>),
    /// A single-dimensional zero-based array, e.g. `int[]`
    SzArray(Box<TypeSig>),
    /// A multi-dimensional array of the given rank
    Array(Box<TypeSig>, u32),
    /// A managed reference, e.g. `ref int`
    ByRef(Box<TypeSig>),
    /// An unmanaged pointer
    Pointer(Box<TypeSig>),
    /// The n-th generic parameter of the enclosing type
    Var(u16),
    /// The n-th generic parameter of the enclosing method
    MVar(u16),
    /// A type reference the model could not bind to a definition
    Unresolved(String),
}

impl TypeSig {
    /// Shorthand for [`TypeSig::SzArray`].
    #[must_use]
    pub fn array_of(element: TypeSig) -> TypeSig {
        TypeSig::SzArray(Box::new(element))
    }

    /// Returns the type definition at the root of this signature, if there is one.
    ///
    /// Arrays, references and pointers are looked through to their element type.
    #[must_use]
    pub fn definition(&self) -> Option<TypeId> {
        match self {
            TypeSig::Def(id) | TypeSig::GenericInst(id, _) => Some(*id),
            TypeSig::SzArray(inner)
            | TypeSig::Array(inner, _)
            | TypeSig::ByRef(inner)
            | TypeSig::Pointer(inner) => inner.definition(),
            TypeSig::Void | TypeSig::Var(_) | TypeSig::MVar(_) | TypeSig::Unresolved(_) => None,
        }
    }

    /// Returns the generic arguments if this is a generic instantiation.
    #[must_use]
    pub fn generic_args(&self) -> &[TypeSig] {
        match self {
            TypeSig::GenericInst(_, args) => args,
            _ => &[],
        }
    }

    /// Returns the element of an array, reference or pointer signature.
    #[must_use]
    pub fn element(&self) -> Option<&TypeSig> {
        match self {
            TypeSig::SzArray(inner)
            | TypeSig::Array(inner, _)
            | TypeSig::ByRef(inner)
            | TypeSig::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns `true` if this signature mentions no generic parameter.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            TypeSig::Var(_) | TypeSig::MVar(_) => false,
            TypeSig::GenericInst(_, args) => args.iter().all(TypeSig::is_closed),
            TypeSig::SzArray(inner)
            | TypeSig::Array(inner, _)
            | TypeSig::ByRef(inner)
            | TypeSig::Pointer(inner) => inner.is_closed(),
            TypeSig::Void | TypeSig::Def(_) | TypeSig::Unresolved(_) => true,
        }
    }

    /// Substitutes type-level generic parameters with the given arguments.
    ///
    /// `Var(n)` is replaced by `type_args[n]` when present and left untouched otherwise. Method
    /// generic parameters are not substituted: override matching compares them positionally.
    #[must_use]
    pub fn inflate(&self, type_args: &[TypeSig]) -> TypeSig {
        if type_args.is_empty() {
            return self.clone();
        }
        match self {
            TypeSig::Var(n) => type_args
                .get(usize::from(*n))
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSig::GenericInst(def, args) => {
                TypeSig::GenericInst(*def, args.iter().map(|a| a.inflate(type_args)).collect())
            }
            TypeSig::SzArray(inner) => TypeSig::SzArray(Box::new(inner.inflate(type_args))),
            TypeSig::Array(inner, rank) => {
                TypeSig::Array(Box::new(inner.inflate(type_args)), *rank)
            }
            TypeSig::ByRef(inner) => TypeSig::ByRef(Box::new(inner.inflate(type_args))),
            TypeSig::Pointer(inner) => TypeSig::Pointer(Box::new(inner.inflate(type_args))),
            TypeSig::Void | TypeSig::Def(_) | TypeSig::MVar(_) | TypeSig::Unresolved(_) => {
                self.clone()
            }
        }
    }
}

impl From<TypeId> for TypeSig {
    fn from(id: TypeId) -> Self {
        TypeSig::Def(id)
    }
}
