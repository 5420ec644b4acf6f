//! The member model the linker analyses.
//!
//! A [`Universe`] is an arena of assemblies, types, methods, fields, properties, events,
//! interface implementations, custom attributes and member references, all addressed by typed
//! ids. Loading real assemblies into a universe is outside the scope of this crate; callers
//! populate it through the builder-style API, and [`CoreLibrary::install`] provides the runtime
//! types the linker looks up by name.
//!
//! # Key Components
//!
//! - [`Universe`] - Arena and owner tables, lookup and naming
//! - [`TypeSig`] - Structural type signatures with generic inflation
//! - [`MethodBody`] / [`Instruction`] - Resolved IL streams
//! - [`MethodHandle`] / [`FieldHandle`] / [`MemberRef`] - Operands needing redirection
//! - [`CoreLibrary`] - A synthetic `System.Private.CoreLib`

mod corelib;
mod flags;
mod ids;
mod instruction;
mod members;
mod signature;
mod universe;

pub use corelib::{CoreLibrary, CORELIB_NAME};
pub use flags::{Accessibility, BindingFlags, FieldAttributes, MethodModifiers, TypeAttributes};
pub use ids::{
    AssemblyId, AttributeId, EventId, FieldId, InterfaceImplId, MemberRefId, MethodId,
    PropertyId, TypeId,
};
pub use instruction::{
    ExceptionHandler, FlowType, Instruction, MethodBody, OpCode, Operand, StackBehavior,
};
pub use members::{
    AssemblyDef, AttributeArg, AttributeTarget, CustomAttributeDef, EventDef, FieldDef,
    FieldHandle, GenericParamDef, InterfaceImplDef, MemberRef, MethodDef, MethodHandle,
    NamedArg, NamedArgTarget, PropertyDef, TypeDef,
};
pub use signature::TypeSig;
pub use universe::{Universe, MAX_HIERARCHY_DEPTH};
