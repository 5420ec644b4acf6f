//! Shared fixtures for unit tests.
//!
//! [`TestApp`] builds a small universe on top of the synthetic core library: one application
//! assembly named `App` with a `Program.Main` entry point, plus helpers for the member shapes
//! the mark step cares about.

use crate::{
    linker::{LinkContext, LinkerConfig, RootVisibility},
    model::{
        AssemblyId, CoreLibrary, MethodBody, MethodDef, MethodId, MethodModifiers, OpCode, Operand,
        TypeAttributes, TypeDef, TypeId, TypeSig, Universe,
    },
};

pub const APP: &str = "App";

/// A universe with the core library and one application assembly.
pub struct TestApp {
    pub universe: Universe,
    pub core: CoreLibrary,
    pub app: AssemblyId,
    pub program: TypeId,
}

impl TestApp {
    pub fn new() -> Self {
        let mut universe = Universe::new();
        let core = CoreLibrary::install(&mut universe).unwrap();
        let app = universe.add_assembly(APP).unwrap();
        let program = universe
            .add_type(app, TypeDef::new(APP, "Program").with_base(core.object))
            .unwrap();
        TestApp {
            universe,
            core,
            app,
            program,
        }
    }

    /// A public class deriving from `System.Object`.
    pub fn class(&mut self, name: &str) -> TypeId {
        let object = self.core.object;
        self.class_with_base(name, object)
    }

    pub fn class_with_base(&mut self, name: &str, base: impl Into<TypeSig>) -> TypeId {
        self.universe
            .add_type(self.app, TypeDef::new(APP, name).with_base(base))
            .unwrap()
    }

    pub fn interface(&mut self, name: &str) -> TypeId {
        self.universe
            .add_type(
                self.app,
                TypeDef::new(APP, name)
                    .with_flags(TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT),
            )
            .unwrap()
    }

    pub fn method(&mut self, owner: TypeId, def: MethodDef) -> MethodId {
        self.universe.add_method(owner, def).unwrap()
    }

    /// A public default constructor chaining to `Object::.ctor`.
    pub fn ctor(&mut self, owner: TypeId) -> MethodId {
        let object_ctor = self.core.object_ctor;
        self.method(
            owner,
            MethodDef::constructor().with_body(body(vec![
                (OpCode::Ldarg, Operand::Argument(0)),
                (OpCode::Call, Operand::Method(object_ctor.into())),
                (OpCode::Ret, Operand::None),
            ])),
        )
    }

    /// A public virtual instance method with a three-instruction body.
    pub fn virtual_method(&mut self, owner: TypeId, name: &str) -> MethodId {
        self.method(
            owner,
            MethodDef::new(name)
                .with_modifiers(MethodModifiers::VIRTUAL | MethodModifiers::HIDE_BY_SIG)
                .with_body(filler()),
        )
    }

    /// A public static method with the given body, terminated by `ret`.
    pub fn static_method(&mut self, owner: TypeId, name: &str, mut ops: Vec<(OpCode, Operand)>) -> MethodId {
        ops.push((OpCode::Ret, Operand::None));
        self.method(
            owner,
            MethodDef::new(name)
                .with_modifiers(MethodModifiers::STATIC | MethodModifiers::HIDE_BY_SIG)
                .with_body(body(ops)),
        )
    }

    /// `Program.Main` with the given body, registered as the entry point of `App`.
    pub fn main(&mut self, ops: Vec<(OpCode, Operand)>) -> MethodId {
        let program = self.program;
        let main = self.static_method(program, "Main", ops);
        self.universe.set_entry_point(self.app, main).unwrap();
        main
    }

    /// A context rooting the entry point of `App`.
    pub fn context(self, config: LinkerConfig) -> LinkContext {
        LinkContext::new(self.universe, config.with_root(APP, RootVisibility::EntryPoint)).unwrap()
    }

    /// Runs the mark step with the default configuration.
    pub fn link(self) -> LinkContext {
        let mut context = self.context(LinkerConfig::default());
        context.mark().unwrap();
        context
    }
}

pub fn body(ops: Vec<(OpCode, Operand)>) -> MethodBody {
    MethodBody::from_ops(ops)
}

/// A body that is worth converting to a throwing stub.
pub fn filler() -> MethodBody {
    body(vec![
        (OpCode::Nop, Operand::None),
        (OpCode::Nop, Operand::None),
        (OpCode::Nop, Operand::None),
        (OpCode::Ret, Operand::None),
    ])
}
