//! Shared fixture for the integration tests.
//!
//! Every scenario starts from the synthetic core library plus one application assembly `App`
//! whose `Program.Main` is the entry point.

#![allow(dead_code)]

use reachscope::prelude::*;

pub const APP: &str = "App";

pub struct Fixture {
    pub universe: Universe,
    pub core: CoreLibrary,
    pub app: AssemblyId,
    pub program: TypeId,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        let mut universe = Universe::new();
        let core = CoreLibrary::install(&mut universe)?;
        let app = universe.add_assembly(APP)?;
        let program = universe.add_type(app, TypeDef::new(APP, "Program").with_base(core.object))?;
        Ok(Fixture {
            universe,
            core,
            app,
            program,
        })
    }

    pub fn class(&mut self, name: &str) -> Result<TypeId> {
        let object = self.core.object;
        self.class_with_base(name, object)
    }

    pub fn class_with_base(&mut self, name: &str, base: impl Into<TypeSig>) -> Result<TypeId> {
        self.universe.add_type(self.app, TypeDef::new(APP, name).with_base(base))
    }

    pub fn interface(&mut self, name: &str) -> Result<TypeId> {
        self.universe.add_type(
            self.app,
            TypeDef::new(APP, name).with_flags(TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT),
        )
    }

    /// A public parameterless constructor chaining to `Object::.ctor`.
    pub fn ctor(&mut self, owner: TypeId) -> Result<MethodId> {
        let object_ctor = self.core.object_ctor;
        self.universe.add_method(
            owner,
            MethodDef::constructor().with_body(MethodBody::from_ops(vec![
                (OpCode::Ldarg, Operand::Argument(0)),
                (OpCode::Call, Operand::Method(object_ctor.into())),
                (OpCode::Ret, Operand::None),
            ])),
        )
    }

    /// A public static method with the given instructions followed by `ret`.
    pub fn static_method(
        &mut self,
        owner: TypeId,
        name: &str,
        mut ops: Vec<(OpCode, Operand)>,
    ) -> Result<MethodId> {
        ops.push((OpCode::Ret, Operand::None));
        self.universe.add_method(
            owner,
            MethodDef::new(name)
                .with_modifiers(MethodModifiers::STATIC | MethodModifiers::HIDE_BY_SIG)
                .with_body(MethodBody::from_ops(ops)),
        )
    }

    /// `Program.Main`, registered as the entry point of `App`.
    pub fn main(&mut self, ops: Vec<(OpCode, Operand)>) -> Result<MethodId> {
        let program = self.program;
        let main = self.static_method(program, "Main", ops)?;
        self.universe.set_entry_point(self.app, main)?;
        Ok(main)
    }

    /// Links with `config` plus `App` rooted at its entry point.
    pub fn link(self, config: LinkerConfig) -> Result<LinkContext> {
        let mut context =
            LinkContext::new(self.universe, config.with_root(APP, RootVisibility::EntryPoint))?;
        context.mark()?;
        Ok(context)
    }
}

/// A body long enough to be worth converting to a throwing stub.
pub fn filler() -> MethodBody {
    MethodBody::from_ops(vec![
        (OpCode::Nop, Operand::None),
        (OpCode::Nop, Operand::None),
        (OpCode::Nop, Operand::None),
        (OpCode::Ret, Operand::None),
    ])
}

/// `typeof(T)`: `ldtoken T; call Type.GetTypeFromHandle`.
pub fn type_of(core: &CoreLibrary, ty: TypeId) -> Vec<(OpCode, Operand)> {
    vec![
        (OpCode::Ldtoken, Operand::Type(ty.into())),
        (OpCode::Call, Operand::Method(core.get_type_from_handle.into())),
    ]
}

/// The reason of the last hop on the first path to `member`.
pub fn last_hop(context: &LinkContext, member: impl Into<Member>) -> Option<(DependencyNode, DependencyKind)> {
    let paths = context.paths_to(member, false);
    let edge = paths.first()?.last()?;
    Some((edge.from.clone(), edge.kind))
}

/// Returns `true` if the provenance graph holds an edge `from -kind-> to`.
pub fn has_edge(context: &LinkContext, from: &DependencyNode, to: &DependencyNode, kind: DependencyKind) -> bool {
    context
        .annotations()
        .recorder()
        .graph()
        .edges()
        .any(|edge| &edge.from == from && &edge.to == to && edge.kind == kind)
}
