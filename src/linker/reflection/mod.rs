//! Reflection pattern detection.
//!
//! Calls like `typeof(Foo).GetMethod("Bar")` access members the static call graph cannot see.
//! When the arguments are constants the detector can tell which members are meant, and the mark
//! step keeps them. When they are not, the call site is reported as unsafe: the member it needs
//! might be trimmed away.
//!
//! # Key Components
//!
//! - [`ReflectionCatalog`] - Which callees are reflection APIs, and where their arguments sit
//! - [`find_producer`] - Backward stack simulation to the instruction producing an argument
//! - [`ReflectionCallSite`] / [`PatternOutcome`] - A call site must end in exactly one outcome
//! - [`analyze`] - Decodes the arguments of one call site and resolves its targets
//!
//! # Recognized argument shapes
//!
//! | Argument      | Recognized producers                                                 |
//! |---------------|----------------------------------------------------------------------|
//! | `Type`        | `ldtoken T; call Type.GetTypeFromHandle`, `Type.GetType("literal")` |
//! | `string`      | `ldstr`, `ldnull`                                                    |
//! | `BindingFlags`| `ldc.i4`                                                             |
//!
//! Every shape may also flow through `dup` or a local variable written once in straight-line
//! code.

mod catalog;
mod stack;
mod token;

pub use catalog::{ArgumentLayout, ReflectionApi, ReflectionCatalog};
pub use stack::{find_producer, follow_local};
pub use token::{PatternOutcome, PatternResult, ReflectionCallSite, ReflectionTarget};

use crate::{
    linker::ReflectionDataKind,
    model::{BindingFlags, MemberRef, MethodBody, MethodHandle, OpCode, Operand, TypeId, Universe},
};

const MAX_DECODE_DEPTH: usize = 8;

/// Lookup filters that admit every member.
const ANY_MEMBER: BindingFlags = BindingFlags::PUBLIC
    .union(BindingFlags::NON_PUBLIC)
    .union(BindingFlags::INSTANCE)
    .union(BindingFlags::STATIC);

/// Analyses the reflection call at instruction `index` of `body`.
#[must_use]
pub fn analyze(universe: &Universe, body: &MethodBody, index: usize, site: ReflectionCallSite) -> PatternOutcome {
    use ReflectionApi::*;

    let api = site.api();
    let callee = universe.method(site.callee());
    let arg_count = callee.params.len() + usize::from(!callee.is_static());
    let has_flags = matches!(api, TypeGetMethod | TypeGetField | TypeGetProperty | TypeGetEvent)
        && callee.params.len() == 2;
    let layout = api.layout(has_flags);
    let argument = |position: usize| {
        let depth = arg_count.checked_sub(position + 1)?;
        find_producer(universe, body, index, depth)
    };
    let string_arg = |position: Option<usize>| {
        position
            .and_then(argument)
            .and_then(|p| decode_string(universe, body, p, 0))
    };
    let type_arg = |position: Option<usize>| {
        position
            .and_then(argument)
            .and_then(|p| decode_type(universe, body, p, 0))
    };

    match api {
        ActivatorCreateInstanceGeneric => {
            let generic_arg = match site.handle() {
                MethodHandle::Ref(r) => match universe.member_ref(r) {
                    MemberRef::MethodSpec { args, .. } => args.first().and_then(|a| a.definition()),
                    _ => None,
                },
                MethodHandle::Def(_) => None,
            };
            match generic_arg {
                Some(ty) => site.recognized(construct(universe, ty)),
                None => site.unrecognized(
                    ReflectionDataKind::Unknown,
                    "generic argument is not a known type",
                    None,
                ),
            }
        }
        TypeGetType => match string_arg(layout.name_arg) {
            None => site.unrecognized(ReflectionDataKind::Unknown, "type name is not a constant", None),
            Some(None) => site.recognized(Vec::new()),
            Some(Some(name)) => match resolve_type_name(universe, &name, None) {
                Some(ty) => site.recognized(vec![ReflectionTarget::Type(ty)]),
                None => site.unrecognized(
                    ReflectionDataKind::UnresolvedName,
                    "type name does not resolve",
                    Some(name),
                ),
            },
        },
        ActivatorCreateInstanceByName | AppDomainCreateInstance => {
            let (Some(Some(assembly)), Some(Some(name))) =
                (string_arg(layout.assembly_arg), string_arg(layout.name_arg))
            else {
                return site.unrecognized(
                    ReflectionDataKind::Unknown,
                    "assembly or type name is not a constant",
                    None,
                );
            };
            match resolve_type_name(universe, &name, Some(&assembly)) {
                Some(ty) => site.recognized(construct(universe, ty)),
                None => site.unrecognized(
                    ReflectionDataKind::UnresolvedName,
                    "type name does not resolve",
                    Some(format!("{name}, {assembly}")),
                ),
            }
        }
        _ => {
            let Some(ty) = type_arg(layout.type_arg) else {
                return site.unrecognized(ReflectionDataKind::Unknown, "type argument is not a constant", None);
            };
            match api {
                ActivatorCreateInstance | ExpressionNew => site.recognized(construct(universe, ty)),
                TypeGetConstructor => site.recognized(
                    universe
                        .type_def(ty)
                        .methods
                        .iter()
                        .copied()
                        .filter(|&m| {
                            let def = universe.method(m);
                            def.is_instance_constructor() && def.access.is_public()
                        })
                        .map(ReflectionTarget::Method)
                        .collect(),
                ),
                _ => {
                    let name = match string_arg(layout.name_arg) {
                        None => {
                            return site.unrecognized(
                                ReflectionDataKind::Unknown,
                                "member name is not a constant",
                                None,
                            )
                        }
                        Some(None) => return site.recognized(Vec::new()),
                        Some(Some(name)) => name,
                    };
                    let flags = match layout.flags_arg {
                        Some(position) => argument(position)
                            .and_then(|p| decode_int(universe, body, p, 0))
                            .map_or(ANY_MEMBER, |bits| {
                                BindingFlags::from_bits_truncate(u32::from_ne_bytes(bits.to_ne_bytes()))
                            }),
                        None => default_flags(api),
                    };
                    site.recognized(find_members(universe, ty, api, &name, flags))
                }
            }
        }
    }
}

fn default_flags(api: ReflectionApi) -> BindingFlags {
    match api {
        ReflectionApi::ExpressionCall => {
            BindingFlags::STATIC | BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC
        }
        ReflectionApi::ExpressionProperty | ReflectionApi::ExpressionField => ANY_MEMBER,
        _ => BindingFlags::DEFAULT_LOOKUP,
    }
}

/// Targets for creating an instance of `ty` through its parameterless constructor.
fn construct(universe: &Universe, ty: TypeId) -> Vec<ReflectionTarget> {
    match universe.default_constructor(ty) {
        Some(ctor) => vec![ReflectionTarget::DefaultConstructor(ctor)],
        None => vec![ReflectionTarget::Type(ty)],
    }
}

/// Resolves `Ns.Name[, Assembly]`, with `+` separating nested types.
fn resolve_type_name(universe: &Universe, name: &str, assembly: Option<&str>) -> Option<TypeId> {
    let (type_name, qualifier) = match name.split_once(',') {
        Some((type_name, qualifier)) => (type_name.trim(), Some(qualifier.trim())),
        None => (name.trim(), None),
    };
    let type_name = type_name.replace('+', "/");
    match assembly.or(qualifier) {
        Some(assembly) => {
            let simple = assembly.split(',').next().unwrap_or(assembly).trim();
            universe.find_type_in(universe.find_assembly(simple)?, &type_name)
        }
        None => universe.find_type(&type_name),
    }
}

/// Members of `ty` and its bases named `name` that pass `flags`.
///
/// Base types contribute public members only, and only without `DeclaredOnly`.
fn find_members(
    universe: &Universe,
    ty: TypeId,
    api: ReflectionApi,
    name: &str,
    flags: BindingFlags,
) -> Vec<ReflectionTarget> {
    use ReflectionApi::*;
    let ignore_case = flags.contains(BindingFlags::IGNORE_CASE);
    let matches_name = |candidate: &str| {
        if ignore_case {
            candidate.eq_ignore_ascii_case(name)
        } else {
            candidate == name
        }
    };
    let accessor_shape = |accessors: &[Option<crate::model::MethodId>]| {
        let methods: Vec<_> = accessors.iter().flatten().map(|&m| universe.method(m)).collect();
        (
            methods.iter().any(|m| m.access.is_public()),
            methods.iter().any(|m| m.is_static()),
        )
    };

    let mut targets = Vec::new();
    let mut current = Some(ty);
    let mut declared = true;
    for _ in 0..crate::model::MAX_HIERARCHY_DEPTH {
        let Some(t) = current else {
            break;
        };
        let def = universe.type_def(t);
        let admits = |public: bool, is_static: bool| {
            flags.admits(public, is_static) && (declared || public)
        };
        match api {
            TypeGetMethod | ExpressionCall | GetRuntimeMethod => {
                for &m in &def.methods {
                    let method = universe.method(m);
                    if !method.is_instance_constructor()
                        && !method.is_type_initializer()
                        && matches_name(&method.name)
                        && admits(method.access.is_public(), method.is_static())
                    {
                        targets.push(ReflectionTarget::Method(m));
                    }
                }
            }
            TypeGetField | ExpressionField | GetRuntimeField => {
                for &f in &def.fields {
                    let field = universe.field(f);
                    if matches_name(&field.name) && admits(field.access.is_public(), field.is_static()) {
                        targets.push(ReflectionTarget::Field(f));
                    }
                }
            }
            TypeGetProperty | ExpressionProperty | GetRuntimeProperty => {
                for &p in &def.properties {
                    let property = universe.property(p);
                    let (public, is_static) = accessor_shape(&[property.getter, property.setter]);
                    if matches_name(&property.name) && admits(public, is_static) {
                        targets.push(ReflectionTarget::Property(p));
                    }
                }
            }
            TypeGetEvent | GetRuntimeEvent => {
                for &e in &def.events {
                    let event = universe.event(e);
                    let (public, is_static) = accessor_shape(&[event.add, event.remove]);
                    if matches_name(&event.name) && admits(public, is_static) {
                        targets.push(ReflectionTarget::Event(e));
                    }
                }
            }
            _ => return targets,
        }
        if flags.contains(BindingFlags::DECLARED_ONLY) {
            break;
        }
        declared = false;
        current = universe.base_type(t);
    }
    targets
}

fn decode_string(universe: &Universe, body: &MethodBody, producer: usize, depth: usize) -> Option<Option<String>> {
    let instruction = body.instructions.get(producer)?;
    match (instruction.opcode, &instruction.operand) {
        (OpCode::Ldstr, Operand::String(value)) => Some(Some(value.clone())),
        (OpCode::Ldnull, _) => Some(None),
        (OpCode::Ldloc, _) if depth < MAX_DECODE_DEPTH => {
            decode_string(universe, body, follow_local(universe, body, producer)?, depth + 1)
        }
        _ => None,
    }
}

fn decode_int(universe: &Universe, body: &MethodBody, producer: usize, depth: usize) -> Option<i32> {
    let instruction = body.instructions.get(producer)?;
    match (instruction.opcode, &instruction.operand) {
        (OpCode::LdcI4, Operand::Int32(value)) => Some(*value),
        (OpCode::Ldloc, _) if depth < MAX_DECODE_DEPTH => {
            decode_int(universe, body, follow_local(universe, body, producer)?, depth + 1)
        }
        _ => None,
    }
}

fn decode_type(universe: &Universe, body: &MethodBody, producer: usize, depth: usize) -> Option<TypeId> {
    if depth >= MAX_DECODE_DEPTH {
        return None;
    }
    let instruction = body.instructions.get(producer)?;
    match (instruction.opcode, &instruction.operand) {
        (OpCode::Call, Operand::Method(handle)) => {
            let callee = universe.resolve_method(*handle)?;
            let def = universe.method(callee);
            if universe.type_full_name(universe.method_owner(callee)) != "System.Type" || def.params.len() != 1 {
                return None;
            }
            let argument = find_producer(universe, body, producer, 0)?;
            match def.name.as_str() {
                "GetTypeFromHandle" => {
                    let token = body.instructions.get(argument)?;
                    match (token.opcode, &token.operand) {
                        (OpCode::Ldtoken, Operand::Type(sig)) => sig.definition(),
                        _ => None,
                    }
                }
                "GetType" => {
                    let name = decode_string(universe, body, argument, depth + 1)??;
                    resolve_type_name(universe, &name, None)
                }
                _ => None,
            }
        }
        (OpCode::Ldloc, _) => decode_type(universe, body, follow_local(universe, body, producer)?, depth + 1),
        _ => None,
    }
}
