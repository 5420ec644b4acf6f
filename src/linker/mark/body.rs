//! Method body scanning.

use crate::{
    linker::{
        mark::MarkStep,
        reflection::{self, PatternOutcome, PatternResult, ReflectionCallSite, ReflectionTarget},
        DependencyInfo, DependencyKind, Diagnostic, DiagnosticCode, Member, MethodAction,
        UnsafeReachingData,
    },
    model::{MethodId, OpCode, Operand},
    Result,
};

impl MarkStep<'_> {
    /// Marks everything a method body refers to and analyses its reflection call sites.
    pub(super) fn mark_method_body(&mut self, method: MethodId) -> Result<()> {
        let universe = self.universe;
        let Some(body) = universe.method(method).body.as_ref() else {
            return Ok(());
        };
        if self.annotations.get_method_action(method) == MethodAction::Nothing {
            self.annotations.set_method_action(method, MethodAction::Parse);
        }
        let reason = |kind| DependencyInfo::new(kind, method);

        for local in &body.locals {
            self.mark_type_sig(local, reason(DependencyKind::VariableType))?;
        }
        for handler in &body.exception_handlers {
            if let Some(catch_type) = &handler.catch_type {
                self.mark_type_sig(catch_type, reason(DependencyKind::CatchType))?;
            }
        }

        for (index, instruction) in body.instructions.iter().enumerate() {
            match (&instruction.operand, instruction.opcode) {
                (Operand::Method(handle), opcode) => {
                    let kind = match opcode {
                        OpCode::Call => DependencyKind::DirectCall,
                        OpCode::Callvirt => DependencyKind::VirtualCall,
                        OpCode::Newobj => DependencyKind::Newobj,
                        OpCode::Ldftn => DependencyKind::Ldftn,
                        OpCode::Ldvirtftn => DependencyKind::Ldvirtftn,
                        OpCode::Ldtoken => DependencyKind::Ldtoken,
                        other => {
                            return Err(internal_error!(
                                "{} with a method operand in {}",
                                other,
                                universe.method_full_name(method)
                            ));
                        }
                    };
                    self.mark_method_handle(*handle, reason(kind))?;

                    if matches!(opcode, OpCode::Call | OpCode::Callvirt) && self.config.scan_reflection {
                        if let Some(callee) = universe.resolve_method(*handle) {
                            if let Some(api) = self.reflection.classify(universe, callee) {
                                let site = ReflectionCallSite::new(method, callee, *handle, api, instruction.offset);
                                let outcome = reflection::analyze(universe, body, index, site);
                                self.apply_reflection_outcome(outcome)?;
                            }
                        }
                    }
                }
                (Operand::Field(handle), opcode) => {
                    let kind = if opcode == OpCode::Ldtoken {
                        DependencyKind::Ldtoken
                    } else {
                        DependencyKind::FieldAccess
                    };
                    self.mark_field_handle(*handle, reason(kind))?;

                    if matches!(opcode, OpCode::Ldsfld | OpCode::Ldsflda | OpCode::Stsfld) {
                        if let Some(field) = universe.resolve_field(*handle) {
                            let owner = universe.field_owner(field);
                            if let Some(cctor) = universe.type_initializer(owner) {
                                self.mark_method(
                                    cctor,
                                    reason(DependencyKind::TriggersCctorThroughFieldAccess),
                                )?;
                            }
                        }
                    }
                }
                (Operand::Type(sig), opcode) => {
                    let kind = if opcode == OpCode::Ldtoken {
                        DependencyKind::Ldtoken
                    } else {
                        DependencyKind::InstructionTypeRef
                    };
                    self.mark_type_sig(sig, reason(kind))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Marks what a recognized reflection call accesses, or records the call as unsafe.
    pub(crate) fn apply_reflection_outcome(&mut self, outcome: PatternOutcome) -> Result<()> {
        let callsite = outcome.callsite();
        let caller = callsite.caller;
        match outcome.result() {
            PatternResult::Recognized(targets) => {
                tracing::debug!(
                    api = %outcome.api(),
                    offset = outcome.offset(),
                    targets = targets.len(),
                    "recognized reflection pattern"
                );
                let accessed = || DependencyInfo::new(DependencyKind::AccessedViaReflection, caller);
                for target in targets {
                    match *target {
                        ReflectionTarget::Type(ty) => self.mark_type(ty, accessed())?,
                        ReflectionTarget::Method(m) => self.mark_method(m, accessed())?,
                        ReflectionTarget::Field(f) => self.mark_member(Member::Field(f), accessed())?,
                        ReflectionTarget::Property(p) => self.mark_property_with_accessors(p, accessed())?,
                        ReflectionTarget::Event(e) => self.mark_event_with_accessors(e, accessed())?,
                        ReflectionTarget::DefaultConstructor(ctor) => self.mark_method(
                            ctor,
                            DependencyInfo::new(DependencyKind::DefaultConstructorForReflection, caller),
                        )?,
                    }
                }
            }
            PatternResult::Unrecognized { data, reason } => {
                let universe = self.universe;
                self.annotations.recorder_mut().record_unsafe(UnsafeReachingData {
                    callsite,
                    data: data.clone(),
                })?;
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UnrecognizedReflectionPattern,
                        format!("{}: {reason}", universe.method_full_name(callsite.callee)),
                    )
                    .with_origin(universe.method_full_name(caller)),
                );
            }
        }
        Ok(())
    }
}
