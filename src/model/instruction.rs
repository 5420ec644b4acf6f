//! IL instruction streams.
//!
//! Instructions carry already-resolved operands: a `call` holds a [`MethodHandle`], an
//! `ldtoken` holds a [`TypeSig`], [`MethodHandle`] or [`FieldHandle`]. The mark phase walks these
//! to discover dependencies, and the reflection detector walks them backwards using the
//! [`StackBehavior`] of each opcode.

use crate::model::{FieldHandle, MethodHandle, TypeSig};

/// Control flow behavior of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// May branch or fall through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls a method and falls through
    Call,
    /// Returns from the method
    Return,
    /// Multi-way branch
    Switch,
    /// Throws an exception
    Throw,
    /// Leaves a protected region
    Leave,
}

/// The stack effect of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of values popped
    pub pops: u8,
    /// Number of values pushed
    pub pushes: u8,
    /// `pushes - pops`
    pub net_effect: i8,
}

impl StackBehavior {
    /// Creates a stack behavior from its pop and push counts.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn new(pops: u8, pushes: u8) -> Self {
        StackBehavior {
            pops,
            pushes,
            net_effect: pushes as i8 - pops as i8,
        }
    }
}

/// The opcodes the member model represents.
///
/// Short and long branch forms and the `ldarg.0`-style macros are folded into their general
/// opcode; the operand carries the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum OpCode {
    Nop,
    Ldarg,
    Ldarga,
    Starg,
    Ldloc,
    Ldloca,
    Stloc,
    Ldnull,
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    #[strum(serialize = "ldc.i8")]
    LdcI8,
    #[strum(serialize = "ldc.r8")]
    LdcR8,
    Ldstr,
    Dup,
    Pop,
    Call,
    Callvirt,
    Newobj,
    Ret,
    Br,
    Brtrue,
    Brfalse,
    Beq,
    Bne,
    Blt,
    Bgt,
    Switch,
    Leave,
    Endfinally,
    Throw,
    Rethrow,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Neg,
    Not,
    Ceq,
    Cgt,
    Clt,
    #[strum(serialize = "conv.i4")]
    ConvI4,
    #[strum(serialize = "conv.i8")]
    ConvI8,
    #[strum(serialize = "conv.r8")]
    ConvR8,
    Ldfld,
    Ldflda,
    Stfld,
    Ldsfld,
    Ldsflda,
    Stsfld,
    Ldtoken,
    Ldftn,
    Ldvirtftn,
    Newarr,
    Ldlen,
    Ldelem,
    Ldelema,
    Stelem,
    Box,
    Unbox,
    #[strum(serialize = "unbox.any")]
    UnboxAny,
    Castclass,
    Isinst,
    Initobj,
    Ldobj,
    Stobj,
    Sizeof,
    Constrained,
}

impl OpCode {
    /// Returns the fixed stack behavior of this opcode.
    ///
    /// `None` for call-like opcodes, whose effect depends on the callee signature; see
    /// [`Universe::stack_behavior`](crate::model::Universe::stack_behavior).
    #[must_use]
    pub fn stack_behavior(self) -> Option<StackBehavior> {
        use OpCode::*;
        let (pops, pushes) = match self {
            Call | Callvirt | Newobj => return None,
            Nop | Br | Leave | Endfinally | Rethrow | Constrained => (0, 0),
            Ldarg | Ldarga | Ldloc | Ldloca | Ldnull | LdcI4 | LdcI8 | LdcR8 | Ldstr
            | Ldsfld | Ldsflda | Ldtoken | Ldftn | Sizeof => (0, 1),
            Starg | Stloc | Pop | Brtrue | Brfalse | Switch | Throw | Stsfld | Initobj => (1, 0),
            Dup => (1, 2),
            Ret => (0, 0),
            Beq | Bne | Blt | Bgt | Stfld | Stobj => (2, 0),
            Add | Sub | Mul | Div | Rem | And | Or | Xor | Shl | Shr | Ceq | Cgt | Clt
            | Ldelem | Ldelema => (2, 1),
            Neg | Not | ConvI4 | ConvI8 | ConvR8 | Ldfld | Ldflda | Ldvirtftn | Newarr | Ldlen
            | Box | Unbox | UnboxAny | Castclass | Isinst | Ldobj => (1, 1),
            Stelem => (3, 0),
        };
        Some(StackBehavior::new(pops, pushes))
    }

    /// Returns the control flow behavior of this opcode.
    #[must_use]
    pub fn flow(self) -> FlowType {
        use OpCode::*;
        match self {
            Call | Callvirt | Newobj => FlowType::Call,
            Br => FlowType::UnconditionalBranch,
            Brtrue | Brfalse | Beq | Bne | Blt | Bgt => FlowType::ConditionalBranch,
            Switch => FlowType::Switch,
            Ret => FlowType::Return,
            Throw | Rethrow => FlowType::Throw,
            Leave | Endfinally => FlowType::Leave,
            _ => FlowType::Sequential,
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// 32-bit integer immediate
    Int32(i32),
    /// 64-bit integer immediate
    Int64(i64),
    /// Floating point immediate
    Float64(f64),
    /// A user string (`ldstr`)
    String(String),
    /// A type token
    Type(TypeSig),
    /// A method token
    Method(MethodHandle),
    /// A field token
    Field(FieldHandle),
    /// A local variable index
    Local(u16),
    /// An argument index, `this` being 0 for instance methods
    Argument(u16),
    /// A branch target offset
    Target(u32),
    /// Switch targets
    Switch(Vec<u32>),
}

/// A single IL instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the instruction in the method body
    pub offset: u32,
    /// The opcode
    pub opcode: OpCode,
    /// The operand
    pub operand: Operand,
}

impl Instruction {
    /// Returns the branch targets of this instruction, empty for non-branches.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }
}

/// An exception handling clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Caught exception type, `None` for finally and fault handlers
    pub catch_type: Option<TypeSig>,
    /// Offset of the handler's first instruction
    pub handler_offset: u32,
}

/// A method body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodBody {
    /// Local variable types
    pub locals: Vec<TypeSig>,
    /// Instruction stream in offset order
    pub instructions: Vec<Instruction>,
    /// Exception handling clauses
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Builds a body from `(opcode, operand)` pairs, assigning consecutive offsets.
    ///
    /// Offsets are instruction indices rather than byte offsets; branch operands in the pairs
    /// must use the same numbering.
    #[must_use]
    pub fn from_ops(ops: Vec<(OpCode, Operand)>) -> Self {
        let instructions = ops
            .into_iter()
            .enumerate()
            .map(|(offset, (opcode, operand))| Instruction {
                offset: u32::try_from(offset).unwrap_or(u32::MAX),
                opcode,
                operand,
            })
            .collect();
        MethodBody {
            locals: Vec::new(),
            instructions,
            exception_handlers: Vec::new(),
        }
    }

    /// Sets the local variable types.
    #[must_use]
    pub fn with_locals(mut self, locals: Vec<TypeSig>) -> Self {
        self.locals = locals;
        self
    }

    /// Adds an exception handler.
    #[must_use]
    pub fn with_handler(mut self, handler: ExceptionHandler) -> Self {
        self.exception_handlers.push(handler);
        self
    }

    /// Returns the index of the instruction at `offset`.
    #[must_use]
    pub fn index_of_offset(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |i| i.offset)
            .ok()
    }

    /// Returns the set of instruction indices that are targets of some branch or handler.
    #[must_use]
    pub fn jump_target_indices(&self) -> Vec<usize> {
        let mut targets: Vec<usize> = self
            .instructions
            .iter()
            .flat_map(Instruction::branch_targets)
            .chain(self.exception_handlers.iter().map(|h| h.handler_offset))
            .filter_map(|offset| self.index_of_offset(offset))
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Returns `true` if replacing this body with a throwing stub makes it smaller.
    ///
    /// The stub is `newobj NotSupportedException::.ctor(); throw`.
    #[must_use]
    pub fn is_worth_converting_to_throw(&self) -> bool {
        self.instructions.len() > 2
    }
}
