//! Backward stack simulation over straight-line IL.
//!
//! To find which instruction produced an argument of a call, walk backwards from the call
//! tracking how many values sit above the one we want. Each instruction pops and pushes
//! according to its [`StackBehavior`](crate::model::StackBehavior); the first instruction that
//! pushes into the tracked slot is the producer. The walk gives up at anything that is not
//! straight-line code: branches, returns, throws, and instructions that are branch targets,
//! since the stack there may come from more than one predecessor.

use crate::model::{FlowType, MethodBody, OpCode, Operand, Universe};

/// Limit on nested producer searches through `dup` and local variables.
const MAX_INDIRECTION: usize = 8;

/// Finds the instruction that pushed the value `depth` slots below the top of the stack as it
/// is just before instruction `index` executes.
///
/// Returns `None` if the producer cannot be determined from straight-line code.
#[must_use]
pub fn find_producer(universe: &Universe, body: &MethodBody, index: usize, depth: usize) -> Option<usize> {
    let targets = body.jump_target_indices();
    producer(universe, body, &targets, index, depth, 0)
}

fn producer(
    universe: &Universe,
    body: &MethodBody,
    targets: &[usize],
    index: usize,
    depth: usize,
    indirection: usize,
) -> Option<usize> {
    if indirection > MAX_INDIRECTION {
        return None;
    }
    let mut above = depth;
    let mut current = index;
    loop {
        if targets.binary_search(&current).is_ok() || current == 0 {
            return None;
        }
        current -= 1;
        let instruction = body.instructions.get(current)?;
        if !matches!(instruction.opcode.flow(), FlowType::Sequential | FlowType::Call) {
            return None;
        }
        let behavior = universe.stack_behavior(instruction)?;
        let pushes = usize::from(behavior.pushes);
        if above < pushes {
            if instruction.opcode == OpCode::Dup {
                return producer(universe, body, targets, current, 0, indirection + 1);
            }
            return Some(current);
        }
        above = above - pushes + usize::from(behavior.pops);
    }
}

/// Follows `ldloc n` back to the value most recently stored by `stloc n`.
///
/// Returns the producer of that stored value.
#[must_use]
pub fn follow_local(universe: &Universe, body: &MethodBody, ldloc: usize) -> Option<usize> {
    let instruction = body.instructions.get(ldloc)?;
    let (OpCode::Ldloc, Operand::Local(local)) = (instruction.opcode, &instruction.operand) else {
        return None;
    };
    let store = (0..ldloc).rev().find(|&i| {
        let candidate = &body.instructions[i];
        candidate.opcode == OpCode::Stloc && candidate.operand == Operand::Local(*local)
    })?;
    let targets = body.jump_target_indices();
    // The local must not be reachable from another store through a branch.
    if targets.iter().any(|&t| t > store && t <= ldloc) {
        return None;
    }
    producer(universe, body, &targets, store, 0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{CoreLibrary, MethodBody, OpCode, Operand},
        Result,
    };

    fn body(ops: Vec<(OpCode, Operand)>) -> MethodBody {
        MethodBody::from_ops(ops)
    }

    #[test]
    fn test_finds_argument_producers_by_depth() {
        let universe = Universe::new();
        let body = body(vec![
            (OpCode::Ldstr, Operand::String("a".into())),
            (OpCode::LdcI4, Operand::Int32(1)),
            (OpCode::LdcI4, Operand::Int32(2)),
            (OpCode::Add, Operand::None),
            (OpCode::Ldstr, Operand::String("b".into())),
            (OpCode::Nop, Operand::None),
        ]);
        assert_eq!(find_producer(&universe, &body, 5, 0), Some(4));
        assert_eq!(find_producer(&universe, &body, 5, 1), Some(3));
        assert_eq!(find_producer(&universe, &body, 5, 2), Some(0));
        assert_eq!(find_producer(&universe, &body, 5, 3), None);
    }

    #[test]
    fn test_dup_resolves_to_original_producer() {
        let universe = Universe::new();
        let body = body(vec![
            (OpCode::Ldstr, Operand::String("a".into())),
            (OpCode::Dup, Operand::None),
            (OpCode::Nop, Operand::None),
        ]);
        assert_eq!(find_producer(&universe, &body, 2, 0), Some(0));
        assert_eq!(find_producer(&universe, &body, 2, 1), Some(0));
    }

    #[test]
    fn test_gives_up_at_branch_targets() {
        let universe = Universe::new();
        let body = body(vec![
            (OpCode::Ldarg, Operand::Argument(0)),
            (OpCode::Brtrue, Operand::Target(3)),
            (OpCode::Ldstr, Operand::String("a".into())),
            (OpCode::Ldstr, Operand::String("b".into())),
            (OpCode::Nop, Operand::None),
        ]);
        assert_eq!(find_producer(&universe, &body, 4, 0), Some(3));
        assert_eq!(find_producer(&universe, &body, 4, 1), None);
    }

    #[test]
    fn test_calls_use_callee_signature() -> Result<()> {
        let mut universe = Universe::new();
        let core = CoreLibrary::install(&mut universe)?;
        let body = body(vec![
            (OpCode::Ldstr, Operand::String("x".into())),
            (OpCode::Ldtoken, Operand::Type(core.string.into())),
            (OpCode::Call, Operand::Method(core.get_type_from_handle.into())),
            (OpCode::Nop, Operand::None),
        ]);
        assert_eq!(find_producer(&universe, &body, 3, 0), Some(2));
        assert_eq!(find_producer(&universe, &body, 3, 1), Some(0));
        assert_eq!(find_producer(&universe, &body, 2, 0), Some(1));
        Ok(())
    }

    #[test]
    fn test_follow_local() {
        let universe = Universe::new();
        let body = body(vec![
            (OpCode::Ldstr, Operand::String("a".into())),
            (OpCode::Stloc, Operand::Local(0)),
            (OpCode::Ldloc, Operand::Local(0)),
        ]);
        assert_eq!(follow_local(&universe, &body, 2), Some(0));
        assert_eq!(follow_local(&universe, &body, 1), None);
    }
}
