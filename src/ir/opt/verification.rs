use std::collections::HashMap;

use crate::ir::block::Block;
use crate::ir::value::Value;

/// Debug-mode consistency audit of a block.
///
/// Asserts that every op's argument types match its opcode signature,
/// that recorded use counts agree with actual uses, and that a terminal
/// has been set. Violations are internal invariant failures, never
/// guest-visible.
pub fn verification_pass(block: &Block) {
    assert!(!block.terminal.is_invalid(), "block has no terminal set");

    let mut actual_uses: HashMap<usize, u32> = HashMap::new();

    for (r, inst) in block.iter_live() {
        let expected = inst.opcode.arg_types();
        for (i, ty) in expected.iter().enumerate() {
            let arg = inst.args[i];
            assert!(
                arg != Value::Void,
                "{r}: argument {i} of {} is missing",
                inst.opcode
            );
            let actual = block.type_of(arg);
            assert!(
                actual.is_compatible_with(*ty),
                "{r}: argument {i} of {} has type {actual}, expected {ty}",
                inst.opcode
            );
            if let Value::Inst(arg_ref) = arg {
                assert!(
                    !block.get(arg_ref).is_tombstone(),
                    "{r}: argument {i} of {} references a freed value",
                    inst.opcode
                );
                *actual_uses.entry(arg_ref.index()).or_default() += 1;
            }
        }
    }

    for (r, inst) in block.iter_live() {
        let actual = actual_uses.get(&r.index()).copied().unwrap_or(0);
        assert_eq!(
            inst.use_count, actual,
            "{r}: use count of {} is {} but has {actual} uses",
            inst.opcode, inst.use_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::a32::types::Reg;
    use crate::ir::location::LocationDescriptor;
    use crate::ir::opcode::Opcode;
    use crate::ir::terminal::Terminal;

    #[test]
    fn test_well_formed_block_passes() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R0)]);
        let not = block.append(Opcode::Not32, &[Value::Inst(get)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R1), Value::Inst(not)]);
        block.set_terminal(Terminal::ReturnToDispatch);
        verification_pass(&block);
    }

    #[test]
    #[should_panic(expected = "no terminal")]
    fn test_missing_terminal_fails() {
        let block = Block::new(LocationDescriptor(0));
        verification_pass(&block);
    }

    #[test]
    #[should_panic(expected = "has type")]
    fn test_type_mismatch_fails() {
        let mut block = Block::new(LocationDescriptor(0));
        // SetRegister expects (Reg, U32); pass a U1 value instead.
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::ImmU1(true)]);
        block.set_terminal(Terminal::ReturnToDispatch);
        verification_pass(&block);
    }

    #[test]
    #[should_panic(expected = "use count")]
    fn test_bad_use_count_fails() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R0)]);
        block.get_mut(get).use_count = 3;
        block.set_terminal(Terminal::ReturnToDispatch);
        verification_pass(&block);
    }
}
