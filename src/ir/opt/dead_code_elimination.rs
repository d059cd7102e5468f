use crate::ir::block::Block;
use crate::ir::value::Value;

/// Remove pure ops whose results are unused.
///
/// A single reverse sweep suffices: arguments always precede their users,
/// so freeing a user first exposes its operands in the same pass. Runs
/// both before and after constant propagation, because folding reveals
/// new dead ops.
pub fn dead_code_elimination(block: &mut Block) {
    for i in (0..block.instructions.len()).rev() {
        let inst = &block.instructions[i];
        if inst.is_tombstone() || inst.has_side_effects() || inst.use_count != 0 {
            continue;
        }

        let num_args = inst.num_args();
        for a in 0..num_args {
            if let Value::Inst(arg_ref) = block.instructions[i].args[a] {
                let arg = &mut block.instructions[arg_ref.index()];
                arg.use_count = arg.use_count.saturating_sub(1);
            }
        }
        block.instructions[i].tombstone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::a32::types::Reg;
    use crate::ir::location::LocationDescriptor;
    use crate::ir::opcode::Opcode;

    #[test]
    fn test_removes_unused_chain() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R0)]);
        let not = block.append(Opcode::Not32, &[Value::Inst(get)]);
        // `not` is unused; both it and the get feeding it should go.
        let _ = not;
        dead_code_elimination(&mut block);
        assert_eq!(block.live_inst_count(), 0);
    }

    #[test]
    fn test_keeps_effects_and_their_inputs() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R0)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R1), Value::Inst(get)]);
        dead_code_elimination(&mut block);
        assert_eq!(block.live_inst_count(), 2);
    }
}
