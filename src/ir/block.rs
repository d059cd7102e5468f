use std::fmt;

use crate::ir::cond::Cond;
use crate::ir::inst::Inst;
use crate::ir::location::LocationDescriptor;
use crate::ir::opcode::Opcode;
use crate::ir::terminal::Terminal;
use crate::ir::value::{InstRef, Value};

/// An IR basic block: a descriptor-tagged, append-only sequence of ops
/// followed by a terminal. Instructions live in a `Vec<Inst>` arena
/// indexed by `InstRef`; removal is done by tombstoning so references
/// stay stable.
#[derive(Debug, Clone)]
pub struct Block {
    /// The location this block translates.
    pub location: LocationDescriptor,
    /// Arena of instructions.
    pub instructions: Vec<Inst>,
    /// Block terminal.
    pub terminal: Terminal,
    /// Number of guest instructions this block accounts for.
    pub cycle_count: u64,
    /// Condition guarding the whole block, for conditional A32 runs.
    pub cond: Option<Cond>,
    /// Where execution resumes when `cond` fails at runtime.
    pub cond_failed_location: Option<LocationDescriptor>,
    /// First guest address past the translated input; with the location
    /// this is the address range invalidation tracks for the block.
    pub end_address: u32,
}

impl Block {
    pub fn new(location: LocationDescriptor) -> Self {
        Self {
            location,
            instructions: Vec::new(),
            terminal: Terminal::Invalid,
            cycle_count: 0,
            cond: None,
            cond_failed_location: None,
            end_address: location.value() as u32,
        }
    }

    /// Append an instruction with the given opcode and args, maintaining
    /// use counts of instruction-reference arguments.
    pub fn append(&mut self, opcode: Opcode, args: &[Value]) -> InstRef {
        for arg in args {
            if let Value::Inst(r) = arg {
                self.instructions[r.index()].use_count += 1;
            }
        }
        let idx = self.instructions.len();
        self.instructions.push(Inst::new(opcode, args));
        InstRef(idx as u32)
    }

    pub fn get(&self, r: InstRef) -> &Inst {
        &self.instructions[r.index()]
    }

    pub fn get_mut(&mut self, r: InstRef) -> &mut Inst {
        &mut self.instructions[r.index()]
    }

    pub fn set_terminal(&mut self, terminal: Terminal) {
        self.terminal = terminal;
    }

    /// The concrete type of a value, resolving instruction references
    /// through their opcode.
    pub fn type_of(&self, value: Value) -> crate::ir::types::Type {
        match value {
            Value::Inst(r) => self.get(r).return_type(),
            other => other.get_type(),
        }
    }

    pub fn live_inst_count(&self) -> usize {
        self.instructions.iter().filter(|i| !i.is_tombstone()).count()
    }

    pub fn inst_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterate over live instructions with their refs.
    pub fn iter_live(&self) -> impl Iterator<Item = (InstRef, &Inst)> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, inst)| !inst.is_tombstone())
            .map(|(i, inst)| (InstRef(i as u32), inst))
    }

    /// Find the pseudo-op of kind `opcode` attached to `parent`, if any.
    /// Pseudo-ops always appear after their parent, so the scan starts
    /// there.
    pub fn find_pseudo_op(&self, parent: InstRef, opcode: Opcode) -> Option<InstRef> {
        debug_assert!(opcode.is_pseudo_operation());
        self.instructions[parent.index() + 1..]
            .iter()
            .enumerate()
            .find(|(_, inst)| inst.opcode == opcode && inst.args[0] == Value::Inst(parent))
            .map(|(i, _)| InstRef((parent.index() + 1 + i) as u32))
    }

    /// Replace all uses of `target`'s result with `replacement`, fix up
    /// use counts, and tombstone `target`.
    pub fn replace_uses_with(&mut self, target: InstRef, replacement: Value) {
        let num_args = self.instructions[target.index()].num_args();
        for i in 0..num_args {
            if let Value::Inst(arg_ref) = self.instructions[target.index()].args[i] {
                let inst = &mut self.instructions[arg_ref.index()];
                inst.use_count = inst.use_count.saturating_sub(1);
            }
        }

        let mut replaced = 0u32;
        for inst in &mut self.instructions {
            for arg in &mut inst.args {
                if *arg == Value::Inst(target) {
                    *arg = replacement;
                    replaced += 1;
                }
            }
        }

        if let Value::Inst(new_ref) = replacement {
            self.instructions[new_ref.index()].use_count += replaced;
        }

        self.instructions[target.index()].use_count = 0;
        self.instructions[target.index()].tombstone();
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block {} (cycles: {}):", self.location, self.cycle_count)?;
        if let Some(cond) = self.cond {
            writeln!(f, "  cond: {cond}")?;
        }
        for (r, inst) in self.iter_live() {
            if inst.return_type() != crate::ir::types::Type::Void {
                writeln!(f, "  {r} = {inst}")?;
            } else {
                writeln!(f, "  {inst}")?;
            }
        }
        writeln!(f, "  terminal: {}", self.terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::a32::types::Reg;

    #[test]
    fn test_block_append_and_use_counts() {
        let mut block = Block::new(LocationDescriptor(0x1000));
        let get_r2 = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R2)]);
        let get_r3 = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R3)]);
        let add = block.append(
            Opcode::Add32,
            &[Value::Inst(get_r2), Value::Inst(get_r3), Value::ImmU1(false)],
        );
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R1), Value::Inst(add)]);

        assert_eq!(block.inst_count(), 4);
        assert_eq!(block.get(get_r2).use_count, 1);
        assert_eq!(block.get(get_r3).use_count, 1);
        assert_eq!(block.get(add).use_count, 1);

        let printed = block.to_string();
        assert!(printed.contains("Add32"));
        assert!(printed.contains("A32GetRegister"));
    }

    #[test]
    fn test_replace_uses_with() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R0)]);
        let not = block.append(Opcode::Not32, &[Value::Inst(get)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R1), Value::Inst(not)]);

        block.replace_uses_with(not, Value::ImmU32(0xFF));
        assert!(block.get(not).is_tombstone());
        assert_eq!(block.get(get).use_count, 0);
        assert_eq!(block.instructions[2].args[1], Value::ImmU32(0xFF));
    }

    #[test]
    fn test_find_pseudo_op() {
        let mut block = Block::new(LocationDescriptor(0));
        let add = block.append(
            Opcode::Add32,
            &[Value::ImmU32(1), Value::ImmU32(2), Value::ImmU1(false)],
        );
        let carry = block.append(Opcode::GetCarryFromOp, &[Value::Inst(add)]);
        assert_eq!(block.find_pseudo_op(add, Opcode::GetCarryFromOp), Some(carry));
        assert_eq!(block.find_pseudo_op(add, Opcode::GetOverflowFromOp), None);
    }
}
