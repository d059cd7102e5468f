use std::fmt;

use crate::ir::opcode::Opcode;
use crate::ir::types::Type;
use crate::ir::value::Value;

/// Maximum number of arguments per IR instruction.
pub const MAX_ARGS: usize = 4;

/// A single IR micro-op.
#[derive(Debug, Clone)]
pub struct Inst {
    pub opcode: Opcode,
    /// Arguments (up to MAX_ARGS, rest are Value::Void).
    pub args: [Value; MAX_ARGS],
    /// Number of other instructions that use this instruction's result,
    /// maintained incrementally by the owning block.
    pub use_count: u32,
}

impl Inst {
    pub fn new(opcode: Opcode, args: &[Value]) -> Self {
        assert!(
            args.len() <= MAX_ARGS,
            "too many args ({}) for opcode {opcode:?}",
            args.len()
        );
        let mut inst_args = [Value::Void; MAX_ARGS];
        inst_args[..args.len()].copy_from_slice(args);
        Self {
            opcode,
            args: inst_args,
            use_count: 0,
        }
    }

    pub fn return_type(&self) -> Type {
        self.opcode.return_type()
    }

    pub fn num_args(&self) -> usize {
        self.opcode.num_args()
    }

    pub fn arg(&self, idx: usize) -> Value {
        self.args[idx]
    }

    /// Whether this instruction slot has been removed by a pass.
    pub fn is_tombstone(&self) -> bool {
        self.opcode == Opcode::Void
    }

    pub fn has_side_effects(&self) -> bool {
        self.opcode.has_side_effects()
    }

    /// Mark as removed. The caller is responsible for use-count fixup of
    /// the arguments.
    pub fn tombstone(&mut self) {
        self.opcode = Opcode::Void;
        self.args = [Value::Void; MAX_ARGS];
    }

    /// Replace this instruction with an Identity forwarding `value`.
    pub fn replace_with_identity(&mut self, value: Value) {
        self.opcode = Opcode::Identity;
        self.args = [Value::Void; MAX_ARGS];
        self.args[0] = value;
    }

    pub fn arg_values(&self) -> impl Iterator<Item = &Value> {
        self.args[..self.num_args()].iter()
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        let n = self.num_args();
        for i in 0..n {
            if i == 0 {
                write!(f, " ")?;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.args[i])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::InstRef;

    #[test]
    fn test_inst_creation() {
        let inst = Inst::new(
            Opcode::Add32,
            &[
                Value::Inst(InstRef(0)),
                Value::Inst(InstRef(1)),
                Value::ImmU1(false),
            ],
        );
        assert_eq!(inst.opcode, Opcode::Add32);
        assert_eq!(inst.num_args(), 3);
        assert_eq!(inst.use_count, 0);
    }

    #[test]
    fn test_inst_tombstone() {
        let mut inst = Inst::new(
            Opcode::Add32,
            &[Value::ImmU32(1), Value::ImmU32(2), Value::ImmU1(false)],
        );
        assert!(!inst.is_tombstone());
        inst.tombstone();
        assert!(inst.is_tombstone());
    }
}
