use crate::ir::block::Block;
use crate::ir::opcode::Opcode;
use crate::ir::value::{InstRef, Value};

/// A32 AddWithCarry: result, carry-out, overflow.
pub fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let result = wide as u32;
    let carry = wide > u32::MAX as u64;
    let overflow = (!(a ^ b) & (a ^ result)) & 0x8000_0000 != 0;
    (result, carry, overflow)
}

/// A32 immediate shifts, returning (result, carry-out).
pub fn lsl_c(x: u32, shift: u32, carry_in: bool) -> (u32, bool) {
    match shift {
        0 => (x, carry_in),
        1..=31 => (x << shift, (x >> (32 - shift)) & 1 != 0),
        32 => (0, x & 1 != 0),
        _ => (0, false),
    }
}

pub fn lsr_c(x: u32, shift: u32, carry_in: bool) -> (u32, bool) {
    match shift {
        0 => (x, carry_in),
        1..=31 => (x >> shift, (x >> (shift - 1)) & 1 != 0),
        32 => (0, x >> 31 != 0),
        _ => (0, false),
    }
}

pub fn asr_c(x: u32, shift: u32, carry_in: bool) -> (u32, bool) {
    match shift {
        0 => (x, carry_in),
        1..=31 => (
            ((x as i32) >> shift) as u32,
            (x >> (shift - 1)) & 1 != 0,
        ),
        _ => {
            let fill = if x >> 31 != 0 { u32::MAX } else { 0 };
            (fill, x >> 31 != 0)
        }
    }
}

pub fn ror_c(x: u32, shift: u32, carry_in: bool) -> (u32, bool) {
    if shift == 0 {
        return (x, carry_in);
    }
    let amount = shift % 32;
    let result = x.rotate_right(amount);
    (result, result >> 31 != 0)
}

pub fn rrx_c(x: u32, carry_in: bool) -> (u32, bool) {
    (((carry_in as u32) << 31) | (x >> 1), x & 1 != 0)
}

struct Folder<'a> {
    block: &'a mut Block,
}

impl Folder<'_> {
    fn imm_u32(&self, v: Value) -> Option<u32> {
        match v {
            Value::ImmU32(x) => Some(x),
            _ => None,
        }
    }

    fn imm_u1(&self, v: Value) -> Option<bool> {
        match v {
            Value::ImmU1(x) => Some(x),
            _ => None,
        }
    }

    /// Replace `inst` and its carry/overflow pseudo-ops with immediates.
    fn fold_flags(&mut self, inst: InstRef, result: u32, carry: bool, overflow: bool) {
        if let Some(c) = self.block.find_pseudo_op(inst, Opcode::GetCarryFromOp) {
            self.block.replace_uses_with(c, Value::ImmU1(carry));
        }
        if let Some(v) = self.block.find_pseudo_op(inst, Opcode::GetOverflowFromOp) {
            self.block.replace_uses_with(v, Value::ImmU1(overflow));
        }
        self.block.replace_uses_with(inst, Value::ImmU32(result));
    }

    /// Replace `inst` with `value`, forwarding a carry pseudo-op to
    /// `carry` (used for shift-by-zero identities where the carry-out is
    /// the carry-in value, immediate or not).
    fn fold_with_carry_value(&mut self, inst: InstRef, value: Value, carry: Value) {
        if let Some(c) = self.block.find_pseudo_op(inst, Opcode::GetCarryFromOp) {
            self.block.replace_uses_with(c, carry);
        }
        self.block.replace_uses_with(inst, value);
    }

    fn has_flag_pseudo_ops(&self, inst: InstRef) -> bool {
        self.block.find_pseudo_op(inst, Opcode::GetCarryFromOp).is_some()
            || self.block.find_pseudo_op(inst, Opcode::GetOverflowFromOp).is_some()
            || self.block.find_pseudo_op(inst, Opcode::GetGEFromOp).is_some()
    }
}

/// Fold pure ops with all-constant arguments and simplify identities.
///
/// Flag-producing ops are folded together with their pseudo-ops so a
/// folded `Add32` still delivers its carry and overflow to consumers.
pub fn constant_propagation(block: &mut Block) {
    let len = block.instructions.len();
    let mut f = Folder { block };

    for i in 0..len {
        if f.block.instructions[i].is_tombstone() {
            continue;
        }
        let inst_ref = InstRef(i as u32);
        let opcode = f.block.instructions[i].opcode;
        let args = f.block.instructions[i].args;

        match opcode {
            Opcode::And32 => match (f.imm_u32(args[0]), f.imm_u32(args[1])) {
                (Some(a), Some(b)) => f.block.replace_uses_with(inst_ref, Value::ImmU32(a & b)),
                (_, Some(0)) | (Some(0), _) => {
                    f.block.replace_uses_with(inst_ref, Value::ImmU32(0))
                }
                (_, Some(u32::MAX)) => f.block.replace_uses_with(inst_ref, args[0]),
                (Some(u32::MAX), _) => f.block.replace_uses_with(inst_ref, args[1]),
                _ => {}
            },
            Opcode::Or32 => match (f.imm_u32(args[0]), f.imm_u32(args[1])) {
                (Some(a), Some(b)) => f.block.replace_uses_with(inst_ref, Value::ImmU32(a | b)),
                (_, Some(0)) => f.block.replace_uses_with(inst_ref, args[0]),
                (Some(0), _) => f.block.replace_uses_with(inst_ref, args[1]),
                (_, Some(u32::MAX)) | (Some(u32::MAX), _) => {
                    f.block.replace_uses_with(inst_ref, Value::ImmU32(u32::MAX))
                }
                _ => {}
            },
            Opcode::Eor32 => match (f.imm_u32(args[0]), f.imm_u32(args[1])) {
                (Some(a), Some(b)) => f.block.replace_uses_with(inst_ref, Value::ImmU32(a ^ b)),
                (_, Some(0)) => f.block.replace_uses_with(inst_ref, args[0]),
                (Some(0), _) => f.block.replace_uses_with(inst_ref, args[1]),
                _ => {}
            },
            Opcode::Not32 => {
                if let Some(a) = f.imm_u32(args[0]) {
                    f.block.replace_uses_with(inst_ref, Value::ImmU32(!a));
                }
            }
            Opcode::Add32 => {
                if let (Some(a), Some(b), Some(c)) =
                    (f.imm_u32(args[0]), f.imm_u32(args[1]), f.imm_u1(args[2]))
                {
                    let (result, carry, overflow) = add_with_carry(a, b, c);
                    f.fold_flags(inst_ref, result, carry, overflow);
                } else if f.imm_u32(args[1]) == Some(0)
                    && f.imm_u1(args[2]) == Some(false)
                    && !f.has_flag_pseudo_ops(inst_ref)
                {
                    f.block.replace_uses_with(inst_ref, args[0]);
                }
            }
            Opcode::Sub32 => {
                if let (Some(a), Some(b), Some(c)) =
                    (f.imm_u32(args[0]), f.imm_u32(args[1]), f.imm_u1(args[2]))
                {
                    let (result, carry, overflow) = add_with_carry(a, !b, c);
                    f.fold_flags(inst_ref, result, carry, overflow);
                } else if f.imm_u32(args[1]) == Some(0)
                    && f.imm_u1(args[2]) == Some(true)
                    && !f.has_flag_pseudo_ops(inst_ref)
                {
                    f.block.replace_uses_with(inst_ref, args[0]);
                }
            }
            Opcode::LogicalShiftLeft32
            | Opcode::LogicalShiftRight32
            | Opcode::ArithmeticShiftRight32
            | Opcode::RotateRight32 => {
                let shift = match args[1] {
                    Value::ImmU8(s) => Some(s as u32),
                    _ => None,
                };
                match (f.imm_u32(args[0]), shift, f.imm_u1(args[2])) {
                    (Some(x), Some(s), Some(c)) => {
                        let (result, carry) = match opcode {
                            Opcode::LogicalShiftLeft32 => lsl_c(x, s, c),
                            Opcode::LogicalShiftRight32 => lsr_c(x, s, c),
                            Opcode::ArithmeticShiftRight32 => asr_c(x, s, c),
                            _ => ror_c(x, s, c),
                        };
                        f.fold_with_carry_value(
                            inst_ref,
                            Value::ImmU32(result),
                            Value::ImmU1(carry),
                        );
                    }
                    (_, Some(0), _) => {
                        // Shift by zero passes the value and carry through.
                        f.fold_with_carry_value(inst_ref, args[0], args[2]);
                    }
                    _ => {}
                }
            }
            Opcode::RotateRightExtended => {
                if let (Some(x), Some(c)) = (f.imm_u32(args[0]), f.imm_u1(args[1])) {
                    let (result, carry) = rrx_c(x, c);
                    f.fold_with_carry_value(inst_ref, Value::ImmU32(result), Value::ImmU1(carry));
                }
            }
            Opcode::Mul32 => {
                if let (Some(a), Some(b)) = (f.imm_u32(args[0]), f.imm_u32(args[1])) {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU32(a.wrapping_mul(b)));
                }
            }
            Opcode::MostSignificantBit => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block.replace_uses_with(inst_ref, Value::ImmU1(x >> 31 != 0));
                }
            }
            Opcode::IsZero32 => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block.replace_uses_with(inst_ref, Value::ImmU1(x == 0));
                }
            }
            Opcode::LeastSignificantHalf => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block.replace_uses_with(inst_ref, Value::ImmU16(x as u16));
                }
            }
            Opcode::LeastSignificantByte => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block.replace_uses_with(inst_ref, Value::ImmU8(x as u8));
                }
            }
            Opcode::LeastSignificantWord => {
                if let Value::ImmU64(x) = args[0] {
                    f.block.replace_uses_with(inst_ref, Value::ImmU32(x as u32));
                }
            }
            Opcode::MostSignificantWord => {
                if let Value::ImmU64(x) = args[0] {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU32((x >> 32) as u32));
                }
            }
            Opcode::Pack2x32To1x64 => {
                if let (Some(lo), Some(hi)) = (f.imm_u32(args[0]), f.imm_u32(args[1])) {
                    f.block.replace_uses_with(
                        inst_ref,
                        Value::ImmU64((lo as u64) | ((hi as u64) << 32)),
                    );
                }
            }
            Opcode::SignExtendByteToWord => {
                if let Value::ImmU8(x) = args[0] {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU32(x as i8 as i32 as u32));
                }
            }
            Opcode::SignExtendHalfToWord => {
                if let Value::ImmU16(x) = args[0] {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU32(x as i16 as i32 as u32));
                }
            }
            Opcode::ZeroExtendByteToWord => {
                if let Value::ImmU8(x) = args[0] {
                    f.block.replace_uses_with(inst_ref, Value::ImmU32(x as u32));
                }
            }
            Opcode::ZeroExtendHalfToWord => {
                if let Value::ImmU16(x) = args[0] {
                    f.block.replace_uses_with(inst_ref, Value::ImmU32(x as u32));
                }
            }
            Opcode::SignExtendWordToLong => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU64(x as i32 as i64 as u64));
                }
            }
            Opcode::ZeroExtendWordToLong => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block.replace_uses_with(inst_ref, Value::ImmU64(x as u64));
                }
            }
            Opcode::ByteReverseWord => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU32(x.swap_bytes()));
                }
            }
            Opcode::ByteReverseHalf => {
                if let Value::ImmU16(x) = args[0] {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU16(x.swap_bytes()));
                }
            }
            Opcode::CountLeadingZeros => {
                if let Some(x) = f.imm_u32(args[0]) {
                    f.block
                        .replace_uses_with(inst_ref, Value::ImmU32(x.leading_zeros()));
                }
            }
            Opcode::Identity => {
                f.block.replace_uses_with(inst_ref, args[0]);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::a32::types::Reg;
    use crate::ir::location::LocationDescriptor;

    #[test]
    fn test_add_with_carry_semantics() {
        assert_eq!(add_with_carry(5, 13, false), (18, false, false));
        assert_eq!(add_with_carry(u32::MAX, 1, false), (0, true, false));
        assert_eq!(add_with_carry(0x7FFF_FFFF, 1, false), (0x8000_0000, false, true));
        // Subtraction without borrow: a + !b + 1.
        assert_eq!(add_with_carry(5, !3, true), (2, true, false));
    }

    #[test]
    fn test_shift_carry_semantics() {
        assert_eq!(lsl_c(1, 31, false), (0x8000_0000, false));
        assert_eq!(lsl_c(3, 31, false), (0x8000_0000, true));
        assert_eq!(lsl_c(1, 32, true), (0, true));
        assert_eq!(lsl_c(1, 33, true), (0, false));
        assert_eq!(lsr_c(0x8000_0000, 31, false), (1, false));
        assert_eq!(lsr_c(0x8000_0000, 32, false), (0, true));
        assert_eq!(asr_c(0x8000_0000, 40, false), (u32::MAX, true));
        assert_eq!(ror_c(0x0000_00F1, 4, false), (0x1000_000F, false));
        assert_eq!(rrx_c(0x3, true), (0x8000_0001, true));
    }

    #[test]
    fn test_folds_constant_add_and_its_flags() {
        let mut block = Block::new(LocationDescriptor(0));
        let add = block.append(
            Opcode::Add32,
            &[Value::ImmU32(u32::MAX), Value::ImmU32(1), Value::ImmU1(false)],
        );
        let carry = block.append(Opcode::GetCarryFromOp, &[Value::Inst(add)]);
        block.append(Opcode::A32SetCFlag, &[Value::Inst(carry)]);
        block.append(
            Opcode::A32SetRegister,
            &[Value::ImmReg(Reg::R0), Value::Inst(add)],
        );

        constant_propagation(&mut block);

        assert_eq!(block.instructions[2].args[0], Value::ImmU1(true));
        assert_eq!(block.instructions[3].args[1], Value::ImmU32(0));
    }

    #[test]
    fn test_shift_by_zero_forwards_carry_in() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R1)]);
        let c_in = block.append(Opcode::A32GetCFlag, &[]);
        let shift = block.append(
            Opcode::LogicalShiftLeft32,
            &[Value::Inst(get), Value::ImmU8(0), Value::Inst(c_in)],
        );
        let carry = block.append(Opcode::GetCarryFromOp, &[Value::Inst(shift)]);
        block.append(Opcode::A32SetCFlag, &[Value::Inst(carry)]);
        block.append(
            Opcode::A32SetRegister,
            &[Value::ImmReg(Reg::R0), Value::Inst(shift)],
        );

        constant_propagation(&mut block);

        // Result forwards the shifted value, carry forwards the carry-in.
        assert_eq!(block.instructions[4].args[0], Value::Inst(c_in));
        assert_eq!(block.instructions[5].args[1], Value::Inst(get));
    }

    #[test]
    fn test_and_identity() {
        let mut block = Block::new(LocationDescriptor(0));
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R1)]);
        let and = block.append(Opcode::And32, &[Value::Inst(get), Value::ImmU32(u32::MAX)]);
        block.append(
            Opcode::A32SetRegister,
            &[Value::ImmReg(Reg::R0), Value::Inst(and)],
        );

        constant_propagation(&mut block);

        assert_eq!(block.instructions[2].args[1], Value::Inst(get));
    }
}
