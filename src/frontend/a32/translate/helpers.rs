use crate::frontend::a32::types::ShiftType;
use crate::ir::a32_emitter::A32IrEmitter;
use crate::ir::emitter::ResultAndCarry;
use crate::ir::value::Value;

/// Expand an A32 modified immediate: an 8-bit value rotated right by
/// twice the 4-bit rotate field.
pub fn arm_expand_imm(rotate: u32, imm8: u32) -> u32 {
    (imm8 & 0xFF).rotate_right((rotate & 0xF) * 2)
}

/// Expand an A32 modified immediate with its shifter carry-out. A zero
/// rotation passes the carry through.
pub fn arm_expand_imm_c(rotate: u32, imm8: u32, carry_in: Value) -> (u32, Option<bool>) {
    let value = arm_expand_imm(rotate, imm8);
    if rotate & 0xF == 0 {
        let _ = carry_in;
        (value, None)
    } else {
        (value, Some(value >> 31 != 0))
    }
}

/// Decode and emit an immediate shift of `value`, per the A32 rules:
/// LSR/ASR encode a shift of 32 as 0, and `ROR #0` means RRX.
pub fn emit_imm_shift(
    ir: &mut A32IrEmitter<'_>,
    value: Value,
    shift_type: ShiftType,
    imm5: u32,
    carry_in: Value,
) -> ResultAndCarry {
    match shift_type {
        ShiftType::LSL => ir
            .ir()
            .logical_shift_left_32(value, Value::ImmU8(imm5 as u8), carry_in),
        ShiftType::LSR => {
            let amount = if imm5 == 0 { 32 } else { imm5 };
            ir.ir()
                .logical_shift_right_32(value, Value::ImmU8(amount as u8), carry_in)
        }
        ShiftType::ASR => {
            let amount = if imm5 == 0 { 32 } else { imm5 };
            ir.ir()
                .arithmetic_shift_right_32(value, Value::ImmU8(amount as u8), carry_in)
        }
        ShiftType::ROR => {
            if imm5 == 0 {
                ir.ir().rotate_right_extended(value, carry_in)
            } else {
                ir.ir()
                    .rotate_right_32(value, Value::ImmU8(imm5 as u8), carry_in)
            }
        }
    }
}

/// Emit a register-amount shift of `value`. The amount is the low byte of
/// the shift register, already masked by the caller.
pub fn emit_reg_shift(
    ir: &mut A32IrEmitter<'_>,
    value: Value,
    shift_type: ShiftType,
    amount: Value,
    carry_in: Value,
) -> ResultAndCarry {
    // Variable shift amounts use the U8-typed operand path.
    let amount = ir.ir().least_significant_byte(amount);
    match shift_type {
        ShiftType::LSL => ir.ir().logical_shift_left_32(value, amount, carry_in),
        ShiftType::LSR => ir.ir().logical_shift_right_32(value, amount, carry_in),
        ShiftType::ASR => ir.ir().arithmetic_shift_right_32(value, amount, carry_in),
        ShiftType::ROR => ir.ir().rotate_right_32(value, amount, carry_in),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_expand_imm() {
        assert_eq!(arm_expand_imm(0, 0xFF), 0xFF);
        assert_eq!(arm_expand_imm(4, 0xFF), 0xFF00_0000);
        assert_eq!(arm_expand_imm(12, 0x8A), 0x8A00);
        // adc r4, r5, #35328: rotate 12, imm 0x8A.
        assert_eq!(arm_expand_imm(0xC, 0x8A), 35328);
    }

    #[test]
    fn test_arm_expand_imm_carry() {
        let carry_in = Value::ImmU1(false);
        let (v, c) = arm_expand_imm_c(0, 0xFF, carry_in);
        assert_eq!(v, 0xFF);
        assert!(c.is_none());
        let (v, c) = arm_expand_imm_c(4, 0xFF, carry_in);
        assert_eq!(v, 0xFF00_0000);
        assert_eq!(c, Some(true));
    }
}
