use crate::frontend::a32::types::{Reg, ShiftType};
use crate::ir::emitter::ResultAndCarry;
use crate::ir::value::Value;

use super::helpers::{arm_expand_imm_c, emit_imm_shift, emit_reg_shift};
use super::{emit_bx_and_terminal, ArmVisitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DpOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl DpOp {
    fn from_word(word: u32) -> Self {
        match (word >> 21) & 0xF {
            0b0000 => DpOp::And,
            0b0001 => DpOp::Eor,
            0b0010 => DpOp::Sub,
            0b0011 => DpOp::Rsb,
            0b0100 => DpOp::Add,
            0b0101 => DpOp::Adc,
            0b0110 => DpOp::Sbc,
            0b0111 => DpOp::Rsc,
            0b1000 => DpOp::Tst,
            0b1001 => DpOp::Teq,
            0b1010 => DpOp::Cmp,
            0b1011 => DpOp::Cmn,
            0b1100 => DpOp::Orr,
            0b1101 => DpOp::Mov,
            0b1110 => DpOp::Bic,
            _ => DpOp::Mvn,
        }
    }

    fn is_test(self) -> bool {
        matches!(self, DpOp::Tst | DpOp::Teq | DpOp::Cmp | DpOp::Cmn)
    }

    fn has_rn_operand(self) -> bool {
        !matches!(self, DpOp::Mov | DpOp::Mvn)
    }

    fn is_arithmetic(self) -> bool {
        matches!(
            self,
            DpOp::Sub | DpOp::Rsb | DpOp::Add | DpOp::Adc | DpOp::Sbc | DpOp::Rsc
                | DpOp::Cmp
                | DpOp::Cmn
        )
    }
}

/// Data processing, immediate operand.
pub fn arm_dp_imm(v: &mut ArmVisitor<'_>) -> bool {
    let op = DpOp::from_word(v.word);
    let rotate = v.field('r');
    let imm8 = v.field('v');

    let carry_in = v.ir.get_c_flag();
    let (imm, shifter_carry) = arm_expand_imm_c(rotate, imm8, carry_in);
    let carry = match shifter_carry {
        Some(c) => Value::ImmU1(c),
        None => carry_in,
    };

    let operand2 = ResultAndCarry {
        result: Value::ImmU32(imm),
        carry,
    };
    dp_common(v, op, operand2, None)
}

/// Data processing, register operand with immediate shift.
pub fn arm_dp_reg(v: &mut ArmVisitor<'_>) -> bool {
    let op = DpOp::from_word(v.word);
    let rm = v.reg('m');
    let shift_type = ShiftType::from_u8(v.field('t') as u8);
    let imm5 = v.field('v');

    let carry_in = v.ir.get_c_flag();
    let rm_val = v.ir.get_register(rm);
    let operand2 = emit_imm_shift(&mut v.ir, rm_val, shift_type, imm5, carry_in);

    let mov_is_return = op == DpOp::Mov
        && shift_type == ShiftType::LSL
        && imm5 == 0
        && rm == Reg::LR;
    dp_common(v, op, operand2, Some(mov_is_return))
}

/// Data processing, register-shifted register operand.
pub fn arm_dp_rsr(v: &mut ArmVisitor<'_>) -> bool {
    let op = DpOp::from_word(v.word);
    let rm = v.reg('m');
    let rs = v.reg('s');
    let shift_type = ShiftType::from_u8(v.field('t') as u8);

    if v.reg('d') == Reg::R15 || v.reg('n') == Reg::R15 || rm == Reg::R15 || rs == Reg::R15 {
        // R15 in a register-shifted operand is UNPREDICTABLE.
        if !v.unpredictable() {
            return false;
        }
    }

    let carry_in = v.ir.get_c_flag();
    let rm_val = v.ir.get_register(rm);
    let rs_val = v.ir.get_register(rs);
    let operand2 = emit_reg_shift(&mut v.ir, rm_val, shift_type, rs_val, carry_in);

    dp_common(v, op, operand2, Some(false))
}

fn dp_common(
    v: &mut ArmVisitor<'_>,
    op: DpOp,
    operand2: ResultAndCarry,
    mov_is_return: Option<bool>,
) -> bool {
    let rd = v.reg('d');
    let s = v.field('S') != 0 || op.is_test();

    let operand1 = if op.has_rn_operand() {
        Some(v.ir.get_register(v.reg('n')))
    } else {
        None
    };

    let o2 = operand2.result;
    let result = match op {
        DpOp::And | DpOp::Tst => v.ir.ir().and_32(operand1.unwrap(), o2),
        DpOp::Eor | DpOp::Teq => v.ir.ir().eor_32(operand1.unwrap(), o2),
        DpOp::Sub | DpOp::Cmp => v.ir.ir().sub_32(operand1.unwrap(), o2, Value::ImmU1(true)),
        DpOp::Rsb => v.ir.ir().sub_32(o2, operand1.unwrap(), Value::ImmU1(true)),
        DpOp::Add | DpOp::Cmn => v.ir.ir().add_32(operand1.unwrap(), o2, Value::ImmU1(false)),
        DpOp::Adc => {
            let c = v.ir.get_c_flag();
            v.ir.ir().add_32(operand1.unwrap(), o2, c)
        }
        DpOp::Sbc => {
            let c = v.ir.get_c_flag();
            v.ir.ir().sub_32(operand1.unwrap(), o2, c)
        }
        DpOp::Rsc => {
            let c = v.ir.get_c_flag();
            v.ir.ir().sub_32(o2, operand1.unwrap(), c)
        }
        DpOp::Orr => v.ir.ir().or_32(operand1.unwrap(), o2),
        DpOp::Mov => o2,
        DpOp::Bic => {
            let not = v.ir.ir().not_32(o2);
            v.ir.ir().and_32(operand1.unwrap(), not)
        }
        DpOp::Mvn => v.ir.ir().not_32(o2),
    };

    if rd == Reg::R15 && !op.is_test() {
        // SUBS PC, LR and friends are exception returns, not available in
        // user mode.
        if s && !v.unpredictable() {
            return false;
        }
        return emit_bx_and_terminal(v, result, mov_is_return == Some(true));
    }

    if s {
        if op.is_arithmetic() {
            v.ir.set_nzcv_from_op(result);
        } else {
            v.ir.set_nz_flags(result);
            v.ir.set_c_flag(operand2.carry);
        }
    }

    if !op.is_test() {
        v.ir.set_register(rd, result);
    }
    true
}

/// MOVW: load a 16-bit immediate, zeroing the top half.
pub fn arm_movw(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    if rd == Reg::R15 {
        return v.unpredictable();
    }
    let imm16 = v.field('v');
    v.ir.set_register(rd, Value::ImmU32(imm16));
    true
}

/// MOVT: load a 16-bit immediate into the top half.
pub fn arm_movt(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    if rd == Reg::R15 {
        return v.unpredictable();
    }
    let imm16 = v.field('v');
    let old = v.ir.get_register(rd);
    let low = v.ir.ir().and_32(old, Value::ImmU32(0xFFFF));
    let result = v.ir.ir().or_32(low, Value::ImmU32(imm16 << 16));
    v.ir.set_register(rd, result);
    true
}
