use crate::frontend::a32::types::{Reg, ShiftType};
use crate::ir::value::Value;

use super::helpers::emit_imm_shift;
use super::ArmVisitor;

/// QADD: saturating signed add, setting Q on saturation.
pub fn arm_qadd(v: &mut ArmVisitor<'_>) -> bool {
    emit_qaddsub(v, false, false)
}

/// QSUB: saturating signed subtract.
pub fn arm_qsub(v: &mut ArmVisitor<'_>) -> bool {
    emit_qaddsub(v, true, false)
}

/// QDADD: saturating add of Rm and doubled Rn.
pub fn arm_qdadd(v: &mut ArmVisitor<'_>) -> bool {
    emit_qaddsub(v, false, true)
}

/// QDSUB.
pub fn arm_qdsub(v: &mut ArmVisitor<'_>) -> bool {
    emit_qaddsub(v, true, true)
}

fn emit_qaddsub(v: &mut ArmVisitor<'_>, subtract: bool, double: bool) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if rd == Reg::R15 || rm == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }

    let m = v.ir.get_register(rm);
    let mut n = v.ir.get_register(rn);
    if double {
        let doubled = v.ir.ir().signed_saturated_add_32(n, n);
        let q = v.ir.ir().get_overflow_from_op(doubled);
        v.ir.or_q_flag(q);
        n = doubled;
    }
    let result = if subtract {
        v.ir.ir().signed_saturated_sub_32(m, n)
    } else {
        v.ir.ir().signed_saturated_add_32(m, n)
    };
    let q = v.ir.ir().get_overflow_from_op(result);
    v.ir.or_q_flag(q);
    v.ir.set_register(rd, result);
    true
}

/// SSAT: signed saturation of a shifted operand.
pub fn arm_ssat(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rn) = (v.reg('d'), v.reg('n'));
    if rd == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }
    let sat_to = (v.field('b') + 1) as u8;
    let operand = emit_sat_operand(v, rn);
    let result = v.ir.ir().signed_saturation(operand, sat_to);
    let q = v.ir.ir().get_overflow_from_op(result);
    v.ir.or_q_flag(q);
    v.ir.set_register(rd, result);
    true
}

/// USAT: unsigned saturation of a shifted operand.
pub fn arm_usat(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rn) = (v.reg('d'), v.reg('n'));
    if rd == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }
    let sat_to = v.field('b') as u8;
    let operand = emit_sat_operand(v, rn);
    let result = v.ir.ir().unsigned_saturation(operand, sat_to);
    let q = v.ir.ir().get_overflow_from_op(result);
    v.ir.or_q_flag(q);
    v.ir.set_register(rd, result);
    true
}

fn emit_sat_operand(v: &mut ArmVisitor<'_>, rn: Reg) -> Value {
    // sh bit selects LSL or ASR; ASR #0 encodes ASR #32.
    let imm5 = v.field('v');
    let shift_type = if v.field('r') != 0 {
        ShiftType::ASR
    } else {
        ShiftType::LSL
    };
    let n = v.ir.get_register(rn);
    emit_imm_shift(&mut v.ir, n, shift_type, imm5, Value::ImmU1(false)).result
}

/// SSAT16: saturate both halfwords.
pub fn arm_ssat16(v: &mut ArmVisitor<'_>) -> bool {
    emit_sat16(v, true)
}

/// USAT16.
pub fn arm_usat16(v: &mut ArmVisitor<'_>) -> bool {
    emit_sat16(v, false)
}

fn emit_sat16(v: &mut ArmVisitor<'_>, signed: bool) -> bool {
    let (rd, rn) = (v.reg('d'), v.reg('n'));
    if rd == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }
    let sat_to = if signed {
        (v.field('b') + 1) as u8
    } else {
        v.field('b') as u8
    };

    let n = v.ir.get_register(rn);
    let lo_h = v.ir.ir().least_significant_half(n);
    let lo = v.ir.ir().sign_extend_half_to_word(lo_h);
    let hi_r = v.ir.ir().rotate_right_32(n, Value::ImmU8(16), Value::ImmU1(false)).result;
    let hi_h = v.ir.ir().least_significant_half(hi_r);
    let hi = v.ir.ir().sign_extend_half_to_word(hi_h);

    let (lo_sat, hi_sat) = if signed {
        (
            v.ir.ir().signed_saturation(lo, sat_to),
            v.ir.ir().signed_saturation(hi, sat_to),
        )
    } else {
        (
            v.ir.ir().unsigned_saturation(lo, sat_to),
            v.ir.ir().unsigned_saturation(hi, sat_to),
        )
    };
    let q_lo = v.ir.ir().get_overflow_from_op(lo_sat);
    v.ir.or_q_flag(q_lo);
    let q_hi = v.ir.ir().get_overflow_from_op(hi_sat);
    v.ir.or_q_flag(q_hi);

    let lo_masked = v.ir.ir().and_32(lo_sat, Value::ImmU32(0xFFFF));
    let hi_shifted = v
        .ir
        .ir()
        .logical_shift_left_32(hi_sat, Value::ImmU8(16), Value::ImmU1(false))
        .result;
    let result = v.ir.ir().or_32(lo_masked, hi_shifted);
    v.ir.set_register(rd, result);
    true
}
