use crate::frontend::a32::types::Reg;
use crate::ir::value::Value;

use super::ArmVisitor;

#[derive(Clone, Copy)]
enum ExtendKind {
    SignedByte,
    SignedHalf,
    SignedDualByte,
    UnsignedByte,
    UnsignedHalf,
    UnsignedDualByte,
}

fn emit_extend(v: &mut ArmVisitor<'_>, kind: ExtendKind, accumulate: bool) -> bool {
    let (rd, rm) = (v.reg('d'), v.reg('m'));
    if rd == Reg::R15 || rm == Reg::R15 {
        return v.unpredictable();
    }
    let rn = if accumulate {
        let rn = v.reg('n');
        if rn == Reg::R15 {
            return v.unpredictable();
        }
        Some(rn)
    } else {
        None
    };

    let rotate = v.field('r') * 8;
    let m = v.ir.get_register(rm);
    let rotated = if rotate == 0 {
        m
    } else {
        v.ir.ir()
            .rotate_right_32(m, Value::ImmU8(rotate as u8), Value::ImmU1(false))
            .result
    };

    let extended = match kind {
        ExtendKind::SignedByte => {
            let b = v.ir.ir().least_significant_byte(rotated);
            v.ir.ir().sign_extend_byte_to_word(b)
        }
        ExtendKind::SignedHalf => {
            let h = v.ir.ir().least_significant_half(rotated);
            v.ir.ir().sign_extend_half_to_word(h)
        }
        ExtendKind::UnsignedByte => {
            let b = v.ir.ir().least_significant_byte(rotated);
            v.ir.ir().zero_extend_byte_to_word(b)
        }
        ExtendKind::UnsignedHalf => {
            let h = v.ir.ir().least_significant_half(rotated);
            v.ir.ir().zero_extend_half_to_word(h)
        }
        ExtendKind::SignedDualByte | ExtendKind::UnsignedDualByte => {
            emit_dual_byte_extend(v, rotated, matches!(kind, ExtendKind::SignedDualByte))
        }
    };

    let result = match (rn, kind) {
        (None, _) => extended,
        (Some(rn), ExtendKind::SignedDualByte | ExtendKind::UnsignedDualByte) => {
            // XTAB16 adds per halfword.
            let n = v.ir.get_register(rn);
            v.ir.ir().packed_op(crate::ir::opcode::Opcode::PackedAddU16, n, extended)
        }
        (Some(rn), _) => {
            let n = v.ir.get_register(rn);
            v.ir.ir().add_32(n, extended, Value::ImmU1(false))
        }
    };

    v.ir.set_register(rd, result);
    true
}

/// Extend bytes 0 and 2 of the rotated operand into the two halfwords.
fn emit_dual_byte_extend(v: &mut ArmVisitor<'_>, rotated: Value, signed: bool) -> Value {
    let lo_b = v.ir.ir().least_significant_byte(rotated);
    let lo = if signed {
        let s = v.ir.ir().sign_extend_byte_to_word(lo_b);
        v.ir.ir().and_32(s, Value::ImmU32(0xFFFF))
    } else {
        v.ir.ir().zero_extend_byte_to_word(lo_b)
    };

    let hi_r = v
        .ir
        .ir()
        .logical_shift_right_32(rotated, Value::ImmU8(16), Value::ImmU1(false))
        .result;
    let hi_b = v.ir.ir().least_significant_byte(hi_r);
    let hi = if signed {
        let s = v.ir.ir().sign_extend_byte_to_word(hi_b);
        v.ir.ir().and_32(s, Value::ImmU32(0xFFFF))
    } else {
        v.ir.ir().zero_extend_byte_to_word(hi_b)
    };
    let hi_shifted = v
        .ir
        .ir()
        .logical_shift_left_32(hi, Value::ImmU8(16), Value::ImmU1(false))
        .result;
    v.ir.ir().or_32(lo, hi_shifted)
}

pub fn arm_sxtb(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::SignedByte, false)
}

pub fn arm_sxth(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::SignedHalf, false)
}

pub fn arm_sxtb16(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::SignedDualByte, false)
}

pub fn arm_sxtab(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::SignedByte, true)
}

pub fn arm_sxtah(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::SignedHalf, true)
}

pub fn arm_sxtab16(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::SignedDualByte, true)
}

pub fn arm_uxtb(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::UnsignedByte, false)
}

pub fn arm_uxth(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::UnsignedHalf, false)
}

pub fn arm_uxtb16(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::UnsignedDualByte, false)
}

pub fn arm_uxtab(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::UnsignedByte, true)
}

pub fn arm_uxtah(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::UnsignedHalf, true)
}

pub fn arm_uxtab16(v: &mut ArmVisitor<'_>) -> bool {
    emit_extend(v, ExtendKind::UnsignedDualByte, true)
}
