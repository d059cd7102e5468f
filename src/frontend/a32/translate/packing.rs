use crate::frontend::a32::types::{Reg, ShiftType};
use crate::ir::value::Value;

use super::helpers::emit_imm_shift;
use super::ArmVisitor;

/// PKHBT: pack Rn's bottom halfword with the top halfword of a shifted
/// Rm.
pub fn arm_pkhbt(v: &mut ArmVisitor<'_>) -> bool {
    emit_pkh(v, false)
}

/// PKHTB: pack Rn's top halfword with the bottom halfword of a shifted
/// Rm.
pub fn arm_pkhtb(v: &mut ArmVisitor<'_>) -> bool {
    emit_pkh(v, true)
}

fn emit_pkh(v: &mut ArmVisitor<'_>, tb: bool) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if rd == Reg::R15 || rm == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }
    let imm5 = v.field('v');

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let shift_type = if tb { ShiftType::ASR } else { ShiftType::LSL };
    let shifted = emit_imm_shift(&mut v.ir, m, shift_type, imm5, Value::ImmU1(false)).result;

    let (bottom_src, top_src) = if tb { (shifted, n) } else { (n, shifted) };
    let bottom = v.ir.ir().and_32(bottom_src, Value::ImmU32(0x0000_FFFF));
    let top = v.ir.ir().and_32(top_src, Value::ImmU32(0xFFFF_0000));
    let result = v.ir.ir().or_32(bottom, top);
    v.ir.set_register(rd, result);
    true
}
