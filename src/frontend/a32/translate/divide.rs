use crate::frontend::a32::types::Reg;

use super::ArmVisitor;

/// SDIV: signed division, rounding toward zero; division by zero yields
/// zero.
pub fn arm_sdiv(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if rd == Reg::R15 || rm == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().signed_div_32(n, m);
    v.ir.set_register(rd, result);
    true
}

/// UDIV: unsigned division; division by zero yields zero.
pub fn arm_udiv(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if rd == Reg::R15 || rm == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().unsigned_div_32(n, m);
    v.ir.set_register(rd, result);
    true
}
