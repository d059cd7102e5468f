use crate::frontend::a32::types::Reg;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;

use super::ArmVisitor;

fn sign_extend(value: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

/// Branch offset for the T1 BL / T2 BLX encodings: S, J1 and J2 fold into
/// the top bits of the 25-bit offset.
fn bl_offset(v: &ArmVisitor<'_>) -> u32 {
    let s = v.field('S');
    let j1 = v.field('j');
    let j2 = v.field('k');
    let imm = v.field('v'); // imm10:imm11
    let i1 = !(j1 ^ s) & 1;
    let i2 = !(j2 ^ s) & 1;
    sign_extend((s << 24) | (i1 << 23) | (i2 << 22) | (imm << 1), 25)
}

/// BL (T1): call staying in Thumb state.
pub fn t32_bl(v: &mut ArmVisitor<'_>) -> bool {
    let offset = bl_offset(v);
    let target = v.ir.pc().wrapping_add(4).wrapping_add(offset);
    // 32-bit encoding: the return address is two halfwords on.
    let return_location = v.ir.current_location.advance_pc(4);

    v.ir.push_rsb(return_location);
    v.ir.set_register(Reg::LR, Value::ImmU32(return_location.pc() | 1));
    let next = v.ir.current_location.set_pc(target & !1);
    v.ir.set_term(Terminal::link_block(next.to_location()));
    false
}

/// BLX (T2): call an ARM-state target.
pub fn t32_blx(v: &mut ArmVisitor<'_>) -> bool {
    if v.field('v') & 1 != 0 {
        // H bit set is UNDEFINED for BLX.
        return v.undefined();
    }
    let offset = bl_offset(v);
    let base = v.ir.pc().wrapping_add(4) & !3;
    let target = base.wrapping_add(offset) & !3;
    let return_location = v.ir.current_location.advance_pc(4);

    v.ir.push_rsb(return_location);
    v.ir.set_register(Reg::LR, Value::ImmU32(return_location.pc() | 1));

    let next = v.ir.current_location.set_pc(target).set_t_flag(false);
    v.ir.update_upper_location_descriptor(next.upper_location_descriptor());
    v.ir.set_term(Terminal::link_block(next.to_location()));
    false
}
