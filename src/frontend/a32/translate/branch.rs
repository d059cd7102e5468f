use crate::frontend::a32::types::Reg;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;

use super::{emit_bx_and_terminal, ArmVisitor};

fn sign_extend(value: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

/// B: branch to a PC-relative target.
pub fn arm_b(v: &mut ArmVisitor<'_>) -> bool {
    let offset = sign_extend(v.field('v') << 2, 26);
    let target = v.ir.pc().wrapping_add(8).wrapping_add(offset);
    let next = v.ir.current_location.set_pc(target);
    v.ir.set_term(Terminal::link_block(next.to_location()));
    false
}

/// BL: branch with link.
pub fn arm_bl(v: &mut ArmVisitor<'_>) -> bool {
    let offset = sign_extend(v.field('v') << 2, 26);
    let target = v.ir.pc().wrapping_add(8).wrapping_add(offset);
    let return_location = v.next_location();

    v.ir.push_rsb(return_location);
    v.ir.set_register(Reg::LR, Value::ImmU32(return_location.pc()));
    let next = v.ir.current_location.set_pc(target);
    v.ir.set_term(Terminal::link_block(next.to_location()));
    false
}

/// BX: branch and exchange.
pub fn arm_bx(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let target = v.ir.get_register(rm);
    emit_bx_and_terminal(v, target, rm == Reg::LR)
}

/// BLX (register): call through a register, exchanging state.
pub fn arm_blx_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    if rm == Reg::R15 {
        return v.unpredictable();
    }
    let return_location = v.next_location();
    let target = v.ir.get_register(rm);

    v.ir.push_rsb(return_location);
    v.ir.set_register(Reg::LR, Value::ImmU32(return_location.pc()));
    emit_bx_and_terminal(v, target, false)
}

/// BLX (immediate): call a Thumb target from ARM state.
pub fn arm_blx_imm(v: &mut ArmVisitor<'_>) -> bool {
    let h = v.field('h');
    let offset = sign_extend(v.field('v') << 2, 26) | (h << 1);
    let target = v.ir.pc().wrapping_add(8).wrapping_add(offset);
    let return_location = v.next_location();

    v.ir.push_rsb(return_location);
    v.ir.set_register(Reg::LR, Value::ImmU32(return_location.pc()));

    let next = v.ir.current_location.set_pc(target & !1).set_t_flag(true);
    v.ir.update_upper_location_descriptor(next.upper_location_descriptor());
    v.ir.set_term(Terminal::link_block(next.to_location()));
    false
}
