use crate::frontend::a32::types::{Reg, ShiftType};
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;

use super::helpers::emit_imm_shift;
use super::ArmVisitor;

struct Address {
    address: Value,
    writeback: Option<Value>,
}

/// Compute the effective address and optional writeback value for the
/// P/U/W indexing modes shared by every load/store encoding.
fn emit_address(v: &mut ArmVisitor<'_>, offset: Value) -> Address {
    let p = v.field('p') != 0;
    let u = v.field('u') != 0;
    let w = v.field('w') != 0;
    let rn = v.reg('n');

    let base = v.ir.get_register(rn);
    let offset_applied = if u {
        v.ir.ir().add_32(base, offset, Value::ImmU1(false))
    } else {
        v.ir.ir().sub_32(base, offset, Value::ImmU1(true))
    };
    let address = if p { offset_applied } else { base };
    let writeback = (w || !p).then_some(offset_applied);
    Address { address, writeback }
}

fn writeback(v: &mut ArmVisitor<'_>, addr: &Address) {
    if let Some(value) = addr.writeback {
        v.ir.set_register(v.reg('n'), value);
    }
}

fn check_writeback_sanity(v: &mut ArmVisitor<'_>, rt: Reg) -> bool {
    let p = v.field('p') != 0;
    let w = v.field('w') != 0;
    let rn = v.reg('n');
    if (w || !p) && (rn == Reg::R15 || rn == rt) {
        return v.unpredictable();
    }
    true
}

#[derive(Clone, Copy)]
enum LoadKind {
    Word,
    Byte,
    Half,
    SignedByte,
    SignedHalf,
}

fn emit_load(v: &mut ArmVisitor<'_>, kind: LoadKind, offset: Value) -> bool {
    let rt = v.reg('t');
    if !check_writeback_sanity(v, rt) {
        return false;
    }

    let addr = emit_address(v, offset);
    let data = match kind {
        LoadKind::Word => v.ir.read_memory_32(addr.address),
        LoadKind::Byte => {
            let byte = v.ir.read_memory_8(addr.address);
            v.ir.ir().zero_extend_byte_to_word(byte)
        }
        LoadKind::Half => {
            let half = v.ir.read_memory_16(addr.address);
            v.ir.ir().zero_extend_half_to_word(half)
        }
        LoadKind::SignedByte => {
            let byte = v.ir.read_memory_8(addr.address);
            v.ir.ir().sign_extend_byte_to_word(byte)
        }
        LoadKind::SignedHalf => {
            let half = v.ir.read_memory_16(addr.address);
            v.ir.ir().sign_extend_half_to_word(half)
        }
    };
    writeback(v, &addr);

    if rt == Reg::R15 {
        if !matches!(kind, LoadKind::Word) {
            return v.unpredictable();
        }
        v.ir.bx_write_pc(data);
        v.ir.set_term(Terminal::PopRSBHint);
        return false;
    }

    v.ir.set_register(rt, data);
    true
}

fn emit_store(v: &mut ArmVisitor<'_>, kind: LoadKind, offset: Value) -> bool {
    let rt = v.reg('t');
    if !check_writeback_sanity(v, rt) {
        return false;
    }

    let addr = emit_address(v, offset);
    let value = v.ir.get_register(rt);
    match kind {
        LoadKind::Word => v.ir.write_memory_32(addr.address, value),
        LoadKind::Byte | LoadKind::SignedByte => {
            let byte = v.ir.ir().least_significant_byte(value);
            v.ir.write_memory_8(addr.address, byte);
        }
        LoadKind::Half | LoadKind::SignedHalf => {
            let half = v.ir.ir().least_significant_half(value);
            v.ir.write_memory_16(addr.address, half);
        }
    }
    writeback(v, &addr);
    true
}

fn reg_offset(v: &mut ArmVisitor<'_>) -> Value {
    let rm = v.reg('m');
    let shift_type = ShiftType::from_u8(v.field('s') as u8);
    let imm5 = v.field('v');
    let carry_in = v.ir.get_c_flag();
    let rm_val = v.ir.get_register(rm);
    emit_imm_shift(&mut v.ir, rm_val, shift_type, imm5, carry_in).result
}

// --- Word and byte ---

pub fn arm_ldr_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_load(v, LoadKind::Word, offset)
}

pub fn arm_ldr_reg(v: &mut ArmVisitor<'_>) -> bool {
    let offset = reg_offset(v);
    emit_load(v, LoadKind::Word, offset)
}

pub fn arm_str_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_store(v, LoadKind::Word, offset)
}

pub fn arm_str_reg(v: &mut ArmVisitor<'_>) -> bool {
    let offset = reg_offset(v);
    emit_store(v, LoadKind::Word, offset)
}

pub fn arm_ldrb_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_load(v, LoadKind::Byte, offset)
}

pub fn arm_ldrb_reg(v: &mut ArmVisitor<'_>) -> bool {
    let offset = reg_offset(v);
    emit_load(v, LoadKind::Byte, offset)
}

pub fn arm_strb_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_store(v, LoadKind::Byte, offset)
}

pub fn arm_strb_reg(v: &mut ArmVisitor<'_>) -> bool {
    let offset = reg_offset(v);
    emit_store(v, LoadKind::Byte, offset)
}

// --- Halfword and signed forms (the "extra" encodings) ---

pub fn arm_ldrh_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_load(v, LoadKind::Half, offset)
}

pub fn arm_ldrh_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let offset = v.ir.get_register(rm);
    emit_load(v, LoadKind::Half, offset)
}

pub fn arm_strh_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_store(v, LoadKind::Half, offset)
}

pub fn arm_strh_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let offset = v.ir.get_register(rm);
    emit_store(v, LoadKind::Half, offset)
}

pub fn arm_ldrsb_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_load(v, LoadKind::SignedByte, offset)
}

pub fn arm_ldrsb_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let offset = v.ir.get_register(rm);
    emit_load(v, LoadKind::SignedByte, offset)
}

pub fn arm_ldrsh_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_load(v, LoadKind::SignedHalf, offset)
}

pub fn arm_ldrsh_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let offset = v.ir.get_register(rm);
    emit_load(v, LoadKind::SignedHalf, offset)
}

// --- Doubleword ---

pub fn arm_ldrd_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_load_dual(v, offset)
}

pub fn arm_ldrd_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let offset = v.ir.get_register(rm);
    emit_load_dual(v, offset)
}

pub fn arm_strd_imm(v: &mut ArmVisitor<'_>) -> bool {
    let offset = Value::ImmU32(v.field('v'));
    emit_store_dual(v, offset)
}

pub fn arm_strd_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = v.reg('m');
    let offset = v.ir.get_register(rm);
    emit_store_dual(v, offset)
}

fn dual_regs(v: &mut ArmVisitor<'_>) -> Option<(Reg, Reg)> {
    let rt = v.reg('t');
    let t = rt.number();
    if t % 2 != 0 || t == 14 {
        return None;
    }
    Some((rt, Reg::from_u32(t as u32 + 1)))
}

fn emit_load_dual(v: &mut ArmVisitor<'_>, offset: Value) -> bool {
    let Some((rt, rt2)) = dual_regs(v) else {
        return v.unpredictable();
    };
    if !check_writeback_sanity(v, rt) {
        return false;
    }

    let addr = emit_address(v, offset);
    let lo = v.ir.read_memory_32(addr.address);
    let hi_addr = v.ir.ir().add_32(addr.address, Value::ImmU32(4), Value::ImmU1(false));
    let hi = v.ir.read_memory_32(hi_addr);
    writeback(v, &addr);
    v.ir.set_register(rt, lo);
    v.ir.set_register(rt2, hi);
    true
}

fn emit_store_dual(v: &mut ArmVisitor<'_>, offset: Value) -> bool {
    let Some((rt, rt2)) = dual_regs(v) else {
        return v.unpredictable();
    };
    if !check_writeback_sanity(v, rt) {
        return false;
    }

    let addr = emit_address(v, offset);
    let lo = v.ir.get_register(rt);
    let hi = v.ir.get_register(rt2);
    v.ir.write_memory_32(addr.address, lo);
    let hi_addr = v.ir.ir().add_32(addr.address, Value::ImmU32(4), Value::ImmU1(false));
    v.ir.write_memory_32(hi_addr, hi);
    writeback(v, &addr);
    true
}
