use crate::frontend::a32::it_state::ItState;
use crate::frontend::a32::types::{Reg, ShiftType};
use crate::ir::cond::Cond;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;
use crate::jit_config::ExceptionKind;

use super::helpers::{emit_imm_shift, emit_reg_shift};
use super::{emit_bx_and_terminal, ArmVisitor};

fn sign_extend(value: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

/// Thumb data-processing instructions outside an IT block set flags;
/// inside one they do not.
fn sets_flags(v: &ArmVisitor<'_>) -> bool {
    !v.ir.current_location.it().is_in_it_block()
}

fn set_nz(v: &mut ArmVisitor<'_>, result: Value) {
    if sets_flags(v) {
        v.ir.set_nz_flags(result);
    }
}

// --- Shift (immediate), add, subtract, move and compare ---

fn t16_shift_imm(v: &mut ArmVisitor<'_>, shift_type: ShiftType) -> bool {
    let rd = v.reg('d');
    let rm = v.reg('m');
    let imm5 = v.field('v');
    let carry_in = v.ir.get_c_flag();
    let m = v.ir.get_register(rm);
    let shifted = emit_imm_shift(&mut v.ir, m, shift_type, imm5, carry_in);
    if sets_flags(v) {
        v.ir.set_nz_flags(shifted.result);
        v.ir.set_c_flag(shifted.carry);
    }
    v.ir.set_register(rd, shifted.result);
    true
}

pub fn t16_lsl_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_shift_imm(v, ShiftType::LSL)
}

pub fn t16_lsr_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_shift_imm(v, ShiftType::LSR)
}

pub fn t16_asr_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_shift_imm(v, ShiftType::ASR)
}

pub fn t16_add_reg(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rn, rm) = (v.reg('d'), v.reg('n'), v.reg('m'));
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().add_32(n, m, Value::ImmU1(false));
    if sets_flags(v) {
        v.ir.set_nzcv_from_op(result);
    }
    v.ir.set_register(rd, result);
    true
}

pub fn t16_sub_reg(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rn, rm) = (v.reg('d'), v.reg('n'), v.reg('m'));
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().sub_32(n, m, Value::ImmU1(true));
    if sets_flags(v) {
        v.ir.set_nzcv_from_op(result);
    }
    v.ir.set_register(rd, result);
    true
}

pub fn t16_add_imm3(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rn) = (v.reg('d'), v.reg('n'));
    let imm = v.field('v');
    let n = v.ir.get_register(rn);
    let result = v.ir.ir().add_32(n, Value::ImmU32(imm), Value::ImmU1(false));
    if sets_flags(v) {
        v.ir.set_nzcv_from_op(result);
    }
    v.ir.set_register(rd, result);
    true
}

pub fn t16_sub_imm3(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rn) = (v.reg('d'), v.reg('n'));
    let imm = v.field('v');
    let n = v.ir.get_register(rn);
    let result = v.ir.ir().sub_32(n, Value::ImmU32(imm), Value::ImmU1(true));
    if sets_flags(v) {
        v.ir.set_nzcv_from_op(result);
    }
    v.ir.set_register(rd, result);
    true
}

pub fn t16_mov_imm(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    let imm = Value::ImmU32(v.field('v'));
    set_nz(v, imm);
    v.ir.set_register(rd, imm);
    true
}

pub fn t16_cmp_imm(v: &mut ArmVisitor<'_>) -> bool {
    let rn = v.reg('n');
    let imm = v.field('v');
    let n = v.ir.get_register(rn);
    let result = v.ir.ir().sub_32(n, Value::ImmU32(imm), Value::ImmU1(true));
    v.ir.set_nzcv_from_op(result);
    true
}

pub fn t16_add_imm8(v: &mut ArmVisitor<'_>) -> bool {
    let rdn = v.reg('d');
    let imm = v.field('v');
    let n = v.ir.get_register(rdn);
    let result = v.ir.ir().add_32(n, Value::ImmU32(imm), Value::ImmU1(false));
    if sets_flags(v) {
        v.ir.set_nzcv_from_op(result);
    }
    v.ir.set_register(rdn, result);
    true
}

pub fn t16_sub_imm8(v: &mut ArmVisitor<'_>) -> bool {
    let rdn = v.reg('d');
    let imm = v.field('v');
    let n = v.ir.get_register(rdn);
    let result = v.ir.ir().sub_32(n, Value::ImmU32(imm), Value::ImmU1(true));
    if sets_flags(v) {
        v.ir.set_nzcv_from_op(result);
    }
    v.ir.set_register(rdn, result);
    true
}

// --- Data-processing (register) ---

pub fn t16_alu(v: &mut ArmVisitor<'_>) -> bool {
    let rdn = v.reg('d');
    let rm = v.reg('m');
    let op = v.field('o');

    let d = v.ir.get_register(rdn);
    let m = v.ir.get_register(rm);
    let s = sets_flags(v);

    match op {
        0b0000 => {
            let result = v.ir.ir().and_32(d, m);
            set_nz(v, result);
            v.ir.set_register(rdn, result);
        }
        0b0001 => {
            let result = v.ir.ir().eor_32(d, m);
            set_nz(v, result);
            v.ir.set_register(rdn, result);
        }
        0b0010 | 0b0011 | 0b0100 | 0b0111 => {
            let shift_type = match op {
                0b0010 => ShiftType::LSL,
                0b0011 => ShiftType::LSR,
                0b0100 => ShiftType::ASR,
                _ => ShiftType::ROR,
            };
            let carry_in = v.ir.get_c_flag();
            let shifted = emit_reg_shift(&mut v.ir, d, shift_type, m, carry_in);
            if s {
                v.ir.set_nz_flags(shifted.result);
                v.ir.set_c_flag(shifted.carry);
            }
            v.ir.set_register(rdn, shifted.result);
        }
        0b0101 => {
            let c = v.ir.get_c_flag();
            let result = v.ir.ir().add_32(d, m, c);
            if s {
                v.ir.set_nzcv_from_op(result);
            }
            v.ir.set_register(rdn, result);
        }
        0b0110 => {
            let c = v.ir.get_c_flag();
            let result = v.ir.ir().sub_32(d, m, c);
            if s {
                v.ir.set_nzcv_from_op(result);
            }
            v.ir.set_register(rdn, result);
        }
        0b1000 => {
            let result = v.ir.ir().and_32(d, m);
            v.ir.set_nz_flags(result);
        }
        0b1001 => {
            let result = v.ir.ir().sub_32(Value::ImmU32(0), m, Value::ImmU1(true));
            if s {
                v.ir.set_nzcv_from_op(result);
            }
            v.ir.set_register(rdn, result);
        }
        0b1010 => {
            let result = v.ir.ir().sub_32(d, m, Value::ImmU1(true));
            v.ir.set_nzcv_from_op(result);
        }
        0b1011 => {
            let result = v.ir.ir().add_32(d, m, Value::ImmU1(false));
            v.ir.set_nzcv_from_op(result);
        }
        0b1100 => {
            let result = v.ir.ir().or_32(d, m);
            set_nz(v, result);
            v.ir.set_register(rdn, result);
        }
        0b1101 => {
            let result = v.ir.ir().mul_32(d, m);
            set_nz(v, result);
            v.ir.set_register(rdn, result);
        }
        0b1110 => {
            let not_m = v.ir.ir().not_32(m);
            let result = v.ir.ir().and_32(d, not_m);
            set_nz(v, result);
            v.ir.set_register(rdn, result);
        }
        _ => {
            let result = v.ir.ir().not_32(m);
            set_nz(v, result);
            v.ir.set_register(rdn, result);
        }
    }
    true
}

// --- Special data (high registers) and branch/exchange ---

fn hi_reg(base: u32, ext: u32) -> Reg {
    Reg::from_u32((ext << 3) | base)
}

pub fn t16_add_hi(v: &mut ArmVisitor<'_>) -> bool {
    let rdn = hi_reg(v.field('d'), v.field('D'));
    let rm = Reg::from_u32(v.field('m'));
    let d = v.ir.get_register(rdn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().add_32(d, m, Value::ImmU1(false));
    if rdn == Reg::R15 {
        v.ir.branch_write_pc(result);
        v.ir.set_term(Terminal::FastDispatchHint);
        return false;
    }
    v.ir.set_register(rdn, result);
    true
}

pub fn t16_cmp_hi(v: &mut ArmVisitor<'_>) -> bool {
    let rn = hi_reg(v.field('n'), v.field('N'));
    let rm = Reg::from_u32(v.field('m'));
    if rn == Reg::R15 || rm == Reg::R15 {
        return v.unpredictable();
    }
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().sub_32(n, m, Value::ImmU1(true));
    v.ir.set_nzcv_from_op(result);
    true
}

pub fn t16_mov_hi(v: &mut ArmVisitor<'_>) -> bool {
    let rd = hi_reg(v.field('d'), v.field('D'));
    let rm = Reg::from_u32(v.field('m'));
    let m = v.ir.get_register(rm);
    if rd == Reg::R15 {
        v.ir.branch_write_pc(m);
        let term = if rm == Reg::LR {
            Terminal::PopRSBHint
        } else {
            Terminal::FastDispatchHint
        };
        v.ir.set_term(term);
        return false;
    }
    v.ir.set_register(rd, m);
    true
}

pub fn t16_bx(v: &mut ArmVisitor<'_>) -> bool {
    let rm = Reg::from_u32(v.field('m'));
    let target = v.ir.get_register(rm);
    emit_bx_and_terminal(v, target, rm == Reg::LR)
}

pub fn t16_blx_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rm = Reg::from_u32(v.field('m'));
    if rm == Reg::R15 {
        return v.unpredictable();
    }
    let return_location = v.next_location();
    let target = v.ir.get_register(rm);
    v.ir.push_rsb(return_location);
    v.ir.set_register(Reg::LR, Value::ImmU32(return_location.pc() | 1));
    emit_bx_and_terminal(v, target, false)
}

// --- Load/store ---

pub fn t16_ldr_lit(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    let imm = v.field('v') * 4;
    let base = (v.ir.pc().wrapping_add(4)) & !3;
    let data = v.ir.read_memory_32(Value::ImmU32(base.wrapping_add(imm)));
    v.ir.set_register(rt, data);
    true
}

pub fn t16_ldr_str_reg(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    let rn = v.reg('n');
    let rm = v.reg('m');
    let op = v.field('o');

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let address = v.ir.ir().add_32(n, m, Value::ImmU1(false));

    match op {
        0b000 => {
            let value = v.ir.get_register(rt);
            v.ir.write_memory_32(address, value);
        }
        0b001 => {
            let value = v.ir.get_register(rt);
            let half = v.ir.ir().least_significant_half(value);
            v.ir.write_memory_16(address, half);
        }
        0b010 => {
            let value = v.ir.get_register(rt);
            let byte = v.ir.ir().least_significant_byte(value);
            v.ir.write_memory_8(address, byte);
        }
        0b011 => {
            let byte = v.ir.read_memory_8(address);
            let value = v.ir.ir().sign_extend_byte_to_word(byte);
            v.ir.set_register(rt, value);
        }
        0b100 => {
            let value = v.ir.read_memory_32(address);
            v.ir.set_register(rt, value);
        }
        0b101 => {
            let half = v.ir.read_memory_16(address);
            let value = v.ir.ir().zero_extend_half_to_word(half);
            v.ir.set_register(rt, value);
        }
        0b110 => {
            let byte = v.ir.read_memory_8(address);
            let value = v.ir.ir().zero_extend_byte_to_word(byte);
            v.ir.set_register(rt, value);
        }
        _ => {
            let half = v.ir.read_memory_16(address);
            let value = v.ir.ir().sign_extend_half_to_word(half);
            v.ir.set_register(rt, value);
        }
    }
    true
}

fn t16_ldr_str_imm(v: &mut ArmVisitor<'_>, scale: u32, load: bool, size: u32) -> bool {
    let rt = v.reg('t');
    let rn = v.reg('n');
    let imm = v.field('v') * scale;
    let n = v.ir.get_register(rn);
    let address = v.ir.ir().add_32(n, Value::ImmU32(imm), Value::ImmU1(false));

    if load {
        let value = match size {
            8 => {
                let b = v.ir.read_memory_8(address);
                v.ir.ir().zero_extend_byte_to_word(b)
            }
            16 => {
                let h = v.ir.read_memory_16(address);
                v.ir.ir().zero_extend_half_to_word(h)
            }
            _ => v.ir.read_memory_32(address),
        };
        v.ir.set_register(rt, value);
    } else {
        let value = v.ir.get_register(rt);
        match size {
            8 => {
                let b = v.ir.ir().least_significant_byte(value);
                v.ir.write_memory_8(address, b);
            }
            16 => {
                let h = v.ir.ir().least_significant_half(value);
                v.ir.write_memory_16(address, h);
            }
            _ => v.ir.write_memory_32(address, value),
        }
    }
    true
}

pub fn t16_str_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_ldr_str_imm(v, 4, false, 32)
}

pub fn t16_ldr_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_ldr_str_imm(v, 4, true, 32)
}

pub fn t16_strb_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_ldr_str_imm(v, 1, false, 8)
}

pub fn t16_ldrb_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_ldr_str_imm(v, 1, true, 8)
}

pub fn t16_strh_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_ldr_str_imm(v, 2, false, 16)
}

pub fn t16_ldrh_imm(v: &mut ArmVisitor<'_>) -> bool {
    t16_ldr_str_imm(v, 2, true, 16)
}

pub fn t16_str_sp(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    let imm = v.field('v') * 4;
    let sp = v.ir.get_register(Reg::SP);
    let address = v.ir.ir().add_32(sp, Value::ImmU32(imm), Value::ImmU1(false));
    let value = v.ir.get_register(rt);
    v.ir.write_memory_32(address, value);
    true
}

pub fn t16_ldr_sp(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    let imm = v.field('v') * 4;
    let sp = v.ir.get_register(Reg::SP);
    let address = v.ir.ir().add_32(sp, Value::ImmU32(imm), Value::ImmU1(false));
    let value = v.ir.read_memory_32(address);
    v.ir.set_register(rt, value);
    true
}

// --- Address generation and SP adjustment ---

pub fn t16_adr(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    let imm = v.field('v') * 4;
    let base = (v.ir.pc().wrapping_add(4)) & !3;
    v.ir.set_register(rd, Value::ImmU32(base.wrapping_add(imm)));
    true
}

pub fn t16_add_sp_imm8(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    let imm = v.field('v') * 4;
    let sp = v.ir.get_register(Reg::SP);
    let result = v.ir.ir().add_32(sp, Value::ImmU32(imm), Value::ImmU1(false));
    v.ir.set_register(rd, result);
    true
}

pub fn t16_add_sp(v: &mut ArmVisitor<'_>) -> bool {
    let imm = v.field('v') * 4;
    let sp = v.ir.get_register(Reg::SP);
    let result = v.ir.ir().add_32(sp, Value::ImmU32(imm), Value::ImmU1(false));
    v.ir.set_register(Reg::SP, result);
    true
}

pub fn t16_sub_sp(v: &mut ArmVisitor<'_>) -> bool {
    let imm = v.field('v') * 4;
    let sp = v.ir.get_register(Reg::SP);
    let result = v.ir.ir().sub_32(sp, Value::ImmU32(imm), Value::ImmU1(true));
    v.ir.set_register(Reg::SP, result);
    true
}

// --- Extension and reversal ---

fn t16_extend(v: &mut ArmVisitor<'_>, half: bool, signed: bool) -> bool {
    let rd = v.reg('d');
    let rm = v.reg('m');
    let m = v.ir.get_register(rm);
    let result = match (half, signed) {
        (true, true) => {
            let h = v.ir.ir().least_significant_half(m);
            v.ir.ir().sign_extend_half_to_word(h)
        }
        (true, false) => {
            let h = v.ir.ir().least_significant_half(m);
            v.ir.ir().zero_extend_half_to_word(h)
        }
        (false, true) => {
            let b = v.ir.ir().least_significant_byte(m);
            v.ir.ir().sign_extend_byte_to_word(b)
        }
        (false, false) => {
            let b = v.ir.ir().least_significant_byte(m);
            v.ir.ir().zero_extend_byte_to_word(b)
        }
    };
    v.ir.set_register(rd, result);
    true
}

pub fn t16_sxth(v: &mut ArmVisitor<'_>) -> bool {
    t16_extend(v, true, true)
}

pub fn t16_sxtb(v: &mut ArmVisitor<'_>) -> bool {
    t16_extend(v, false, true)
}

pub fn t16_uxth(v: &mut ArmVisitor<'_>) -> bool {
    t16_extend(v, true, false)
}

pub fn t16_uxtb(v: &mut ArmVisitor<'_>) -> bool {
    t16_extend(v, false, false)
}

pub fn t16_rev(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    let rm = v.reg('m');
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().byte_reverse_word(m);
    v.ir.set_register(rd, result);
    true
}

pub fn t16_rev16(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    let rm = v.reg('m');
    let m = v.ir.get_register(rm);
    let low_bytes = v.ir.ir().and_32(m, Value::ImmU32(0x00FF_00FF));
    let up = v
        .ir
        .ir()
        .logical_shift_left_32(low_bytes, Value::ImmU8(8), Value::ImmU1(false))
        .result;
    let down_raw = v
        .ir
        .ir()
        .logical_shift_right_32(m, Value::ImmU8(8), Value::ImmU1(false))
        .result;
    let down = v.ir.ir().and_32(down_raw, Value::ImmU32(0x00FF_00FF));
    let result = v.ir.ir().or_32(up, down);
    v.ir.set_register(rd, result);
    true
}

pub fn t16_revsh(v: &mut ArmVisitor<'_>) -> bool {
    let rd = v.reg('d');
    let rm = v.reg('m');
    let m = v.ir.get_register(rm);
    let half = v.ir.ir().least_significant_half(m);
    let swapped = v.ir.ir().byte_reverse_half(half);
    let result = v.ir.ir().sign_extend_half_to_word(swapped);
    v.ir.set_register(rd, result);
    true
}

// --- Stack and multiple transfers ---

pub fn t16_push(v: &mut ArmVisitor<'_>) -> bool {
    let mut list = v.field('r');
    if v.field('R') != 0 {
        list |= 1 << 14;
    }
    let count = list.count_ones();
    if count == 0 {
        return v.unpredictable();
    }

    let sp = v.ir.get_register(Reg::SP);
    let new_sp = v.ir.ir().sub_32(sp, Value::ImmU32(count * 4), Value::ImmU1(true));
    let mut address = new_sp;
    for i in 0..16 {
        if list & (1 << i) == 0 {
            continue;
        }
        let value = v.ir.get_register(Reg::from_u32(i));
        v.ir.write_memory_32(address, value);
        address = v.ir.ir().add_32(address, Value::ImmU32(4), Value::ImmU1(false));
    }
    v.ir.set_register(Reg::SP, new_sp);
    true
}

pub fn t16_pop(v: &mut ArmVisitor<'_>) -> bool {
    let mut list = v.field('r');
    if v.field('R') != 0 {
        list |= 1 << 15;
    }
    let count = list.count_ones();
    if count == 0 {
        return v.unpredictable();
    }

    let sp = v.ir.get_register(Reg::SP);
    let mut address = sp;
    let mut pc_value = None;
    for i in 0..16 {
        if list & (1 << i) == 0 {
            continue;
        }
        let value = v.ir.read_memory_32(address);
        if i == 15 {
            pc_value = Some(value);
        } else {
            v.ir.set_register(Reg::from_u32(i), value);
        }
        address = v.ir.ir().add_32(address, Value::ImmU32(4), Value::ImmU1(false));
    }
    let new_sp = v.ir.ir().add_32(sp, Value::ImmU32(count * 4), Value::ImmU1(false));
    v.ir.set_register(Reg::SP, new_sp);

    if let Some(value) = pc_value {
        v.ir.bx_write_pc(value);
        v.ir.set_term(Terminal::PopRSBHint);
        return false;
    }
    true
}

pub fn t16_stm(v: &mut ArmVisitor<'_>) -> bool {
    let rn = v.reg('n');
    let list = v.field('r');
    let count = list.count_ones();
    if count == 0 {
        return v.unpredictable();
    }

    let base = v.ir.get_register(rn);
    let mut address = base;
    for i in 0..8 {
        if list & (1 << i) == 0 {
            continue;
        }
        let value = v.ir.get_register(Reg::from_u32(i));
        v.ir.write_memory_32(address, value);
        address = v.ir.ir().add_32(address, Value::ImmU32(4), Value::ImmU1(false));
    }
    let new_base = v.ir.ir().add_32(base, Value::ImmU32(count * 4), Value::ImmU1(false));
    v.ir.set_register(rn, new_base);
    true
}

pub fn t16_ldm(v: &mut ArmVisitor<'_>) -> bool {
    let rn = v.reg('n');
    let list = v.field('r');
    let count = list.count_ones();
    if count == 0 {
        return v.unpredictable();
    }
    let writeback = list & (1 << rn.number()) == 0;

    let base = v.ir.get_register(rn);
    let mut address = base;
    for i in 0..8 {
        if list & (1 << i) == 0 {
            continue;
        }
        let value = v.ir.read_memory_32(address);
        v.ir.set_register(Reg::from_u32(i), value);
        address = v.ir.ir().add_32(address, Value::ImmU32(4), Value::ImmU1(false));
    }
    if writeback {
        let new_base = v.ir.ir().add_32(base, Value::ImmU32(count * 4), Value::ImmU1(false));
        v.ir.set_register(rn, new_base);
    }
    true
}

// --- Hints, IT, exceptions and branches ---

pub fn t16_hint(v: &mut ArmVisitor<'_>) -> bool {
    if !v.options.hook_hint_instructions {
        return true;
    }
    match v.field('v') {
        0b0001 => v.raise_exception(ExceptionKind::Yield),
        0b0010 => v.raise_exception(ExceptionKind::WaitForEvent),
        0b0011 => v.raise_exception(ExceptionKind::WaitForInterrupt),
        0b0100 => v.raise_exception(ExceptionKind::SendEvent),
        _ => true,
    }
}

pub fn t16_it(v: &mut ArmVisitor<'_>) -> bool {
    let it_value = ((v.field('c') << 4) | v.field('m')) as u8;
    if v.ir.current_location.it().is_in_it_block() {
        return v.unpredictable();
    }
    v.new_it_state = Some(ItState::new(it_value));
    true
}

pub fn t16_bkpt(v: &mut ArmVisitor<'_>) -> bool {
    v.raise_exception(ExceptionKind::Breakpoint)
}

pub fn t16_udf(v: &mut ArmVisitor<'_>) -> bool {
    v.undefined()
}

pub fn t16_svc(v: &mut ArmVisitor<'_>) -> bool {
    let imm = v.field('v');
    v.ir.call_supervisor(Value::ImmU32(imm));
    let next = v.next_location();
    v.ir.set_term(Terminal::check_halt(Terminal::link_block_fast(next.to_location())));
    false
}

pub fn t16_b_cond(v: &mut ArmVisitor<'_>) -> bool {
    let cond = Cond::from_u8(v.field('c') as u8);
    if cond == Cond::AL || cond == Cond::NV {
        return v.undefined();
    }
    let offset = sign_extend(v.field('v') << 1, 9);
    let target = v.ir.pc().wrapping_add(4).wrapping_add(offset);
    let loc = v.ir.current_location;
    let then_ = Terminal::link_block(loc.set_pc(target).to_location());
    let else_ = Terminal::link_block(v.next_location().to_location());
    v.ir.set_term(Terminal::if_then_else(cond, then_, else_));
    false
}

pub fn t16_b(v: &mut ArmVisitor<'_>) -> bool {
    let offset = sign_extend(v.field('v') << 1, 12);
    let target = v.ir.pc().wrapping_add(4).wrapping_add(offset);
    let next = v.ir.current_location.set_pc(target);
    v.ir.set_term(Terminal::link_block(next.to_location()));
    false
}
