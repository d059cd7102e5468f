use crate::frontend::a32::types::Reg;
use crate::ir::value::Value;

use super::ArmVisitor;

/// Expand a VFP 8-bit immediate to a single-precision bit pattern.
fn vfp_expand_imm32(imm8: u32) -> u32 {
    let sign = (imm8 >> 7) & 1;
    let b6 = (imm8 >> 6) & 1;
    let exp = if b6 != 0 { 0b0111_1100 | ((imm8 >> 4) & 3) } else { 0b1000_0000 | ((imm8 >> 4) & 3) };
    let frac = imm8 & 0xF;
    (sign << 31) | (exp << 23) | (frac << 19)
}

/// Expand a VFP 8-bit immediate to a double-precision bit pattern.
fn vfp_expand_imm64(imm8: u64) -> u64 {
    let sign = (imm8 >> 7) & 1;
    let b6 = (imm8 >> 6) & 1;
    let exp = if b6 != 0 { 0b011_1111_1100 | ((imm8 >> 4) & 3) } else { 0b100_0000_0000 | ((imm8 >> 4) & 3) };
    let frac = imm8 & 0xF;
    (sign << 63) | (exp << 52) | (frac << 48)
}

struct VfpRegs {
    double: bool,
}

impl VfpRegs {
    fn of(v: &ArmVisitor<'_>) -> Self {
        Self {
            double: v.field('z') != 0,
        }
    }

    fn d(&self, v: &mut ArmVisitor<'_>) -> crate::frontend::a32::types::ExtReg {
        v.vfp_reg(self.double, v.field('d'), v.field('D'))
    }

    fn n(&self, v: &mut ArmVisitor<'_>) -> crate::frontend::a32::types::ExtReg {
        v.vfp_reg(self.double, v.field('n'), v.field('N'))
    }

    fn m(&self, v: &mut ArmVisitor<'_>) -> crate::frontend::a32::types::ExtReg {
        v.vfp_reg(self.double, v.field('m'), v.field('M'))
    }

    fn read(&self, v: &mut ArmVisitor<'_>, reg: crate::frontend::a32::types::ExtReg) -> Value {
        if self.double {
            v.ir.get_extended_register_64(reg)
        } else {
            v.ir.get_extended_register_32(reg)
        }
    }

    fn write(&self, v: &mut ArmVisitor<'_>, reg: crate::frontend::a32::types::ExtReg, value: Value) {
        if self.double {
            v.ir.set_extended_register_64(reg, value);
        } else {
            v.ir.set_extended_register_32(reg, value);
        }
    }
}

type BinOp32 = fn(&mut crate::ir::emitter::IrEmitter<'_>, Value, Value) -> Value;

fn emit_vfp_binary(v: &mut ArmVisitor<'_>, op32: BinOp32, op64: BinOp32) -> bool {
    let regs = VfpRegs::of(v);
    let (vd, vn, vm) = (regs.d(v), regs.n(v), regs.m(v));
    let a = regs.read(v, vn);
    let b = regs.read(v, vm);
    let result = if regs.double {
        op64(v.ir.ir(), a, b)
    } else {
        op32(v.ir.ir(), a, b)
    };
    regs.write(v, vd, result);
    true
}

/// VADD.F32/F64.
pub fn vfp_vadd(v: &mut ArmVisitor<'_>) -> bool {
    emit_vfp_binary(v, |ir, a, b| ir.fp_add_32(a, b), |ir, a, b| ir.fp_add_64(a, b))
}

/// VSUB.F32/F64.
pub fn vfp_vsub(v: &mut ArmVisitor<'_>) -> bool {
    emit_vfp_binary(v, |ir, a, b| ir.fp_sub_32(a, b), |ir, a, b| ir.fp_sub_64(a, b))
}

/// VMUL.F32/F64.
pub fn vfp_vmul(v: &mut ArmVisitor<'_>) -> bool {
    emit_vfp_binary(v, |ir, a, b| ir.fp_mul_32(a, b), |ir, a, b| ir.fp_mul_64(a, b))
}

/// VDIV.F32/F64.
pub fn vfp_vdiv(v: &mut ArmVisitor<'_>) -> bool {
    emit_vfp_binary(v, |ir, a, b| ir.fp_div_32(a, b), |ir, a, b| ir.fp_div_64(a, b))
}

/// VMOV (immediate).
pub fn vfp_vmov_imm(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let vd = regs.d(v);
    let imm8 = v.field('v');
    let value = if regs.double {
        Value::ImmU64(vfp_expand_imm64(imm8 as u64))
    } else {
        Value::ImmU32(vfp_expand_imm32(imm8))
    };
    regs.write(v, vd, value);
    true
}

/// VMOV (register).
pub fn vfp_vmov_reg(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let (vd, vm) = (regs.d(v), regs.m(v));
    let value = regs.read(v, vm);
    regs.write(v, vd, value);
    true
}

/// VABS.
pub fn vfp_vabs(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let (vd, vm) = (regs.d(v), regs.m(v));
    let value = regs.read(v, vm);
    let result = if regs.double {
        v.ir.ir().fp_abs_64(value)
    } else {
        v.ir.ir().fp_abs_32(value)
    };
    regs.write(v, vd, result);
    true
}

/// VNEG.
pub fn vfp_vneg(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let (vd, vm) = (regs.d(v), regs.m(v));
    let value = regs.read(v, vm);
    let result = if regs.double {
        v.ir.ir().fp_neg_64(value)
    } else {
        v.ir.ir().fp_neg_32(value)
    };
    regs.write(v, vd, result);
    true
}

/// VSQRT.
pub fn vfp_vsqrt(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let (vd, vm) = (regs.d(v), regs.m(v));
    let value = regs.read(v, vm);
    let result = if regs.double {
        v.ir.ir().fp_sqrt_64(value)
    } else {
        v.ir.ir().fp_sqrt_32(value)
    };
    regs.write(v, vd, result);
    true
}

/// VCMP/VCMPE.
pub fn vfp_vcmp(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let (vd, vm) = (regs.d(v), regs.m(v));
    let signal_all_nans = v.field('e') != 0;
    let a = regs.read(v, vd);
    let b = regs.read(v, vm);
    let nzcv = if regs.double {
        v.ir.ir().fp_compare_64(a, b, signal_all_nans)
    } else {
        v.ir.ir().fp_compare_32(a, b, signal_all_nans)
    };
    v.ir.set_fpscr_nzcv(nzcv);
    true
}

/// VCMP/VCMPE with zero.
pub fn vfp_vcmp_zero(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let vd = regs.d(v);
    let signal_all_nans = v.field('e') != 0;
    let a = regs.read(v, vd);
    let nzcv = if regs.double {
        v.ir.ir().fp_compare_64(a, Value::ImmU64(0), signal_all_nans)
    } else {
        v.ir.ir().fp_compare_32(a, Value::ImmU32(0), signal_all_nans)
    };
    v.ir.set_fpscr_nzcv(nzcv);
    true
}

/// VMOV between a core register and a single-precision register.
pub fn vfp_vmov_core(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    if rt == Reg::R15 {
        return v.unpredictable();
    }
    let sn = v.vfp_reg(false, v.field('n'), v.field('N'));
    let to_core = v.field('o') != 0;
    if to_core {
        let value = v.ir.get_extended_register_32(sn);
        v.ir.set_register(rt, value);
    } else {
        let value = v.ir.get_register(rt);
        v.ir.set_extended_register_32(sn, value);
    }
    true
}

/// VMRS: read the FPSCR; `VMRS APSR_nzcv, FPSCR` copies into the CPSR
/// condition flags.
pub fn vfp_vmrs(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    if rt == Reg::R15 {
        let nzcv = v.ir.get_fpscr_nzcv();
        v.ir.set_cpsr_nzcv_raw(nzcv);
    } else {
        let fpscr = v.ir.get_fpscr();
        v.ir.set_register(rt, fpscr);
    }
    true
}

/// VMSR: write the FPSCR. A mode-bit change invalidates the current
/// translation context, so the block ends here.
pub fn vfp_vmsr(v: &mut ArmVisitor<'_>) -> bool {
    let rt = v.reg('t');
    if rt == Reg::R15 {
        return v.unpredictable();
    }
    let value = v.ir.get_register(rt);
    v.ir.set_fpscr(value);
    v.ir.set_term(crate::ir::terminal::Terminal::ReturnToDispatch);
    false
}

fn vfp_mem_base(v: &mut ArmVisitor<'_>) -> Value {
    let rn = v.reg('n');
    if rn == Reg::R15 {
        // Literal access: the base is the aligned PC.
        Value::ImmU32(v.ir.pc().wrapping_add(8) & !3)
    } else {
        v.ir.get_register(rn)
    }
}

/// VLDR.
pub fn vfp_vldr(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let vd = regs.d(v);
    let imm = v.field('v') * 4;
    let up = v.field('u') != 0;

    let base = vfp_mem_base(v);
    let address = if up {
        v.ir.ir().add_32(base, Value::ImmU32(imm), Value::ImmU1(false))
    } else {
        v.ir.ir().sub_32(base, Value::ImmU32(imm), Value::ImmU1(true))
    };
    let data = if regs.double {
        v.ir.read_memory_64(address)
    } else {
        v.ir.read_memory_32(address)
    };
    regs.write(v, vd, data);
    true
}

/// VSTR.
pub fn vfp_vstr(v: &mut ArmVisitor<'_>) -> bool {
    let regs = VfpRegs::of(v);
    let vd = regs.d(v);
    let imm = v.field('v') * 4;
    let up = v.field('u') != 0;

    let base = vfp_mem_base(v);
    let address = if up {
        v.ir.ir().add_32(base, Value::ImmU32(imm), Value::ImmU1(false))
    } else {
        v.ir.ir().sub_32(base, Value::ImmU32(imm), Value::ImmU1(true))
    };
    let data = regs.read(v, vd);
    if regs.double {
        v.ir.write_memory_64(address, data);
    } else {
        v.ir.write_memory_32(address, data);
    }
    true
}

/// VLDM: load multiple extension registers (covers VPOP).
pub fn vfp_vldm(v: &mut ArmVisitor<'_>) -> bool {
    emit_vfp_multiple(v, true)
}

/// VSTM: store multiple extension registers (covers VPUSH).
pub fn vfp_vstm(v: &mut ArmVisitor<'_>) -> bool {
    emit_vfp_multiple(v, false)
}

fn emit_vfp_multiple(v: &mut ArmVisitor<'_>, load: bool) -> bool {
    let regs = VfpRegs::of(v);
    let p = v.field('p') != 0;
    let u = v.field('u') != 0;
    let w = v.field('w') != 0;
    let rn = v.reg('n');
    let imm8 = v.field('v');
    let words = imm8;

    // Valid combinations: IA (p=0, u=1) and DB with writeback (p=1, u=0,
    // w=1). The p=1, w=0 space is VLDR/VSTR and never reaches here.
    match (p, u) {
        (false, true) | (true, false) => {}
        _ => return v.undefined(),
    }
    if rn == Reg::R15 && w {
        return v.unpredictable();
    }
    let count = if regs.double { imm8 / 2 } else { imm8 };
    if count == 0 {
        return v.unpredictable();
    }

    let vd = regs.d(v);
    let base = v.ir.get_register(rn);
    let mut address = if u {
        base
    } else {
        v.ir.ir().sub_32(base, Value::ImmU32(words * 4), Value::ImmU1(true))
    };
    let new_base = if u {
        v.ir.ir().add_32(base, Value::ImmU32(words * 4), Value::ImmU1(false))
    } else {
        v.ir.ir().sub_32(base, Value::ImmU32(words * 4), Value::ImmU1(true))
    };
    if w {
        v.ir.set_register(rn, new_base);
    }

    let step = if regs.double { 8 } else { 4 };
    for i in 0..count {
        let reg = vd.offset(i as usize);
        if load {
            let data = if regs.double {
                v.ir.read_memory_64(address)
            } else {
                v.ir.read_memory_32(address)
            };
            regs.write(v, reg, data);
        } else {
            let data = regs.read(v, reg);
            if regs.double {
                v.ir.write_memory_64(address, data);
            } else {
                v.ir.write_memory_32(address, data);
            }
        }
        address = v.ir.ir().add_32(address, Value::ImmU32(step), Value::ImmU1(false));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfp_expand_imm32() {
        // 1.0f: imm8 = 0b01110000.
        assert_eq!(vfp_expand_imm32(0x70), 1.0f32.to_bits());
        // -2.0f: imm8 = 0b10000000.
        assert_eq!(vfp_expand_imm32(0x80), (-2.0f32).to_bits());
    }

    #[test]
    fn test_vfp_expand_imm64() {
        assert_eq!(vfp_expand_imm64(0x70), 1.0f64.to_bits());
        assert_eq!(vfp_expand_imm64(0x80), (-2.0f64).to_bits());
    }
}
