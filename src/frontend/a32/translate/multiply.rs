use crate::frontend::a32::types::Reg;
use crate::ir::value::Value;

use super::ArmVisitor;

fn any_r15(regs: &[Reg]) -> bool {
    regs.contains(&Reg::R15)
}

/// MUL: Rd = Rn * Rm, optionally setting N and Z.
pub fn arm_mul(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if any_r15(&[rd, rm, rn]) {
        return v.unpredictable();
    }
    let s = v.field('S') != 0;

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().mul_32(n, m);
    if s {
        v.ir.set_nz_flags(result);
    }
    v.ir.set_register(rd, result);
    true
}

/// MLA: Rd = Ra + Rn * Rm.
pub fn arm_mla(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, ra, rm, rn) = (v.reg('d'), v.reg('a'), v.reg('m'), v.reg('n'));
    if any_r15(&[rd, ra, rm, rn]) {
        return v.unpredictable();
    }
    let s = v.field('S') != 0;

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let a = v.ir.get_register(ra);
    let product = v.ir.ir().mul_32(n, m);
    let result = v.ir.ir().add_32(product, a, Value::ImmU1(false));
    if s {
        v.ir.set_nz_flags(result);
    }
    v.ir.set_register(rd, result);
    true
}

/// MLS: Rd = Ra - Rn * Rm.
pub fn arm_mls(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, ra, rm, rn) = (v.reg('d'), v.reg('a'), v.reg('m'), v.reg('n'));
    if any_r15(&[rd, ra, rm, rn]) {
        return v.unpredictable();
    }

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let a = v.ir.get_register(ra);
    let product = v.ir.ir().mul_32(n, m);
    let result = v.ir.ir().sub_32(a, product, Value::ImmU1(true));
    v.ir.set_register(rd, result);
    true
}

enum LongKind {
    Unsigned,
    Signed,
}

fn emit_mull(v: &mut ArmVisitor<'_>, kind: LongKind, accumulate: bool) -> bool {
    let (rdhi, rdlo, rm, rn) = (v.reg('h'), v.reg('l'), v.reg('m'), v.reg('n'));
    if any_r15(&[rdhi, rdlo, rm, rn]) || rdhi == rdlo {
        return v.unpredictable();
    }
    let s = v.field('S') != 0;

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let (n64, m64) = match kind {
        LongKind::Unsigned => (
            v.ir.ir().zero_extend_word_to_long(n),
            v.ir.ir().zero_extend_word_to_long(m),
        ),
        LongKind::Signed => (
            v.ir.ir().sign_extend_word_to_long(n),
            v.ir.ir().sign_extend_word_to_long(m),
        ),
    };
    let mut product = v.ir.ir().mul_64(n64, m64);

    if accumulate {
        let acc_lo = v.ir.get_register(rdlo);
        let acc_hi = v.ir.get_register(rdhi);
        let acc = v.ir.ir().pack_2x32_to_1x64(acc_lo, acc_hi);
        // Mul64 followed by a 64-bit add; widths stay in the U64 domain.
        let lo = v.ir.ir().least_significant_word(product);
        let hi = v.ir.ir().most_significant_word(product);
        let acc_lo32 = v.ir.ir().least_significant_word(acc);
        let acc_hi32 = v.ir.ir().most_significant_word(acc);
        let sum_lo = v.ir.ir().add_32(lo, acc_lo32, Value::ImmU1(false));
        let carry = v.ir.ir().get_carry_from_op(sum_lo);
        let sum_hi = v.ir.ir().add_32(hi, acc_hi32, carry);
        product = v.ir.ir().pack_2x32_to_1x64(sum_lo, sum_hi);
    }

    let lo = v.ir.ir().least_significant_word(product);
    let hi = v.ir.ir().most_significant_word(product);
    if s {
        let n_flag = v.ir.ir().most_significant_bit(hi);
        v.ir.set_n_flag(n_flag);
        let joined = v.ir.ir().or_32(lo, hi);
        let z_flag = v.ir.ir().is_zero_32(joined);
        v.ir.set_z_flag(z_flag);
    }
    v.ir.set_register(rdlo, lo);
    v.ir.set_register(rdhi, hi);
    true
}

pub fn arm_umull(v: &mut ArmVisitor<'_>) -> bool {
    emit_mull(v, LongKind::Unsigned, false)
}

pub fn arm_umlal(v: &mut ArmVisitor<'_>) -> bool {
    emit_mull(v, LongKind::Unsigned, true)
}

pub fn arm_smull(v: &mut ArmVisitor<'_>) -> bool {
    emit_mull(v, LongKind::Signed, false)
}

pub fn arm_smlal(v: &mut ArmVisitor<'_>) -> bool {
    emit_mull(v, LongKind::Signed, true)
}

/// UMAAL: RdHi:RdLo = RdHi + RdLo + Rn * Rm (all unsigned).
pub fn arm_umaal(v: &mut ArmVisitor<'_>) -> bool {
    let (rdhi, rdlo, rm, rn) = (v.reg('h'), v.reg('l'), v.reg('m'), v.reg('n'));
    if any_r15(&[rdhi, rdlo, rm, rn]) || rdhi == rdlo {
        return v.unpredictable();
    }

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let n64 = v.ir.ir().zero_extend_word_to_long(n);
    let m64 = v.ir.ir().zero_extend_word_to_long(m);
    let product = v.ir.ir().mul_64(n64, m64);

    // product + lo + hi never overflows 64 bits.
    let lo = v.ir.get_register(rdlo);
    let hi = v.ir.get_register(rdhi);
    let p_lo = v.ir.ir().least_significant_word(product);
    let p_hi = v.ir.ir().most_significant_word(product);
    let sum1 = v.ir.ir().add_32(p_lo, lo, Value::ImmU1(false));
    let c1 = v.ir.ir().get_carry_from_op(sum1);
    let mid = v.ir.ir().add_32(p_hi, Value::ImmU32(0), c1);
    let sum2 = v.ir.ir().add_32(sum1, hi, Value::ImmU1(false));
    let c2 = v.ir.ir().get_carry_from_op(sum2);
    let out_hi = v.ir.ir().add_32(mid, Value::ImmU32(0), c2);

    v.ir.set_register(rdlo, sum2);
    v.ir.set_register(rdhi, out_hi);
    true
}

/// SMUAD/SMUADX: sum of dual signed halfword products, setting Q on
/// overflow of the addition.
pub fn arm_smuad(v: &mut ArmVisitor<'_>) -> bool {
    emit_dual_multiply(v, false, None)
}

/// SMLAD/SMLADX: dual multiply-add with accumulator.
pub fn arm_smlad(v: &mut ArmVisitor<'_>) -> bool {
    let ra = v.reg('a');
    emit_dual_multiply(v, false, Some(ra))
}

/// SMUSD/SMUSDX: difference of dual signed halfword products.
pub fn arm_smusd(v: &mut ArmVisitor<'_>) -> bool {
    emit_dual_multiply(v, true, None)
}

/// SMLSD/SMLSDX.
pub fn arm_smlsd(v: &mut ArmVisitor<'_>) -> bool {
    let ra = v.reg('a');
    emit_dual_multiply(v, true, Some(ra))
}

fn emit_dual_multiply(v: &mut ArmVisitor<'_>, subtract: bool, accumulator: Option<Reg>) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    let swap = v.field('x') != 0;
    if any_r15(&[rd, rm, rn]) || accumulator == Some(Reg::R15) {
        return v.unpredictable();
    }

    let n = v.ir.get_register(rn);
    let m_raw = v.ir.get_register(rm);
    let m = if swap {
        v.ir.ir()
            .rotate_right_32(m_raw, Value::ImmU8(16), Value::ImmU1(false))
            .result
    } else {
        m_raw
    };

    let n_lo_h = v.ir.ir().least_significant_half(n);
    let n_lo = v.ir.ir().sign_extend_half_to_word(n_lo_h);
    let n_hi_r = v.ir.ir().rotate_right_32(n, Value::ImmU8(16), Value::ImmU1(false)).result;
    let n_hi_h = v.ir.ir().least_significant_half(n_hi_r);
    let n_hi = v.ir.ir().sign_extend_half_to_word(n_hi_h);

    let m_lo_h = v.ir.ir().least_significant_half(m);
    let m_lo = v.ir.ir().sign_extend_half_to_word(m_lo_h);
    let m_hi_r = v.ir.ir().rotate_right_32(m, Value::ImmU8(16), Value::ImmU1(false)).result;
    let m_hi_h = v.ir.ir().least_significant_half(m_hi_r);
    let m_hi = v.ir.ir().sign_extend_half_to_word(m_hi_h);

    let p_lo = v.ir.ir().mul_32(n_lo, m_lo);
    let p_hi = v.ir.ir().mul_32(n_hi, m_hi);

    let mut result = if subtract {
        // The difference of two halfword products cannot overflow.
        v.ir.ir().sub_32(p_lo, p_hi, Value::ImmU1(true))
    } else {
        let sum = v.ir.ir().add_32(p_lo, p_hi, Value::ImmU1(false));
        let overflow = v.ir.ir().get_overflow_from_op(sum);
        v.ir.or_q_flag(overflow);
        sum
    };

    if let Some(ra) = accumulator {
        let acc = v.ir.get_register(ra);
        let sum = v.ir.ir().add_32(result, acc, Value::ImmU1(false));
        let overflow = v.ir.ir().get_overflow_from_op(sum);
        v.ir.or_q_flag(overflow);
        result = sum;
    }

    v.ir.set_register(rd, result);
    true
}

/// USAD8: sum of absolute byte differences.
pub fn arm_usad8(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if any_r15(&[rd, rm, rn]) {
        return v.unpredictable();
    }
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().packed_op(crate::ir::opcode::Opcode::PackedAbsDiffSumU8, n, m);
    v.ir.set_register(rd, result);
    true
}

/// USADA8: sum of absolute byte differences plus accumulator.
pub fn arm_usada8(v: &mut ArmVisitor<'_>) -> bool {
    let (rd, ra, rm, rn) = (v.reg('d'), v.reg('a'), v.reg('m'), v.reg('n'));
    if any_r15(&[rd, ra, rm, rn]) {
        return v.unpredictable();
    }
    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let sad = v.ir.ir().packed_op(crate::ir::opcode::Opcode::PackedAbsDiffSumU8, n, m);
    let acc = v.ir.get_register(ra);
    let result = v.ir.ir().add_32(sad, acc, Value::ImmU1(false));
    v.ir.set_register(rd, result);
    true
}
