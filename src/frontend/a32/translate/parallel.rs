use crate::frontend::a32::types::Reg;
use crate::ir::opcode::Opcode;

use super::ArmVisitor;

/// The six parallel operation shapes selected by bits [7:5] of the
/// encoding (bit 4 is always set).
#[derive(Debug, Clone, Copy)]
enum ParallelOp {
    Add16,
    AddSub,
    SubAdd,
    Sub16,
    Add8,
    Sub8,
}

impl ParallelOp {
    fn from_word(word: u32) -> Option<Self> {
        match (word >> 5) & 0b111 {
            0b000 => Some(ParallelOp::Add16),
            0b001 => Some(ParallelOp::AddSub),
            0b010 => Some(ParallelOp::SubAdd),
            0b011 => Some(ParallelOp::Sub16),
            0b100 => Some(ParallelOp::Add8),
            0b111 => Some(ParallelOp::Sub8),
            _ => None,
        }
    }
}

fn emit_parallel(
    v: &mut ArmVisitor<'_>,
    opcode: fn(ParallelOp) -> Option<Opcode>,
    sets_ge: bool,
) -> bool {
    let Some(op) = ParallelOp::from_word(v.word) else {
        return v.undefined();
    };
    let Some(opcode) = opcode(op) else {
        return v.undefined();
    };

    let (rd, rm, rn) = (v.reg('d'), v.reg('m'), v.reg('n'));
    if rd == Reg::R15 || rm == Reg::R15 || rn == Reg::R15 {
        return v.unpredictable();
    }

    let n = v.ir.get_register(rn);
    let m = v.ir.get_register(rm);
    let result = v.ir.ir().packed_op(opcode, n, m);
    if sets_ge {
        let ge = v.ir.ir().get_ge_from_op(result);
        v.ir.set_ge_flags(ge);
    }
    v.ir.set_register(rd, result);
    true
}

/// Signed parallel add/sub (SADD16 .. SSUB8), updating GE.
pub fn arm_parallel_s(v: &mut ArmVisitor<'_>) -> bool {
    emit_parallel(
        v,
        |op| {
            Some(match op {
                ParallelOp::Add16 => Opcode::PackedAddS16,
                ParallelOp::AddSub => Opcode::PackedAddSubS16,
                ParallelOp::SubAdd => Opcode::PackedSubAddS16,
                ParallelOp::Sub16 => Opcode::PackedSubS16,
                ParallelOp::Add8 => Opcode::PackedAddS8,
                ParallelOp::Sub8 => Opcode::PackedSubS8,
            })
        },
        true,
    )
}

/// Saturating signed parallel add/sub (QADD16 .. QSUB8).
pub fn arm_parallel_q(v: &mut ArmVisitor<'_>) -> bool {
    emit_parallel(
        v,
        |op| match op {
            ParallelOp::Add16 => Some(Opcode::PackedSaturatedAddS16),
            ParallelOp::Sub16 => Some(Opcode::PackedSaturatedSubS16),
            ParallelOp::Add8 => Some(Opcode::PackedSaturatedAddS8),
            ParallelOp::Sub8 => Some(Opcode::PackedSaturatedSubS8),
            // QASX/QSAX have no packed opcode of their own here.
            _ => None,
        },
        false,
    )
}

/// Signed halving parallel add/sub (SHADD16 .. SHSUB8).
pub fn arm_parallel_sh(v: &mut ArmVisitor<'_>) -> bool {
    emit_parallel(
        v,
        |op| {
            Some(match op {
                ParallelOp::Add16 => Opcode::PackedHalvingAddS16,
                ParallelOp::AddSub => Opcode::PackedHalvingAddSubS16,
                ParallelOp::SubAdd => Opcode::PackedHalvingSubAddS16,
                ParallelOp::Sub16 => Opcode::PackedHalvingSubS16,
                ParallelOp::Add8 => Opcode::PackedHalvingAddS8,
                ParallelOp::Sub8 => Opcode::PackedHalvingSubS8,
            })
        },
        false,
    )
}

/// Unsigned parallel add/sub (UADD16 .. USUB8), updating GE.
pub fn arm_parallel_u(v: &mut ArmVisitor<'_>) -> bool {
    emit_parallel(
        v,
        |op| {
            Some(match op {
                ParallelOp::Add16 => Opcode::PackedAddU16,
                ParallelOp::AddSub => Opcode::PackedAddSubU16,
                ParallelOp::SubAdd => Opcode::PackedSubAddU16,
                ParallelOp::Sub16 => Opcode::PackedSubU16,
                ParallelOp::Add8 => Opcode::PackedAddU8,
                ParallelOp::Sub8 => Opcode::PackedSubU8,
            })
        },
        true,
    )
}

/// Saturating unsigned parallel add/sub (UQADD16 .. UQSUB8).
pub fn arm_parallel_uq(v: &mut ArmVisitor<'_>) -> bool {
    emit_parallel(
        v,
        |op| match op {
            ParallelOp::Add16 => Some(Opcode::PackedSaturatedAddU16),
            ParallelOp::Sub16 => Some(Opcode::PackedSaturatedSubU16),
            ParallelOp::Add8 => Some(Opcode::PackedSaturatedAddU8),
            ParallelOp::Sub8 => Some(Opcode::PackedSaturatedSubU8),
            _ => None,
        },
        false,
    )
}

/// Unsigned halving parallel add/sub (UHADD16 .. UHSUB8).
pub fn arm_parallel_uh(v: &mut ArmVisitor<'_>) -> bool {
    emit_parallel(
        v,
        |op| {
            Some(match op {
                ParallelOp::Add16 => Opcode::PackedHalvingAddU16,
                ParallelOp::AddSub => Opcode::PackedHalvingAddSubU16,
                ParallelOp::SubAdd => Opcode::PackedHalvingSubAddU16,
                ParallelOp::Sub16 => Opcode::PackedHalvingSubU16,
                ParallelOp::Add8 => Opcode::PackedHalvingAddU8,
                ParallelOp::Sub8 => Opcode::PackedHalvingSubU8,
            })
        },
        false,
    )
}
