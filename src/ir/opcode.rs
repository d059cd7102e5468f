use std::fmt;

use crate::ir::types::Type;

/// IR micro-operation identifiers.
///
/// Opcodes are partitioned into pure ops (no side effect; foldable and
/// removable when unused) and impure ops (guest state writes, memory
/// accesses, exceptions). Guest-register reads and writes are themselves
/// IR ops, never implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Tombstone left behind by optimization passes.
    Void,
    /// Forwards its single argument unchanged.
    Identity,

    // --- A32 guest context ---
    A32GetRegister,
    A32SetRegister,
    A32GetExtendedRegister32,
    A32SetExtendedRegister32,
    A32GetExtendedRegister64,
    A32SetExtendedRegister64,
    A32GetCpsr,
    A32SetCpsr,
    A32SetCpsrNZCVRaw,
    A32GetCFlag,
    A32SetNFlag,
    A32SetZFlag,
    A32SetCFlag,
    A32SetVFlag,
    A32OrQFlag,
    A32GetGEFlags,
    A32SetGEFlags,
    A32BXWritePC,
    A32UpdateUpperLocationDescriptor,
    A32PushRSB,
    A32SetCheckBit,
    A32CallSupervisor,
    A32ExceptionRaised,
    A32GetFpscr,
    A32SetFpscr,
    A32GetFpscrNZCV,
    A32SetFpscrNZCV,

    // --- Pseudo-operations reading flags out of a preceding op ---
    GetCarryFromOp,
    GetOverflowFromOp,
    GetGEFromOp,

    // --- Width transfers ---
    Pack2x32To1x64,
    LeastSignificantWord,
    MostSignificantWord,
    LeastSignificantHalf,
    LeastSignificantByte,
    MostSignificantBit,
    IsZero32,

    // --- Logic and arithmetic ---
    And32,
    Eor32,
    Or32,
    Not32,
    LogicalShiftLeft32,
    LogicalShiftRight32,
    ArithmeticShiftRight32,
    RotateRight32,
    RotateRightExtended,
    Add32,
    Sub32,
    Mul32,
    Mul64,
    SignedDiv32,
    UnsignedDiv32,

    // --- Extension ---
    SignExtendByteToWord,
    SignExtendHalfToWord,
    SignExtendWordToLong,
    ZeroExtendByteToWord,
    ZeroExtendHalfToWord,
    ZeroExtendWordToLong,

    // --- Bit manipulation ---
    ByteReverseWord,
    ByteReverseHalf,
    CountLeadingZeros,

    // --- Saturating arithmetic ---
    SignedSaturatedAdd32,
    SignedSaturatedSub32,
    SignedSaturation,
    UnsignedSaturation,

    // --- Packed (parallel) arithmetic ---
    PackedAddU8,
    PackedAddS8,
    PackedSubU8,
    PackedSubS8,
    PackedAddU16,
    PackedAddS16,
    PackedSubU16,
    PackedSubS16,
    PackedAddSubU16,
    PackedAddSubS16,
    PackedSubAddU16,
    PackedSubAddS16,
    PackedHalvingAddU8,
    PackedHalvingAddS8,
    PackedHalvingSubU8,
    PackedHalvingSubS8,
    PackedHalvingAddU16,
    PackedHalvingAddS16,
    PackedHalvingSubU16,
    PackedHalvingSubS16,
    PackedHalvingAddSubU16,
    PackedHalvingAddSubS16,
    PackedHalvingSubAddU16,
    PackedHalvingSubAddS16,
    PackedSaturatedAddU8,
    PackedSaturatedAddS8,
    PackedSaturatedSubU8,
    PackedSaturatedSubS8,
    PackedSaturatedAddU16,
    PackedSaturatedAddS16,
    PackedSaturatedSubU16,
    PackedSaturatedSubS16,
    PackedAbsDiffSumU8,
    PackedSelect,

    // --- Guest memory ---
    ReadMemory8,
    ReadMemory16,
    ReadMemory32,
    ReadMemory64,
    WriteMemory8,
    WriteMemory16,
    WriteMemory32,
    WriteMemory64,

    // --- Scalar floating point ---
    FPAbs32,
    FPAbs64,
    FPNeg32,
    FPNeg64,
    FPAdd32,
    FPAdd64,
    FPSub32,
    FPSub64,
    FPMul32,
    FPMul64,
    FPDiv32,
    FPDiv64,
    FPSqrt32,
    FPSqrt64,
    FPCompare32,
    FPCompare64,
}

use Opcode::*;
use Type::{Cond, ExtReg, Opaque, Reg, NZCV, U1, U16, U32, U64, U8};

impl Opcode {
    /// Result type of this opcode. `Identity` is typed by its argument.
    pub fn return_type(self) -> Type {
        self.signature().0
    }

    /// Expected argument types, in order.
    pub fn arg_types(self) -> &'static [Type] {
        self.signature().1
    }

    pub fn num_args(self) -> usize {
        self.arg_types().len()
    }

    fn signature(self) -> (Type, &'static [Type]) {
        match self {
            Void => (Type::Void, &[]),
            Identity => (Opaque, &[Opaque]),

            A32GetRegister => (U32, &[Reg]),
            A32SetRegister => (Type::Void, &[Reg, U32]),
            A32GetExtendedRegister32 => (U32, &[ExtReg]),
            A32SetExtendedRegister32 => (Type::Void, &[ExtReg, U32]),
            A32GetExtendedRegister64 => (U64, &[ExtReg]),
            A32SetExtendedRegister64 => (Type::Void, &[ExtReg, U64]),
            A32GetCpsr => (U32, &[]),
            A32SetCpsr => (Type::Void, &[U32]),
            A32SetCpsrNZCVRaw => (Type::Void, &[U32]),
            A32GetCFlag => (U1, &[]),
            A32SetNFlag | A32SetZFlag | A32SetCFlag | A32SetVFlag | A32OrQFlag => {
                (Type::Void, &[U1])
            }
            A32GetGEFlags => (U32, &[]),
            A32SetGEFlags => (Type::Void, &[U32]),
            A32BXWritePC => (Type::Void, &[U32]),
            A32UpdateUpperLocationDescriptor => (Type::Void, &[U32]),
            A32PushRSB => (Type::Void, &[U64]),
            A32SetCheckBit => (Type::Void, &[U1]),
            A32CallSupervisor => (Type::Void, &[U32]),
            A32ExceptionRaised => (Type::Void, &[U32, U64]),
            A32GetFpscr => (U32, &[]),
            A32SetFpscr => (Type::Void, &[U32]),
            A32GetFpscrNZCV => (U32, &[]),
            A32SetFpscrNZCV => (Type::Void, &[NZCV]),

            GetCarryFromOp | GetOverflowFromOp => (U1, &[Opaque]),
            GetGEFromOp => (U32, &[Opaque]),

            Pack2x32To1x64 => (U64, &[U32, U32]),
            LeastSignificantWord | MostSignificantWord => (U32, &[U64]),
            LeastSignificantHalf => (U16, &[U32]),
            LeastSignificantByte => (U8, &[U32]),
            MostSignificantBit | IsZero32 => (U1, &[U32]),

            And32 | Eor32 | Or32 => (U32, &[U32, U32]),
            Not32 => (U32, &[U32]),
            LogicalShiftLeft32 | LogicalShiftRight32 | ArithmeticShiftRight32
            | RotateRight32 => (U32, &[U32, U8, U1]),
            RotateRightExtended => (U32, &[U32, U1]),
            Add32 | Sub32 => (U32, &[U32, U32, U1]),
            Mul32 => (U32, &[U32, U32]),
            Mul64 => (U64, &[U64, U64]),
            SignedDiv32 | UnsignedDiv32 => (U32, &[U32, U32]),

            SignExtendByteToWord | ZeroExtendByteToWord => (U32, &[U8]),
            SignExtendHalfToWord | ZeroExtendHalfToWord => (U32, &[U16]),
            SignExtendWordToLong | ZeroExtendWordToLong => (U64, &[U32]),

            ByteReverseWord | CountLeadingZeros => (U32, &[U32]),
            ByteReverseHalf => (U16, &[U16]),

            SignedSaturatedAdd32 | SignedSaturatedSub32 => (U32, &[U32, U32]),
            SignedSaturation | UnsignedSaturation => (U32, &[U32, U8]),

            PackedAddU8 | PackedAddS8 | PackedSubU8 | PackedSubS8 | PackedAddU16
            | PackedAddS16 | PackedSubU16 | PackedSubS16 | PackedAddSubU16
            | PackedAddSubS16 | PackedSubAddU16 | PackedSubAddS16
            | PackedHalvingAddU8 | PackedHalvingAddS8 | PackedHalvingSubU8
            | PackedHalvingSubS8 | PackedHalvingAddU16 | PackedHalvingAddS16
            | PackedHalvingSubU16 | PackedHalvingSubS16 | PackedHalvingAddSubU16
            | PackedHalvingAddSubS16 | PackedHalvingSubAddU16
            | PackedHalvingSubAddS16 | PackedSaturatedAddU8 | PackedSaturatedAddS8
            | PackedSaturatedSubU8 | PackedSaturatedSubS8 | PackedSaturatedAddU16
            | PackedSaturatedAddS16 | PackedSaturatedSubU16 | PackedSaturatedSubS16
            | PackedAbsDiffSumU8 => (U32, &[U32, U32]),
            PackedSelect => (U32, &[U32, U32, U32]),

            ReadMemory8 => (U8, &[U32]),
            ReadMemory16 => (U16, &[U32]),
            ReadMemory32 => (U32, &[U32]),
            ReadMemory64 => (U64, &[U32]),
            WriteMemory8 => (Type::Void, &[U32, U8]),
            WriteMemory16 => (Type::Void, &[U32, U16]),
            WriteMemory32 => (Type::Void, &[U32, U32]),
            WriteMemory64 => (Type::Void, &[U32, U64]),

            FPAbs32 | FPNeg32 => (U32, &[U32]),
            FPAbs64 | FPNeg64 => (U64, &[U64]),
            FPAdd32 | FPSub32 | FPMul32 | FPDiv32 => (U32, &[U32, U32]),
            FPAdd64 | FPSub64 | FPMul64 | FPDiv64 => (U64, &[U64, U64]),
            FPSqrt32 => (U32, &[U32]),
            FPSqrt64 => (U64, &[U64]),
            FPCompare32 => (NZCV, &[U32, U32, U1]),
            FPCompare64 => (NZCV, &[U64, U64, U1]),
        }
    }

    /// Impure ops write guest state, touch guest memory or raise
    /// exceptions; they are never folded or removed.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            A32SetRegister
                | A32SetExtendedRegister32
                | A32SetExtendedRegister64
                | A32SetCpsr
                | A32SetCpsrNZCVRaw
                | A32SetNFlag
                | A32SetZFlag
                | A32SetCFlag
                | A32SetVFlag
                | A32OrQFlag
                | A32SetGEFlags
                | A32BXWritePC
                | A32UpdateUpperLocationDescriptor
                | A32PushRSB
                | A32SetCheckBit
                | A32CallSupervisor
                | A32ExceptionRaised
                | A32SetFpscr
                | A32SetFpscrNZCV
                | ReadMemory8
                | ReadMemory16
                | ReadMemory32
                | ReadMemory64
                | WriteMemory8
                | WriteMemory16
                | WriteMemory32
                | WriteMemory64
                | FPAdd32
                | FPAdd64
                | FPSub32
                | FPSub64
                | FPMul32
                | FPMul64
                | FPDiv32
                | FPDiv64
                | FPSqrt32
                | FPSqrt64
                | FPCompare32
                | FPCompare64
        )
    }

    /// Pseudo-operations extract flag results out of their first argument's
    /// op; the backend emits them together with that parent op.
    pub fn is_pseudo_operation(self) -> bool {
        matches!(self, GetCarryFromOp | GetOverflowFromOp | GetGEFromOp)
    }

    /// Ops after which the get/set-elimination pass must forget all known
    /// guest-state values: anything that can observe or mutate guest state
    /// through the callbacks or outside the tracked get/set ops.
    pub fn is_a32_state_barrier(self) -> bool {
        matches!(
            self,
            A32CallSupervisor
                | A32ExceptionRaised
                | A32BXWritePC
                | A32SetCpsr
                | ReadMemory8
                | ReadMemory16
                | ReadMemory32
                | ReadMemory64
                | WriteMemory8
                | WriteMemory16
                | WriteMemory32
                | WriteMemory64
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_arity() {
        assert_eq!(Opcode::Add32.num_args(), 3);
        assert_eq!(Opcode::A32GetRegister.num_args(), 1);
        assert_eq!(Opcode::A32GetCFlag.num_args(), 0);
        assert_eq!(Opcode::PackedSelect.num_args(), 3);
    }

    #[test]
    fn test_purity_partition() {
        assert!(!Opcode::Add32.has_side_effects());
        assert!(!Opcode::A32GetRegister.has_side_effects());
        assert!(Opcode::A32SetRegister.has_side_effects());
        assert!(Opcode::ReadMemory32.has_side_effects());
        assert!(Opcode::WriteMemory8.has_side_effects());
    }

    #[test]
    fn test_pseudo_ops() {
        assert!(Opcode::GetCarryFromOp.is_pseudo_operation());
        assert!(Opcode::GetOverflowFromOp.is_pseudo_operation());
        assert!(!Opcode::Add32.is_pseudo_operation());
    }
}
