use crate::ir::block::Block;
use crate::ir::opcode::Opcode;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;

/// A value together with the carry it shifted out. Returned by the shift
/// helpers; the carry is a pseudo-op and costs nothing when unused.
#[derive(Debug, Clone, Copy)]
pub struct ResultAndCarry {
    pub result: Value,
    pub carry: Value,
}

/// Appends typed micro-ops to a block. Architecture-agnostic operations
/// only; A32 guest-context ops live in [`crate::ir::a32_emitter`].
pub struct IrEmitter<'a> {
    pub block: &'a mut Block,
}

impl<'a> IrEmitter<'a> {
    pub fn new(block: &'a mut Block) -> Self {
        Self { block }
    }

    pub fn ins(&mut self, opcode: Opcode, args: &[Value]) -> Value {
        Value::Inst(self.block.append(opcode, args))
    }

    pub fn ins_void(&mut self, opcode: Opcode, args: &[Value]) {
        self.block.append(opcode, args);
    }

    pub fn set_term(&mut self, terminal: Terminal) {
        self.block.set_terminal(terminal);
    }

    pub fn imm1(&mut self, v: bool) -> Value {
        Value::ImmU1(v)
    }

    pub fn imm8(&mut self, v: u8) -> Value {
        Value::ImmU8(v)
    }

    pub fn imm32(&mut self, v: u32) -> Value {
        Value::ImmU32(v)
    }

    pub fn imm64(&mut self, v: u64) -> Value {
        Value::ImmU64(v)
    }

    // --- Flag extraction pseudo-ops ---

    pub fn get_carry_from_op(&mut self, op: Value) -> Value {
        self.ins(Opcode::GetCarryFromOp, &[op])
    }

    pub fn get_overflow_from_op(&mut self, op: Value) -> Value {
        self.ins(Opcode::GetOverflowFromOp, &[op])
    }

    pub fn get_ge_from_op(&mut self, op: Value) -> Value {
        self.ins(Opcode::GetGEFromOp, &[op])
    }

    // --- Width transfers ---

    pub fn pack_2x32_to_1x64(&mut self, lo: Value, hi: Value) -> Value {
        self.ins(Opcode::Pack2x32To1x64, &[lo, hi])
    }

    pub fn least_significant_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::LeastSignificantWord, &[v])
    }

    pub fn most_significant_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::MostSignificantWord, &[v])
    }

    pub fn least_significant_half(&mut self, v: Value) -> Value {
        self.ins(Opcode::LeastSignificantHalf, &[v])
    }

    pub fn least_significant_byte(&mut self, v: Value) -> Value {
        self.ins(Opcode::LeastSignificantByte, &[v])
    }

    pub fn most_significant_bit(&mut self, v: Value) -> Value {
        self.ins(Opcode::MostSignificantBit, &[v])
    }

    pub fn is_zero_32(&mut self, v: Value) -> Value {
        self.ins(Opcode::IsZero32, &[v])
    }

    // --- Logic ---

    pub fn and_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::And32, &[a, b])
    }

    pub fn eor_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::Eor32, &[a, b])
    }

    pub fn or_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::Or32, &[a, b])
    }

    pub fn not_32(&mut self, a: Value) -> Value {
        self.ins(Opcode::Not32, &[a])
    }

    // --- Shifts ---

    pub fn logical_shift_left_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.ins(Opcode::LogicalShiftLeft32, &[value, shift, carry_in]);
        let carry = self.get_carry_from_op(result);
        ResultAndCarry { result, carry }
    }

    pub fn logical_shift_right_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.ins(Opcode::LogicalShiftRight32, &[value, shift, carry_in]);
        let carry = self.get_carry_from_op(result);
        ResultAndCarry { result, carry }
    }

    pub fn arithmetic_shift_right_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.ins(Opcode::ArithmeticShiftRight32, &[value, shift, carry_in]);
        let carry = self.get_carry_from_op(result);
        ResultAndCarry { result, carry }
    }

    pub fn rotate_right_32(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.ins(Opcode::RotateRight32, &[value, shift, carry_in]);
        let carry = self.get_carry_from_op(result);
        ResultAndCarry { result, carry }
    }

    pub fn rotate_right_extended(&mut self, value: Value, carry_in: Value) -> ResultAndCarry {
        let result = self.ins(Opcode::RotateRightExtended, &[value, carry_in]);
        let carry = self.get_carry_from_op(result);
        ResultAndCarry { result, carry }
    }

    // --- Arithmetic ---

    /// result = a + b + carry_in.
    pub fn add_32(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.ins(Opcode::Add32, &[a, b, carry_in])
    }

    /// result = a - b - !carry_in (A32 borrow semantics).
    pub fn sub_32(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.ins(Opcode::Sub32, &[a, b, carry_in])
    }

    pub fn mul_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::Mul32, &[a, b])
    }

    pub fn mul_64(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::Mul64, &[a, b])
    }

    pub fn signed_div_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::SignedDiv32, &[a, b])
    }

    pub fn unsigned_div_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::UnsignedDiv32, &[a, b])
    }

    // --- Extension ---

    pub fn sign_extend_byte_to_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::SignExtendByteToWord, &[v])
    }

    pub fn sign_extend_half_to_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::SignExtendHalfToWord, &[v])
    }

    pub fn sign_extend_word_to_long(&mut self, v: Value) -> Value {
        self.ins(Opcode::SignExtendWordToLong, &[v])
    }

    pub fn zero_extend_byte_to_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::ZeroExtendByteToWord, &[v])
    }

    pub fn zero_extend_half_to_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::ZeroExtendHalfToWord, &[v])
    }

    pub fn zero_extend_word_to_long(&mut self, v: Value) -> Value {
        self.ins(Opcode::ZeroExtendWordToLong, &[v])
    }

    // --- Bit manipulation ---

    pub fn byte_reverse_word(&mut self, v: Value) -> Value {
        self.ins(Opcode::ByteReverseWord, &[v])
    }

    pub fn byte_reverse_half(&mut self, v: Value) -> Value {
        self.ins(Opcode::ByteReverseHalf, &[v])
    }

    pub fn count_leading_zeros(&mut self, v: Value) -> Value {
        self.ins(Opcode::CountLeadingZeros, &[v])
    }

    // --- Saturation ---

    pub fn signed_saturated_add_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::SignedSaturatedAdd32, &[a, b])
    }

    pub fn signed_saturated_sub_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::SignedSaturatedSub32, &[a, b])
    }

    /// Saturate to an `bits`-bit signed range.
    pub fn signed_saturation(&mut self, v: Value, bits: u8) -> Value {
        self.ins(Opcode::SignedSaturation, &[v, Value::ImmU8(bits)])
    }

    /// Saturate to an `bits`-bit unsigned range.
    pub fn unsigned_saturation(&mut self, v: Value, bits: u8) -> Value {
        self.ins(Opcode::UnsignedSaturation, &[v, Value::ImmU8(bits)])
    }

    // --- Packed (parallel) arithmetic ---

    /// Append one of the packed-arithmetic ops. The opcode choice is the
    /// frontend's; all share the (U32, U32) -> U32 shape.
    pub fn packed_op(&mut self, opcode: Opcode, a: Value, b: Value) -> Value {
        self.ins(opcode, &[a, b])
    }

    pub fn packed_select(&mut self, ge: Value, when_set: Value, when_clear: Value) -> Value {
        self.ins(Opcode::PackedSelect, &[ge, when_set, when_clear])
    }

    // --- Floating point ---

    pub fn fp_abs_32(&mut self, v: Value) -> Value {
        self.ins(Opcode::FPAbs32, &[v])
    }

    pub fn fp_abs_64(&mut self, v: Value) -> Value {
        self.ins(Opcode::FPAbs64, &[v])
    }

    pub fn fp_neg_32(&mut self, v: Value) -> Value {
        self.ins(Opcode::FPNeg32, &[v])
    }

    pub fn fp_neg_64(&mut self, v: Value) -> Value {
        self.ins(Opcode::FPNeg64, &[v])
    }

    pub fn fp_add_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPAdd32, &[a, b])
    }

    pub fn fp_add_64(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPAdd64, &[a, b])
    }

    pub fn fp_sub_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPSub32, &[a, b])
    }

    pub fn fp_sub_64(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPSub64, &[a, b])
    }

    pub fn fp_mul_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPMul32, &[a, b])
    }

    pub fn fp_mul_64(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPMul64, &[a, b])
    }

    pub fn fp_div_32(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPDiv32, &[a, b])
    }

    pub fn fp_div_64(&mut self, a: Value, b: Value) -> Value {
        self.ins(Opcode::FPDiv64, &[a, b])
    }

    pub fn fp_sqrt_32(&mut self, v: Value) -> Value {
        self.ins(Opcode::FPSqrt32, &[v])
    }

    pub fn fp_sqrt_64(&mut self, v: Value) -> Value {
        self.ins(Opcode::FPSqrt64, &[v])
    }

    pub fn fp_compare_32(&mut self, a: Value, b: Value, quiet: bool) -> Value {
        self.ins(Opcode::FPCompare32, &[a, b, Value::ImmU1(quiet)])
    }

    pub fn fp_compare_64(&mut self, a: Value, b: Value, quiet: bool) -> Value {
        self.ins(Opcode::FPCompare64, &[a, b, Value::ImmU1(quiet)])
    }
}
