use crate::frontend::a32::types::{ExtReg, Reg};
use crate::ir::block::Block;
use crate::ir::emitter::IrEmitter;
use crate::ir::location::A32LocationDescriptor;
use crate::ir::opcode::Opcode;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;
use crate::jit_config::ExceptionKind;

/// A32-specific IR emitter: extends [`IrEmitter`] with guest register,
/// flag, memory and system operations.
pub struct A32IrEmitter<'a> {
    pub base: IrEmitter<'a>,
    pub current_location: A32LocationDescriptor,
}

impl<'a> A32IrEmitter<'a> {
    pub fn new(block: &'a mut Block, location: A32LocationDescriptor) -> Self {
        Self {
            base: IrEmitter::new(block),
            current_location: location,
        }
    }

    pub fn pc(&self) -> u32 {
        self.current_location.pc()
    }

    pub fn ir(&mut self) -> &mut IrEmitter<'a> {
        &mut self.base
    }

    pub fn set_term(&mut self, terminal: Terminal) {
        self.base.set_term(terminal);
    }

    fn emit(&mut self, opcode: Opcode, args: &[Value]) -> Value {
        self.base.ins(opcode, args)
    }

    fn emit_void(&mut self, opcode: Opcode, args: &[Value]) {
        self.base.ins_void(opcode, args);
    }

    // --- Registers ---

    pub fn get_register(&mut self, reg: Reg) -> Value {
        if reg == Reg::R15 {
            // PC reads observe the fetch pipeline: current address + 8 in
            // ARM state, + 4 in Thumb state.
            let offset = if self.current_location.t_flag() { 4 } else { 8 };
            return Value::ImmU32(self.pc().wrapping_add(offset));
        }
        self.emit(Opcode::A32GetRegister, &[Value::ImmReg(reg)])
    }

    pub fn set_register(&mut self, reg: Reg, value: Value) {
        debug_assert!(reg != Reg::R15, "R15 writes go through bx_write_pc/branch_write_pc");
        self.emit_void(Opcode::A32SetRegister, &[Value::ImmReg(reg), value]);
    }

    pub fn get_extended_register_32(&mut self, reg: ExtReg) -> Value {
        debug_assert!(reg.is_single());
        self.emit(Opcode::A32GetExtendedRegister32, &[Value::ImmExtReg(reg)])
    }

    pub fn set_extended_register_32(&mut self, reg: ExtReg, value: Value) {
        debug_assert!(reg.is_single());
        self.emit_void(Opcode::A32SetExtendedRegister32, &[Value::ImmExtReg(reg), value]);
    }

    pub fn get_extended_register_64(&mut self, reg: ExtReg) -> Value {
        debug_assert!(!reg.is_single());
        self.emit(Opcode::A32GetExtendedRegister64, &[Value::ImmExtReg(reg)])
    }

    pub fn set_extended_register_64(&mut self, reg: ExtReg, value: Value) {
        debug_assert!(!reg.is_single());
        self.emit_void(Opcode::A32SetExtendedRegister64, &[Value::ImmExtReg(reg), value]);
    }

    // --- PC writes ---

    /// Write a value to the PC with interworking: bit 0 selects Thumb
    /// state, and the address is force-aligned for the selected state.
    pub fn bx_write_pc(&mut self, value: Value) {
        self.emit_void(Opcode::A32BXWritePC, &[value]);
    }

    /// Write a branch target to the PC without changing execution state.
    pub fn branch_write_pc(&mut self, value: Value) {
        let mask = if self.current_location.t_flag() {
            0xFFFF_FFFE
        } else {
            0xFFFF_FFFC
        };
        let masked = self.base.and_32(value, Value::ImmU32(mask));
        self.emit_void(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R15), masked]);
    }

    /// Write a known branch target to the PC.
    pub fn branch_write_pc_imm(&mut self, target: u32) {
        let mask = if self.current_location.t_flag() {
            0xFFFF_FFFE
        } else {
            0xFFFF_FFFC
        };
        self.emit_void(
            Opcode::A32SetRegister,
            &[Value::ImmReg(Reg::R15), Value::ImmU32(target & mask)],
        );
    }

    pub fn update_upper_location_descriptor(&mut self, upper: u32) {
        self.emit_void(Opcode::A32UpdateUpperLocationDescriptor, &[Value::ImmU32(upper)]);
    }

    pub fn push_rsb(&mut self, return_location: A32LocationDescriptor) {
        self.emit_void(Opcode::A32PushRSB, &[Value::ImmU64(return_location.unique_hash())]);
    }

    pub fn set_check_bit(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetCheckBit, &[value]);
    }

    // --- Flags ---

    pub fn get_c_flag(&mut self) -> Value {
        self.emit(Opcode::A32GetCFlag, &[])
    }

    pub fn set_n_flag(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetNFlag, &[value]);
    }

    pub fn set_z_flag(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetZFlag, &[value]);
    }

    pub fn set_c_flag(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetCFlag, &[value]);
    }

    pub fn set_v_flag(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetVFlag, &[value]);
    }

    pub fn or_q_flag(&mut self, value: Value) {
        self.emit_void(Opcode::A32OrQFlag, &[value]);
    }

    pub fn get_ge_flags(&mut self) -> Value {
        self.emit(Opcode::A32GetGEFlags, &[])
    }

    pub fn set_ge_flags(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetGEFlags, &[value]);
    }

    pub fn get_cpsr(&mut self) -> Value {
        self.emit(Opcode::A32GetCpsr, &[])
    }

    pub fn set_cpsr(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetCpsr, &[value]);
    }

    /// Write bits 31:28 of `value` into NZCV, leaving the rest alone.
    pub fn set_cpsr_nzcv_raw(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetCpsrNZCVRaw, &[value]);
    }

    /// Set N and Z from a result value.
    pub fn set_nz_flags(&mut self, result: Value) {
        let n = self.base.most_significant_bit(result);
        self.set_n_flag(n);
        let z = self.base.is_zero_32(result);
        self.set_z_flag(z);
    }

    /// Set N, Z, C and V from an arithmetic op's result.
    pub fn set_nzcv_from_op(&mut self, result: Value) {
        self.set_nz_flags(result);
        let c = self.base.get_carry_from_op(result);
        self.set_c_flag(c);
        let v = self.base.get_overflow_from_op(result);
        self.set_v_flag(v);
    }

    // --- FPSCR ---

    pub fn get_fpscr(&mut self) -> Value {
        self.emit(Opcode::A32GetFpscr, &[])
    }

    pub fn set_fpscr(&mut self, value: Value) {
        self.emit_void(Opcode::A32SetFpscr, &[value]);
    }

    pub fn get_fpscr_nzcv(&mut self) -> Value {
        self.emit(Opcode::A32GetFpscrNZCV, &[])
    }

    pub fn set_fpscr_nzcv(&mut self, nzcv: Value) {
        self.emit_void(Opcode::A32SetFpscrNZCV, &[nzcv]);
    }

    // --- System ---

    pub fn call_supervisor(&mut self, imm: Value) {
        self.emit_void(Opcode::A32CallSupervisor, &[imm]);
    }

    pub fn exception_raised(&mut self, exception: ExceptionKind) {
        let pc = self.pc();
        self.emit_void(
            Opcode::A32ExceptionRaised,
            &[Value::ImmU32(pc), Value::ImmU64(exception as u64)],
        );
    }

    // --- Memory ---

    pub fn read_memory_8(&mut self, vaddr: Value) -> Value {
        self.emit(Opcode::ReadMemory8, &[vaddr])
    }

    pub fn read_memory_16(&mut self, vaddr: Value) -> Value {
        self.emit(Opcode::ReadMemory16, &[vaddr])
    }

    pub fn read_memory_32(&mut self, vaddr: Value) -> Value {
        self.emit(Opcode::ReadMemory32, &[vaddr])
    }

    pub fn read_memory_64(&mut self, vaddr: Value) -> Value {
        self.emit(Opcode::ReadMemory64, &[vaddr])
    }

    pub fn write_memory_8(&mut self, vaddr: Value, value: Value) {
        self.emit_void(Opcode::WriteMemory8, &[vaddr, value]);
    }

    pub fn write_memory_16(&mut self, vaddr: Value, value: Value) {
        self.emit_void(Opcode::WriteMemory16, &[vaddr, value]);
    }

    pub fn write_memory_32(&mut self, vaddr: Value, value: Value) {
        self.emit_void(Opcode::WriteMemory32, &[vaddr, value]);
    }

    pub fn write_memory_64(&mut self, vaddr: Value, value: Value) {
        self.emit_void(Opcode::WriteMemory64, &[vaddr, value]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::location::LocationDescriptor;

    #[test]
    fn test_pc_read_offset() {
        let mut block = Block::new(LocationDescriptor(0x100));
        let loc = A32LocationDescriptor::at(0x100);
        let mut ir = A32IrEmitter::new(&mut block, loc);
        assert_eq!(ir.get_register(Reg::R15), Value::ImmU32(0x108));

        let thumb = loc.set_t_flag(true);
        let mut block = Block::new(thumb.to_location());
        let mut ir = A32IrEmitter::new(&mut block, thumb);
        assert_eq!(ir.get_register(Reg::R15), Value::ImmU32(0x104));
    }

    #[test]
    fn test_set_nzcv_from_op_appends_pseudo_ops() {
        let mut block = Block::new(LocationDescriptor(0));
        let mut ir = A32IrEmitter::new(&mut block, A32LocationDescriptor::at(0));
        let a = ir.get_register(Reg::R0);
        let b = ir.get_register(Reg::R1);
        let sum = ir.ir().add_32(a, b, Value::ImmU1(false));
        ir.set_nzcv_from_op(sum);

        let carry = block.find_pseudo_op(sum.inst_ref(), Opcode::GetCarryFromOp);
        let overflow = block.find_pseudo_op(sum.inst_ref(), Opcode::GetOverflowFromOp);
        assert!(carry.is_some());
        assert!(overflow.is_some());
    }
}
