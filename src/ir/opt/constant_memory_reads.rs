use crate::ir::block::Block;
use crate::ir::opcode::Opcode;
use crate::ir::value::{InstRef, Value};
use crate::jit_config::Callbacks;

/// Fold memory reads of constant addresses into literal values when the
/// embedder marks the target page read-only. The read happens here, at
/// translation time, through the same callbacks emitted code would use.
pub fn constant_memory_reads(block: &mut Block, cb: &mut dyn Callbacks) {
    for i in 0..block.instructions.len() {
        if block.instructions[i].is_tombstone() {
            continue;
        }
        let opcode = block.instructions[i].opcode;
        let vaddr = match block.instructions[i].args[0] {
            Value::ImmU32(v) => v,
            _ => continue,
        };

        let replacement = match opcode {
            Opcode::ReadMemory8 if cb.is_read_only_memory(vaddr) => {
                Value::ImmU8(cb.memory_read_8(vaddr))
            }
            Opcode::ReadMemory16 if cb.is_read_only_memory(vaddr) => {
                Value::ImmU16(cb.memory_read_16(vaddr))
            }
            Opcode::ReadMemory32 if cb.is_read_only_memory(vaddr) => {
                Value::ImmU32(cb.memory_read_32(vaddr))
            }
            Opcode::ReadMemory64 if cb.is_read_only_memory(vaddr) => {
                Value::ImmU64(cb.memory_read_64(vaddr))
            }
            _ => continue,
        };

        block.replace_uses_with(InstRef(i as u32), replacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::a32::types::Reg;
    use crate::ir::location::LocationDescriptor;
    use crate::jit_config::ExceptionKind;

    struct RomEnv;

    impl Callbacks for RomEnv {
        fn memory_read_code(&mut self, _vaddr: u32) -> Option<u32> {
            None
        }
        fn memory_read_8(&mut self, vaddr: u32) -> u8 {
            vaddr as u8
        }
        fn memory_read_16(&mut self, vaddr: u32) -> u16 {
            vaddr as u16
        }
        fn memory_read_32(&mut self, vaddr: u32) -> u32 {
            0xCAFE_0000 | (vaddr & 0xFFFF)
        }
        fn memory_read_64(&mut self, vaddr: u32) -> u64 {
            vaddr as u64
        }
        fn memory_write_8(&mut self, _vaddr: u32, _value: u8) {}
        fn memory_write_16(&mut self, _vaddr: u32, _value: u16) {}
        fn memory_write_32(&mut self, _vaddr: u32, _value: u32) {}
        fn memory_write_64(&mut self, _vaddr: u32, _value: u64) {}
        fn is_read_only_memory(&mut self, vaddr: u32) -> bool {
            vaddr < 0x1000
        }
        fn call_svc(&mut self, _swi: u32) {}
        fn exception_raised(&mut self, _pc: u32, _exception: ExceptionKind) {}
        fn add_ticks(&mut self, _ticks: u64) {}
        fn get_ticks_remaining(&mut self) -> u64 {
            0
        }
    }

    #[test]
    fn test_read_only_read_is_folded() {
        let mut block = Block::new(LocationDescriptor(0));
        let read = block.append(Opcode::ReadMemory32, &[Value::ImmU32(0x100)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::Inst(read)]);

        constant_memory_reads(&mut block, &mut RomEnv);

        assert!(block.get(read).is_tombstone());
        assert_eq!(block.instructions[1].args[1], Value::ImmU32(0xCAFE_0100));
    }

    #[test]
    fn test_writable_read_is_kept() {
        let mut block = Block::new(LocationDescriptor(0));
        let read = block.append(Opcode::ReadMemory32, &[Value::ImmU32(0x2000)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::Inst(read)]);

        constant_memory_reads(&mut block, &mut RomEnv);

        assert!(!block.get(read).is_tombstone());
    }
}
