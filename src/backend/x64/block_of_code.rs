use dynasmrt::{dynasm, DynasmApi, DynasmLabelApi};

use crate::backend::x64::code_buffer::CodeBuffer;
use crate::backend::x64::jit_state::A32JitState;
use crate::backend::x64::Asm;
use crate::error::JitError;

/// Callbacks wired into the dispatcher loop.
pub struct RunCodeCallbacks {
    /// Opaque first argument passed to each callback (the JIT internals).
    pub arg: u64,
    /// `fn(arg) -> code_ptr` — translate-or-find the block for the
    /// current guest state.
    pub lookup_block: u64,
    /// `fn(arg, ticks)` — report consumed ticks.
    pub add_ticks: u64,
    /// `fn(arg) -> ticks` — query the tick budget.
    pub get_ticks_remaining: u64,
}

/// Entry to generated code: `(state, first_block) -> HaltReason bits`.
pub type RunCodeFn = unsafe extern "sysv64" fn(*mut A32JitState, *const u8) -> u32;

/// Kinds of patchable slots emitted at block-link sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// `jg rel32` taken when the tick budget allows a direct block link.
    TickCheckJump,
    /// `jmp rel32` for tick-check-free links.
    UnconditionalJump,
    /// `mov rcx, imm64` loading the RSB code pointer.
    RsbCodePtr,
}

impl PatchKind {
    pub fn slot_size(self) -> usize {
        match self {
            PatchKind::TickCheckJump => 6,
            PatchKind::UnconditionalJump => 5,
            PatchKind::RsbCodePtr => 10,
        }
    }
}

/// Owns the executable buffer and the dispatcher stubs at its base.
///
/// Layout: [prelude: run_code + return_from_run_code + force_return]
/// followed by emitted blocks. `clear_cache` rewinds to the end of the
/// prelude; the stubs survive every invalidation.
pub struct BlockOfCode {
    pub buffer: CodeBuffer,
    run_code_offset: usize,
    return_from_run_code_offset: usize,
    force_return_offset: usize,
    code_begin: usize,
}

impl BlockOfCode {
    pub fn new(capacity: usize, cb: &RunCodeCallbacks) -> Result<Self, JitError> {
        let mut buffer = CodeBuffer::new(capacity)?;
        let base = buffer.base_addr();

        let halt_off = A32JitState::offset_of_halt_reason() as i32;
        let to_run_off = A32JitState::offset_of_cycles_to_run() as i32;
        let remaining_off = A32JitState::offset_of_cycles_remaining() as i32;
        let arg = cb.arg as i64;
        let lookup_block = cb.lookup_block as i64;
        let add_ticks = cb.add_ticks as i64;
        let get_ticks_remaining = cb.get_ticks_remaining as i64;

        let mut ops = Asm::new(base);

        let run_code_offset = ops.offset().0;
        dynasm!(ops
            ; .arch x64
            ; push rbx
            ; push rbp
            ; push r12
            ; push r13
            ; push r14
            ; push r15
            ; sub rsp, 8
            ; mov r15, rdi
            ; mov rbx, rsi
            ; mov rdi, QWORD arg
            ; mov rax, QWORD get_ticks_remaining
            ; call rax
            ; mov [r15 + to_run_off], rax
            ; mov [r15 + remaining_off], rax
            ; cmp DWORD [r15 + halt_off], 0
            ; jne ->force_return
            ; jmp rbx
        );

        let return_from_run_code_offset = ops.offset().0;
        dynasm!(ops
            ; .arch x64
            ; cmp DWORD [r15 + halt_off], 0
            ; jne ->force_return
            ; cmp QWORD [r15 + remaining_off], 0
            ; jle ->force_return
            ; mov rdi, QWORD arg
            ; mov rax, QWORD lookup_block
            ; call rax
            ; jmp rax
        );

        let force_return_offset = ops.offset().0;
        dynasm!(ops
            ; .arch x64
            ; ->force_return:
            ; mov rdi, QWORD arg
            ; mov rsi, [r15 + to_run_off]
            ; sub rsi, [r15 + remaining_off]
            ; mov rax, QWORD add_ticks
            ; call rax
            ; mov eax, [r15 + halt_off]
            ; mov DWORD [r15 + halt_off], 0
            ; add rsp, 8
            ; pop r15
            ; pop r14
            ; pop r13
            ; pop r12
            ; pop rbp
            ; pop rbx
            ; ret
        );

        let prelude = ops.finalize().expect("dispatcher prelude assembly failed");
        if prelude.len() + 4096 > capacity {
            return Err(JitError::CodeCacheTooSmall(capacity));
        }
        buffer.append(&prelude);
        let code_begin = buffer.cursor();
        buffer.with_writable(|_| {});

        Ok(Self {
            buffer,
            run_code_offset,
            return_from_run_code_offset,
            force_return_offset,
            code_begin,
        })
    }

    pub fn base_addr(&self) -> usize {
        self.buffer.base_addr()
    }

    /// Absolute address the next emitted block will land at.
    pub fn next_block_addr(&self) -> usize {
        self.buffer.base_addr() + self.buffer.cursor()
    }

    pub fn space_remaining(&self) -> usize {
        self.buffer.space_remaining()
    }

    pub fn run_code_fn(&self) -> RunCodeFn {
        unsafe { std::mem::transmute(self.buffer.base_addr() + self.run_code_offset) }
    }

    /// Address emitted code jumps to when handing control back to the
    /// dispatcher.
    pub fn return_from_run_code_addr(&self) -> usize {
        self.buffer.base_addr() + self.return_from_run_code_offset
    }

    /// Address of the collect-ticks-and-return stub.
    pub fn force_return_addr(&self) -> usize {
        self.buffer.base_addr() + self.force_return_offset
    }

    /// Drop every emitted block, keeping the dispatcher stubs.
    pub fn clear_cache(&mut self) {
        self.buffer.rewind_to(self.code_begin);
    }

    /// Publish an assembled block into the buffer; returns its offset.
    pub fn append_block(&mut self, bytes: &[u8]) -> usize {
        self.buffer.with_writable(|buf| buf.append(bytes))
    }

    /// Rewrite a patch slot to target `target` (an absolute address), or
    /// to its unresolved form when `None`.
    pub fn patch(&mut self, kind: PatchKind, site_offset: usize, target: Option<usize>) {
        let site_addr = self.buffer.base_addr() + site_offset;
        let unresolved_rsb = self.return_from_run_code_addr();
        let bytes = encode_patch(kind, site_addr, target, unresolved_rsb);
        self.buffer
            .with_writable(|buf| buf.write_at(site_offset, &bytes[..kind.slot_size()]));
    }
}

/// Encode the bytes of a patch slot. `site_addr` is the absolute address
/// of the slot itself; unresolved jump slots fall through, an unresolved
/// RSB pointer targets the dispatcher.
pub fn encode_patch(
    kind: PatchKind,
    site_addr: usize,
    target: Option<usize>,
    unresolved_rsb_target: usize,
) -> [u8; 10] {
    let mut bytes = [0u8; 10];
    match kind {
        PatchKind::TickCheckJump => {
            let rel = target.map_or(0, |t| t as i64 - (site_addr as i64 + 6)) as i32;
            bytes[0] = 0x0F;
            bytes[1] = 0x8F;
            bytes[2..6].copy_from_slice(&rel.to_le_bytes());
        }
        PatchKind::UnconditionalJump => {
            let rel = target.map_or(0, |t| t as i64 - (site_addr as i64 + 5)) as i32;
            bytes[0] = 0xE9;
            bytes[1..5].copy_from_slice(&rel.to_le_bytes());
        }
        PatchKind::RsbCodePtr => {
            let value = target.unwrap_or(unresolved_rsb_target) as u64;
            bytes[0] = 0x48;
            bytes[1] = 0xB9;
            bytes[2..10].copy_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Emit a patch slot inline during block assembly, returning its offset
/// relative to the block start.
pub fn emit_patch_slot(
    ops: &mut Asm,
    block_base_addr: usize,
    kind: PatchKind,
    target: Option<usize>,
    unresolved_rsb_target: usize,
) -> usize {
    let site = ops.offset().0;
    let bytes = encode_patch(kind, block_base_addr + site, target, unresolved_rsb_target);
    for b in &bytes[..kind.slot_size()] {
        ops.push(*b);
    }
    site
}

/// Emit a raw `jmp rel32` to an absolute address.
pub fn emit_jmp_abs(ops: &mut Asm, block_base_addr: usize, target: usize) {
    let site = ops.offset().0;
    let rel = (target as i64 - (block_base_addr as i64 + site as i64 + 5)) as i32;
    ops.push(0xE9);
    for b in rel.to_le_bytes() {
        ops.push(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_slot_sizes() {
        assert_eq!(PatchKind::TickCheckJump.slot_size(), 6);
        assert_eq!(PatchKind::UnconditionalJump.slot_size(), 5);
        assert_eq!(PatchKind::RsbCodePtr.slot_size(), 10);
    }

    #[test]
    fn test_encode_unresolved_jumps_fall_through() {
        let jg = encode_patch(PatchKind::TickCheckJump, 0x1000, None, 0);
        assert_eq!(&jg[..6], &[0x0F, 0x8F, 0, 0, 0, 0]);
        let jmp = encode_patch(PatchKind::UnconditionalJump, 0x1000, None, 0);
        assert_eq!(&jmp[..5], &[0xE9, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_resolved_displacement() {
        let jmp = encode_patch(PatchKind::UnconditionalJump, 0x1000, Some(0x1105), 0);
        let rel = i32::from_le_bytes([jmp[1], jmp[2], jmp[3], jmp[4]]);
        assert_eq!(rel, 0x100);
    }

    #[test]
    fn test_encode_rsb_pointer_defaults_to_dispatcher() {
        let mov = encode_patch(PatchKind::RsbCodePtr, 0, None, 0xABCD);
        assert_eq!(&mov[..2], &[0x48, 0xB9]);
        assert_eq!(u64::from_le_bytes(mov[2..10].try_into().unwrap()), 0xABCD);
    }

    extern "sysv64" fn stub_lookup(_arg: u64) -> u64 {
        0
    }
    extern "sysv64" fn stub_add_ticks(_arg: u64, _ticks: u64) {}
    extern "sysv64" fn stub_get_ticks(_arg: u64) -> u64 {
        1000
    }

    #[test]
    fn test_prelude_generation() {
        let cb = RunCodeCallbacks {
            arg: 0,
            lookup_block: stub_lookup as usize as u64,
            add_ticks: stub_add_ticks as usize as u64,
            get_ticks_remaining: stub_get_ticks as usize as u64,
        };
        let code = BlockOfCode::new(1 << 20, &cb).unwrap();
        assert!(code.code_begin > 0);
        assert!(code.return_from_run_code_addr() > code.base_addr());
        assert!(code.force_return_addr() > code.return_from_run_code_addr());
        assert_eq!(code.run_code_offset, 0);
    }
}
