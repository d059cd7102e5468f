use dynasmrt::{dynasm, DynamicLabel, DynasmApi, DynasmLabelApi};

use crate::backend::x64::block_of_code::PatchKind;
use crate::backend::x64::emit::EmitContext;
use crate::backend::x64::jit_state::{A32JitState, RSB_PTR_MASK};
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::backend::x64::Asm;
use crate::ir::cond::Cond;
use crate::ir::location::{A32LocationDescriptor, LocationDescriptor};
use crate::ir::terminal::Terminal;

/// Entries in the direct-mapped fast-dispatch table.
pub const FAST_DISPATCH_TABLE_SIZE: usize = 0x10000;

/// Multiplicative hash truncated to the table index width. Shared by the
/// emitted probe and the dispatcher-side fill.
pub const FAST_DISPATCH_HASH_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

pub fn fast_dispatch_index(hash: u64) -> usize {
    (hash.wrapping_mul(FAST_DISPATCH_HASH_MULTIPLIER) >> 48) as usize
}

/// One fast-dispatch slot: a full descriptor for the match check plus
/// the block entry. Invalid slots hold `u64::MAX`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FastDispatchEntry {
    pub location: u64,
    pub code_ptr: u64,
}

const N_BIT: i32 = 0x8000_0000u32 as i32;
const Z_BIT: i32 = 0x4000_0000;
const C_BIT: i32 = 0x2000_0000;
const V_BIT: i32 = 0x1000_0000;

/// Emit a branch to `fail` taken when `cond` fails against the guest
/// NZCV. Clobbers RAX and RCX; only used at block boundaries where no
/// values are live.
pub fn emit_cond_fail_jump(ops: &mut Asm, cond: Cond, fail: DynamicLabel) {
    let nzcv_off = A32JitState::offset_of_cpsr_nzcv() as i32;
    dynasm!(ops ; .arch x64 ; mov eax, [r15 + nzcv_off]);

    match cond {
        Cond::EQ => dynasm!(ops ; .arch x64 ; test eax, Z_BIT ; jz =>fail),
        Cond::NE => dynasm!(ops ; .arch x64 ; test eax, Z_BIT ; jnz =>fail),
        Cond::CS => dynasm!(ops ; .arch x64 ; test eax, C_BIT ; jz =>fail),
        Cond::CC => dynasm!(ops ; .arch x64 ; test eax, C_BIT ; jnz =>fail),
        Cond::MI => dynasm!(ops ; .arch x64 ; test eax, N_BIT ; jz =>fail),
        Cond::PL => dynasm!(ops ; .arch x64 ; test eax, N_BIT ; jnz =>fail),
        Cond::VS => dynasm!(ops ; .arch x64 ; test eax, V_BIT ; jz =>fail),
        Cond::VC => dynasm!(ops ; .arch x64 ; test eax, V_BIT ; jnz =>fail),
        Cond::HI => dynasm!(ops
            ; .arch x64
            ; mov ecx, eax
            ; and ecx, (C_BIT | Z_BIT)
            ; cmp ecx, C_BIT
            ; jne =>fail
        ),
        Cond::LS => dynasm!(ops
            ; .arch x64
            ; mov ecx, eax
            ; and ecx, (C_BIT | Z_BIT)
            ; cmp ecx, C_BIT
            ; je =>fail
        ),
        // N == V iff bit 31 of (nzcv ^ (nzcv << 3)) is clear.
        Cond::GE => dynasm!(ops
            ; .arch x64
            ; mov ecx, eax
            ; shl ecx, 3
            ; xor ecx, eax
            ; test ecx, N_BIT
            ; jnz =>fail
        ),
        Cond::LT => dynasm!(ops
            ; .arch x64
            ; mov ecx, eax
            ; shl ecx, 3
            ; xor ecx, eax
            ; test ecx, N_BIT
            ; jz =>fail
        ),
        Cond::GT => dynasm!(ops
            ; .arch x64
            ; test eax, Z_BIT
            ; jnz =>fail
            ; mov ecx, eax
            ; shl ecx, 3
            ; xor ecx, eax
            ; test ecx, N_BIT
            ; jnz =>fail
        ),
        Cond::LE => dynasm!(ops
            ; .arch x64
            ; test eax, Z_BIT
            ; jnz >le_pass
            ; mov ecx, eax
            ; shl ecx, 3
            ; xor ecx, eax
            ; test ecx, N_BIT
            ; jz =>fail
            ; le_pass:
        ),
        Cond::AL | Cond::NV => {}
    }
}

/// Emit code for a block terminal.
pub fn emit_terminal(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>, terminal: &Terminal) {
    match terminal {
        Terminal::Invalid => {
            // An unset terminal is an internal invariant violation.
            dynasm!(ra.asm ; .arch x64 ; int3);
        }
        Terminal::Interpret {
            next,
            num_instructions,
        } => emit_interpret(ctx, ra, *next, *num_instructions),
        Terminal::ReturnToDispatch => {
            ctx.jmp_dispatch(ra.asm);
        }
        Terminal::LinkBlock { next } => emit_link_block(ctx, ra, *next, true),
        Terminal::LinkBlockFast { next } => emit_link_block(ctx, ra, *next, false),
        Terminal::PopRSBHint => emit_pop_rsb_hint(ctx, ra),
        Terminal::FastDispatchHint => emit_fast_dispatch_hint(ctx, ra),
        Terminal::If { cond, then_, else_ } => {
            let else_label = ra.asm.new_dynamic_label();
            emit_cond_fail_jump(ra.asm, *cond, else_label);
            emit_terminal(ctx, ra, then_);
            dynasm!(ra.asm ; .arch x64 ; =>else_label);
            emit_terminal(ctx, ra, else_);
        }
        Terminal::CheckBit { then_, else_ } => {
            let check_off = A32JitState::offset_of_check_bit() as i32;
            let else_label = ra.asm.new_dynamic_label();
            dynasm!(ra.asm
                ; .arch x64
                ; cmp DWORD [r15 + check_off], 0
                ; jz =>else_label
            );
            emit_terminal(ctx, ra, then_);
            dynasm!(ra.asm ; .arch x64 ; =>else_label);
            emit_terminal(ctx, ra, else_);
        }
        Terminal::CheckHalt { else_ } => {
            let halt_off = A32JitState::offset_of_halt_reason() as i32;
            let continue_label = ra.asm.new_dynamic_label();
            dynasm!(ra.asm
                ; .arch x64
                ; cmp DWORD [r15 + halt_off], 0
                ; jz =>continue_label
            );
            ctx.jmp_dispatch(ra.asm);
            dynasm!(ra.asm ; .arch x64 ; =>continue_label);
            emit_terminal(ctx, ra, else_);
        }
    }
}

/// Store the architectural continuation point for the dispatcher's
/// cache lookup.
fn store_next_location(ra: &mut RegAlloc<'_>, next: LocationDescriptor) {
    let a32 = A32LocationDescriptor::from_location(next);
    let pc_off = A32JitState::offset_of_reg(15) as i32;
    let upper_off = A32JitState::offset_of_upper_location_descriptor() as i32;
    let pc = a32.pc() as i32;
    let upper = a32.upper_location_descriptor() as i32;
    dynasm!(ra.asm
        ; .arch x64
        ; mov DWORD [r15 + pc_off], pc
        ; mov DWORD [r15 + upper_off], upper
    );
}

/// LinkBlock: when the tick budget allows (or unconditionally for the
/// fast variant), jump straight to the target block through a patchable
/// slot; otherwise store the continuation and return to the dispatcher.
fn emit_link_block(
    ctx: &mut EmitContext<'_>,
    ra: &mut RegAlloc<'_>,
    next: LocationDescriptor,
    check_ticks: bool,
) {
    if ctx.cfg.enable_block_linking {
        if check_ticks {
            let remaining_off = A32JitState::offset_of_cycles_remaining() as i32;
            dynasm!(ra.asm
                ; .arch x64
                ; cmp QWORD [r15 + remaining_off], 0
            );
            ctx.patch_slot(ra.asm, PatchKind::TickCheckJump, next);
        } else {
            ctx.patch_slot(ra.asm, PatchKind::UnconditionalJump, next);
        }
    }
    store_next_location(ra, next);
    ctx.jmp_dispatch(ra.asm);
}

/// PopRSBHint: compare the top RSB entry against the current guest
/// location; jump to its code pointer on a hit, else fall back to the
/// dispatcher.
fn emit_pop_rsb_hint(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>) {
    if !ctx.cfg.enable_rsb || !ctx.cfg.enable_block_linking {
        ctx.jmp_dispatch(ra.asm);
        return;
    }

    let pc_off = A32JitState::offset_of_reg(15) as i32;
    let upper_off = A32JitState::offset_of_upper_location_descriptor() as i32;
    let ptr_off = A32JitState::offset_of_rsb_ptr() as i32;
    let locs_off = A32JitState::offset_of_rsb_location_descriptors() as i32;
    let ptrs_off = A32JitState::offset_of_rsb_codeptrs() as i32;

    let ptr_mask = RSB_PTR_MASK as i32;
    let miss = ra.asm.new_dynamic_label();
    dynasm!(ra.asm
        ; .arch x64
        ; mov eax, [r15 + pc_off]
        ; mov ecx, [r15 + upper_off]
        ; shl rcx, 32
        ; or rax, rcx
        ; mov ecx, [r15 + ptr_off]
        ; sub ecx, 1
        ; and ecx, ptr_mask
        ; mov [r15 + ptr_off], ecx
        ; cmp rax, [r15 + rcx * 8 + locs_off]
        ; jne =>miss
        ; jmp QWORD [r15 + rcx * 8 + ptrs_off]
        ; =>miss
    );
    ctx.jmp_dispatch(ra.asm);
}

/// FastDispatchHint: probe the direct-mapped table before falling back
/// to the dispatcher.
fn emit_fast_dispatch_hint(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>) {
    if !ctx.cfg.enable_fast_dispatch || ctx.cfg.fast_dispatch_table_addr == 0 {
        ctx.jmp_dispatch(ra.asm);
        return;
    }

    let pc_off = A32JitState::offset_of_reg(15) as i32;
    let upper_off = A32JitState::offset_of_upper_location_descriptor() as i32;
    let table = ctx.cfg.fast_dispatch_table_addr;

    let multiplier = FAST_DISPATCH_HASH_MULTIPLIER as i64;
    let table = table as i64;
    let miss = ra.asm.new_dynamic_label();
    dynasm!(ra.asm
        ; .arch x64
        ; mov eax, [r15 + pc_off]
        ; mov ecx, [r15 + upper_off]
        ; shl rcx, 32
        ; or rax, rcx
        ; mov rcx, QWORD multiplier
        ; imul rcx, rax
        ; shr rcx, 48
        ; shl rcx, 4
        ; mov rdx, QWORD table
        ; cmp rax, [rdx + rcx]
        ; jne =>miss
        ; jmp QWORD [rdx + rcx + 8]
        ; =>miss
    );
    ctx.jmp_dispatch(ra.asm);
}

/// Interpret: hand `num_instructions` starting at `next` to the
/// embedder's interpreter fallback, then return to the dispatcher.
fn emit_interpret(
    ctx: &mut EmitContext<'_>,
    ra: &mut RegAlloc<'_>,
    next: LocationDescriptor,
    num_instructions: usize,
) {
    store_next_location(ra, next);
    let a32 = A32LocationDescriptor::from_location(next);
    let cb = ctx.cfg.callbacks;
    let pc = a32.pc() as i32;
    let count = num_instructions as i32;
    let arg = cb.arg as i64;
    let fallback = cb.interpreter_fallback as i64;
    dynasm!(ra.asm
        ; .arch x64
        ; mov rdi, QWORD arg
        ; mov esi, pc
        ; mov edx, count
        ; mov rax, QWORD fallback
        ; call rax
    );
    ctx.jmp_dispatch(ra.asm);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_dispatch_index_is_table_sized() {
        for hash in [0u64, 1, 0xDEAD_BEEF, u64::MAX, 0x0000_0001_0000_0000] {
            assert!(fast_dispatch_index(hash) < FAST_DISPATCH_TABLE_SIZE);
        }
    }

    #[test]
    fn test_fast_dispatch_index_spreads_nearby_pcs() {
        let a = fast_dispatch_index(0x1000);
        let b = fast_dispatch_index(0x1004);
        assert_ne!(a, b);
    }
}
