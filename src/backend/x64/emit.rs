use dynasmrt::{dynasm, DynasmApi, DynasmLabelApi};
use tracing::trace;

use crate::backend::x64::block_of_code::{
    emit_jmp_abs, emit_patch_slot, BlockOfCode, PatchKind,
};
use crate::backend::x64::emit_terminal::{emit_cond_fail_jump, emit_terminal};
use crate::backend::x64::helpers;
use crate::backend::x64::jit_state::{A32JitState, RSB_PTR_MASK};
use crate::backend::x64::reg_alloc::{CallArg, RegAlloc};
use crate::backend::x64::{abi, Asm};
use crate::ir::block::Block;
use crate::ir::location::LocationDescriptor;
use crate::ir::opcode::Opcode;
use crate::ir::terminal::Terminal;
use crate::ir::value::{InstRef, Value};

/// Host-call entry points into the embedder, devirtualized to raw
/// function addresses plus a common first argument.
#[derive(Clone, Copy)]
pub struct EmitCallbacks {
    pub arg: u64,
    pub memory_read_8: u64,
    pub memory_read_16: u64,
    pub memory_read_32: u64,
    pub memory_read_64: u64,
    pub memory_write_8: u64,
    pub memory_write_16: u64,
    pub memory_write_32: u64,
    pub memory_write_64: u64,
    pub call_svc: u64,
    pub exception_raised: u64,
    pub interpreter_fallback: u64,
}

/// Per-instance emission configuration.
pub struct EmitConfig {
    pub callbacks: EmitCallbacks,
    /// Base address of the fast-dispatch table, or 0 when disabled.
    pub fast_dispatch_table_addr: u64,
    pub enable_block_linking: bool,
    pub enable_rsb: bool,
    pub enable_fast_dispatch: bool,
}

/// A patchable link site recorded during emission. Offsets are relative
/// to the block start until the cache registers the block.
#[derive(Debug, Clone)]
pub struct PatchEntry {
    pub kind: PatchKind,
    pub offset: usize,
    pub target: LocationDescriptor,
}

/// Result of emitting one block.
pub struct EmittedBlockInfo {
    pub entrypoint_offset: usize,
    pub size: usize,
    pub patches: Vec<PatchEntry>,
}

pub struct EmitContext<'c> {
    pub cfg: &'c EmitConfig,
    pub block: &'c Block,
    /// Absolute address the block is being assembled for.
    pub block_base: usize,
    /// Absolute address of the dispatcher re-entry stub.
    pub rfrc_addr: usize,
    pub patches: Vec<PatchEntry>,
    pub lookup_entry: &'c dyn Fn(LocationDescriptor) -> Option<usize>,
}

impl EmitContext<'_> {
    /// Record and emit a patchable slot for `target`.
    pub fn patch_slot(&mut self, ops: &mut Asm, kind: PatchKind, target: LocationDescriptor) {
        let resolved = (self.lookup_entry)(target);
        let offset = emit_patch_slot(ops, self.block_base, kind, resolved, self.rfrc_addr);
        self.patches.push(PatchEntry {
            kind,
            offset,
            target,
        });
    }

    pub fn jmp_dispatch(&self, ops: &mut Asm) {
        emit_jmp_abs(ops, self.block_base, self.rfrc_addr);
    }
}

/// Emit a translated block into the code buffer and return its record.
pub fn emit_block(
    code: &mut BlockOfCode,
    cfg: &EmitConfig,
    block: &Block,
    lookup_entry: &dyn Fn(LocationDescriptor) -> Option<usize>,
) -> EmittedBlockInfo {
    let block_base = code.next_block_addr();
    let mut ops = Asm::new(block_base);
    let mut ctx = EmitContext {
        cfg,
        block,
        block_base,
        rfrc_addr: code.return_from_run_code_addr(),
        patches: Vec::new(),
        lookup_entry,
    };

    {
        let mut ra = RegAlloc::new(&mut ops, block);

        // Account for the block's tick cost up front.
        let remaining_off = A32JitState::offset_of_cycles_remaining() as i32;
        let cycles = block.cycle_count as i32;
        dynasm!(ra.asm ; .arch x64 ; sub QWORD [r15 + remaining_off], cycles);

        // Conditional blocks branch around the body when the condition
        // fails, resuming at the condition-failed location.
        let cond_fail = block.cond.and_then(|cond| {
            if cond == crate::ir::cond::Cond::AL {
                return None;
            }
            let label = ra.asm.new_dynamic_label();
            emit_cond_fail_jump(ra.asm, cond, label);
            Some(label)
        });

        for (inst_ref, inst) in block.iter_live() {
            if inst.opcode.is_pseudo_operation() {
                continue;
            }
            emit_inst(&mut ctx, &mut ra, inst_ref, inst.opcode);
            ra.end_of_op();
        }

        emit_terminal(&mut ctx, &mut ra, &block.terminal);

        if let Some(label) = cond_fail {
            dynasm!(ra.asm ; .arch x64 ; =>label);
            let next = block
                .cond_failed_location
                .expect("conditional block without a condition-failed location");
            emit_terminal(&mut ctx, &mut ra, &Terminal::LinkBlock { next });
        }
    }

    let bytes = ops.finalize().expect("block assembly failed");
    let entrypoint_offset = code.append_block(&bytes);

    let mut patches = ctx.patches;
    for patch in &mut patches {
        patch.offset += entrypoint_offset;
    }

    trace!(
        location = %block.location,
        offset = entrypoint_offset,
        size = bytes.len(),
        "emitted block"
    );
    EmittedBlockInfo {
        entrypoint_offset,
        size: bytes.len(),
        patches,
    }
}

fn imm_u32(value: Value) -> Option<u32> {
    match value {
        Value::ImmU32(v) => Some(v),
        Value::ImmU16(v) => Some(v as u32),
        Value::ImmU8(v) => Some(v as u32),
        Value::ImmU1(v) => Some(v as u32),
        _ => None,
    }
}

/// Define a U1 pseudo-op result out of a setcc, if anything uses it.
fn define_flag_from_cc(ra: &mut RegAlloc<'_>, pseudo: Option<InstRef>, cc: FlagCc) {
    let Some(pseudo) = pseudo else { return };
    let reg = ra.def_gpr(pseudo);
    match cc {
        FlagCc::Carry => dynasm!(ra.asm ; .arch x64 ; setc Rb(reg)),
        FlagCc::NotCarry => dynasm!(ra.asm ; .arch x64 ; setnc Rb(reg)),
        FlagCc::Overflow => dynasm!(ra.asm ; .arch x64 ; seto Rb(reg)),
    }
    dynasm!(ra.asm ; .arch x64 ; movzx Rd(reg), Rb(reg));
}

#[derive(Clone, Copy)]
enum FlagCc {
    Carry,
    NotCarry,
    Overflow,
}

/// Load a U1 value into the host carry flag.
fn load_carry_flag(ra: &mut RegAlloc<'_>, carry_in: Value) {
    let c = ra.use_gpr(carry_in);
    dynasm!(ra.asm ; .arch x64 ; bt Rd(c), 0);
}

fn emit_inst(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>, inst_ref: InstRef, opcode: Opcode) {
    let inst = ctx.block.get(inst_ref);
    let args = inst.args;
    let cb = ctx.cfg.callbacks;

    match opcode {
        Opcode::Void => {}
        Opcode::Identity => {
            let s = ra.use_gpr(args[0]);
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rq(d), Rq(s));
        }

        // --- Guest register file ---
        Opcode::A32GetRegister => {
            let off = A32JitState::offset_of_reg(args[0].get_reg().number()) as i32;
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rd(d), [r15 + off]);
        }
        Opcode::A32SetRegister => {
            let off = A32JitState::offset_of_reg(args[0].get_reg().number()) as i32;
            if let Some(imm) = imm_u32(args[1]) {
                dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], imm as i32);
            } else {
                let s = ra.use_gpr(args[1]);
                dynasm!(ra.asm ; .arch x64 ; mov [r15 + off], Rd(s));
            }
        }
        Opcode::A32GetExtendedRegister32 => {
            let off = A32JitState::offset_of_ext_reg(args[0].get_ext_reg().backing_index()) as i32;
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rd(d), [r15 + off]);
        }
        Opcode::A32SetExtendedRegister32 => {
            let off = A32JitState::offset_of_ext_reg(args[0].get_ext_reg().backing_index()) as i32;
            if let Some(imm) = imm_u32(args[1]) {
                dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], imm as i32);
            } else {
                let s = ra.use_gpr(args[1]);
                dynasm!(ra.asm ; .arch x64 ; mov [r15 + off], Rd(s));
            }
        }
        Opcode::A32GetExtendedRegister64 => {
            let off = A32JitState::offset_of_ext_reg(args[0].get_ext_reg().backing_index()) as i32;
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rq(d), [r15 + off]);
        }
        Opcode::A32SetExtendedRegister64 => {
            let off = A32JitState::offset_of_ext_reg(args[0].get_ext_reg().backing_index()) as i32;
            let s = ra.use_gpr(args[1]);
            dynasm!(ra.asm ; .arch x64 ; mov [r15 + off], Rq(s));
        }

        // --- Flags ---
        Opcode::A32GetCFlag => {
            let off = A32JitState::offset_of_cpsr_nzcv() as i32;
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm
                ; .arch x64
                ; mov Rd(d), [r15 + off]
                ; shr Rd(d), 29
                ; and Rd(d), 1
            );
        }
        Opcode::A32SetNFlag => emit_set_flag(ra, args[0], 31),
        Opcode::A32SetZFlag => emit_set_flag(ra, args[0], 30),
        Opcode::A32SetCFlag => emit_set_flag(ra, args[0], 29),
        Opcode::A32SetVFlag => emit_set_flag(ra, args[0], 28),
        Opcode::A32OrQFlag => {
            let off = A32JitState::offset_of_cpsr_q() as i32;
            match args[0] {
                Value::ImmU1(false) => {}
                Value::ImmU1(true) => {
                    dynasm!(ra.asm ; .arch x64 ; or DWORD [r15 + off], 0x0800_0000);
                }
                value => {
                    let s = ra.use_scratch_gpr(value);
                    dynasm!(ra.asm
                        ; .arch x64
                        ; shl Rd(s), 27
                        ; or [r15 + off], Rd(s)
                    );
                }
            }
        }
        Opcode::A32GetGEFlags => {
            let off = A32JitState::offset_of_cpsr_ge() as i32;
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rd(d), [r15 + off]);
        }
        Opcode::A32SetGEFlags => {
            let off = A32JitState::offset_of_cpsr_ge() as i32;
            if let Some(imm) = imm_u32(args[0]) {
                dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], (imm & 0xF) as i32);
            } else {
                let s = ra.use_gpr(args[0]);
                dynasm!(ra.asm ; .arch x64 ; mov [r15 + off], Rd(s));
            }
        }
        Opcode::A32GetCpsr => {
            ra.host_call(
                Some(inst_ref),
                helpers::get_cpsr as usize as u64,
                &[CallArg::StatePtr],
            );
        }
        Opcode::A32SetCpsr => {
            ra.host_call(
                None,
                helpers::set_cpsr as usize as u64,
                &[CallArg::StatePtr, CallArg::Val(args[0])],
            );
        }
        Opcode::A32SetCpsrNZCVRaw => {
            let off = A32JitState::offset_of_cpsr_nzcv() as i32;
            let nzcv_mask = 0xF000_0000u32 as i32;
            if let Some(imm) = imm_u32(args[0]) {
                let imm = (imm & 0xF000_0000) as i32;
                dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], imm);
            } else {
                let s = ra.use_scratch_gpr(args[0]);
                dynasm!(ra.asm
                    ; .arch x64
                    ; and Rd(s), nzcv_mask
                    ; mov [r15 + off], Rd(s)
                );
            }
        }
        Opcode::A32GetFpscr => {
            ra.host_call(
                Some(inst_ref),
                helpers::get_fpscr as usize as u64,
                &[CallArg::StatePtr],
            );
        }
        Opcode::A32SetFpscr => {
            ra.host_call(
                None,
                helpers::set_fpscr as usize as u64,
                &[CallArg::StatePtr, CallArg::Val(args[0])],
            );
        }
        Opcode::A32GetFpscrNZCV => {
            let off = A32JitState::offset_of_fpscr_nzcv() as i32;
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rd(d), [r15 + off]);
        }
        Opcode::A32SetFpscrNZCV => {
            let off = A32JitState::offset_of_fpscr_nzcv() as i32;
            let nzcv_mask = 0xF000_0000u32 as i32;
            let s = ra.use_scratch_gpr(args[0]);
            dynasm!(ra.asm
                ; .arch x64
                ; and Rd(s), nzcv_mask
                ; mov [r15 + off], Rd(s)
            );
        }

        // --- PC and dispatch state ---
        Opcode::A32BXWritePC => emit_bx_write_pc(ra, args[0]),
        Opcode::A32UpdateUpperLocationDescriptor => {
            let off = A32JitState::offset_of_upper_location_descriptor() as i32;
            let imm = args[0].get_u32();
            dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], imm as i32);
        }
        Opcode::A32PushRSB => {
            if ctx.cfg.enable_rsb && ctx.cfg.enable_block_linking {
                emit_push_rsb(ctx, ra, args[0].get_u64());
            }
        }
        Opcode::A32SetCheckBit => {
            let off = A32JitState::offset_of_check_bit() as i32;
            if let Some(imm) = imm_u32(args[0]) {
                dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], imm as i32);
            } else {
                let s = ra.use_gpr(args[0]);
                dynasm!(ra.asm ; .arch x64 ; mov [r15 + off], Rd(s));
            }
        }

        // --- System ---
        Opcode::A32CallSupervisor => {
            ra.host_call(
                None,
                cb.call_svc,
                &[CallArg::Imm(cb.arg), CallArg::Val(args[0])],
            );
        }
        Opcode::A32ExceptionRaised => {
            let pc = args[0].get_u32();
            let kind = args[1].get_u64();
            let off = A32JitState::offset_of_reg(15) as i32;
            dynasm!(ra.asm ; .arch x64 ; mov DWORD [r15 + off], pc as i32);
            ra.host_call(
                None,
                cb.exception_raised,
                &[CallArg::Imm(cb.arg), CallArg::Imm(pc as u64), CallArg::Imm(kind)],
            );
        }

        // --- Memory ---
        Opcode::ReadMemory8 => {
            ra.host_call(Some(inst_ref), cb.memory_read_8, &[CallArg::Imm(cb.arg), CallArg::Val(args[0])]);
        }
        Opcode::ReadMemory16 => {
            ra.host_call(Some(inst_ref), cb.memory_read_16, &[CallArg::Imm(cb.arg), CallArg::Val(args[0])]);
        }
        Opcode::ReadMemory32 => {
            ra.host_call(Some(inst_ref), cb.memory_read_32, &[CallArg::Imm(cb.arg), CallArg::Val(args[0])]);
        }
        Opcode::ReadMemory64 => {
            ra.host_call(Some(inst_ref), cb.memory_read_64, &[CallArg::Imm(cb.arg), CallArg::Val(args[0])]);
        }
        Opcode::WriteMemory8 => {
            ra.host_call(None, cb.memory_write_8, &[CallArg::Imm(cb.arg), CallArg::Val(args[0]), CallArg::Val(args[1])]);
        }
        Opcode::WriteMemory16 => {
            ra.host_call(None, cb.memory_write_16, &[CallArg::Imm(cb.arg), CallArg::Val(args[0]), CallArg::Val(args[1])]);
        }
        Opcode::WriteMemory32 => {
            ra.host_call(None, cb.memory_write_32, &[CallArg::Imm(cb.arg), CallArg::Val(args[0]), CallArg::Val(args[1])]);
        }
        Opcode::WriteMemory64 => {
            ra.host_call(None, cb.memory_write_64, &[CallArg::Imm(cb.arg), CallArg::Val(args[0]), CallArg::Val(args[1])]);
        }

        // --- Width transfers ---
        Opcode::Pack2x32To1x64 => {
            let h = ra.use_scratch_gpr(args[1]);
            let lo = ra.use_gpr(args[0]);
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm
                ; .arch x64
                ; mov Rd(d), Rd(lo)
                ; shl Rq(h), 32
                ; or Rq(d), Rq(h)
            );
        }
        Opcode::LeastSignificantWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rd(d), Rd(d));
        }
        Opcode::MostSignificantWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; shr Rq(d), 32);
        }
        Opcode::LeastSignificantHalf => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movzx Rd(d), Rw(d));
        }
        Opcode::LeastSignificantByte => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movzx Rd(d), Rb(d));
        }
        Opcode::MostSignificantBit => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; shr Rd(d), 31);
        }
        Opcode::IsZero32 => {
            let s = ra.use_gpr(args[0]);
            let d = ra.def_gpr(inst_ref);
            dynasm!(ra.asm
                ; .arch x64
                ; xor Rd(d), Rd(d)
                ; test Rd(s), Rd(s)
                ; sete Rb(d)
            );
        }

        // --- Logic ---
        Opcode::And32 => emit_logic(ra, inst_ref, args, LogicOp::And),
        Opcode::Or32 => emit_logic(ra, inst_ref, args, LogicOp::Or),
        Opcode::Eor32 => emit_logic(ra, inst_ref, args, LogicOp::Xor),
        Opcode::Not32 => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; not Rd(d));
        }

        // --- Shifts ---
        Opcode::LogicalShiftLeft32
        | Opcode::LogicalShiftRight32
        | Opcode::ArithmeticShiftRight32
        | Opcode::RotateRight32 => emit_shift(ctx, ra, inst_ref, opcode),
        Opcode::RotateRightExtended => {
            let carry_out = ctx.block.find_pseudo_op(inst_ref, Opcode::GetCarryFromOp);
            load_carry_flag(ra, args[1]);
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; rcr Rd(d), 1);
            define_flag_from_cc(ra, carry_out, FlagCc::Carry);
        }

        // --- Arithmetic ---
        Opcode::Add32 => emit_add_sub(ctx, ra, inst_ref, true),
        Opcode::Sub32 => emit_add_sub(ctx, ra, inst_ref, false),
        Opcode::Mul32 => {
            let d = ra.use_scratch_gpr(args[0]);
            if let Some(imm) = imm_u32(args[1]) {
                dynasm!(ra.asm ; .arch x64 ; imul Rd(d), Rd(d), imm as i32);
            } else {
                let s = ra.use_gpr(args[1]);
                dynasm!(ra.asm ; .arch x64 ; imul Rd(d), Rd(s));
            }
            ra.bind_result(d, inst_ref);
        }
        Opcode::Mul64 => {
            let d = ra.use_scratch_gpr(args[0]);
            let s = ra.use_gpr(args[1]);
            dynasm!(ra.asm ; .arch x64 ; imul Rq(d), Rq(s));
            ra.bind_result(d, inst_ref);
        }
        Opcode::SignedDiv32 => {
            emit_helper_2(ra, inst_ref, helpers::sdiv_32 as usize as u64, args[0], args[1]);
        }
        Opcode::UnsignedDiv32 => {
            emit_helper_2(ra, inst_ref, helpers::udiv_32 as usize as u64, args[0], args[1]);
        }

        // --- Extension ---
        Opcode::SignExtendByteToWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movsx Rd(d), Rb(d));
        }
        Opcode::SignExtendHalfToWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movsx Rd(d), Rw(d));
        }
        Opcode::SignExtendWordToLong => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movsxd Rq(d), Rd(d));
        }
        Opcode::ZeroExtendByteToWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movzx Rd(d), Rb(d));
        }
        Opcode::ZeroExtendHalfToWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; movzx Rd(d), Rw(d));
        }
        Opcode::ZeroExtendWordToLong => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; mov Rd(d), Rd(d));
        }

        // --- Bit manipulation ---
        Opcode::ByteReverseWord => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; bswap Rd(d));
        }
        Opcode::ByteReverseHalf => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; ror Rw(d), 8);
        }
        Opcode::CountLeadingZeros => {
            emit_helper_1(ra, inst_ref, helpers::clz_32 as usize as u64, args[0]);
        }

        // --- Saturation ---
        Opcode::SignedSaturatedAdd32 => {
            emit_flagged_helper_2(
                ctx, ra, inst_ref,
                helpers::signed_saturated_add_32 as usize as u64,
                args[0], args[1],
                Opcode::GetOverflowFromOp,
            );
        }
        Opcode::SignedSaturatedSub32 => {
            emit_flagged_helper_2(
                ctx, ra, inst_ref,
                helpers::signed_saturated_sub_32 as usize as u64,
                args[0], args[1],
                Opcode::GetOverflowFromOp,
            );
        }
        Opcode::SignedSaturation => {
            emit_flagged_helper_2(
                ctx, ra, inst_ref,
                helpers::signed_saturation as usize as u64,
                args[0], args[1],
                Opcode::GetOverflowFromOp,
            );
        }
        Opcode::UnsignedSaturation => {
            emit_flagged_helper_2(
                ctx, ra, inst_ref,
                helpers::unsigned_saturation as usize as u64,
                args[0], args[1],
                Opcode::GetOverflowFromOp,
            );
        }

        // --- Packed arithmetic ---
        Opcode::PackedSelect => {
            ra.host_call(
                Some(inst_ref),
                helpers::packed_select as usize as u64,
                &[CallArg::Val(args[0]), CallArg::Val(args[1]), CallArg::Val(args[2])],
            );
        }
        op if packed_helper(op).is_some() => {
            let f = packed_helper(op).unwrap();
            emit_flagged_helper_2(ctx, ra, inst_ref, f, args[0], args[1], Opcode::GetGEFromOp);
        }

        // --- Scalar floating point ---
        Opcode::FPAbs32 => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; and Rd(d), 0x7FFF_FFFF);
        }
        Opcode::FPNeg32 => {
            let sign_bit = 0x8000_0000u32 as i32;
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; xor Rd(d), sign_bit);
        }
        Opcode::FPAbs64 => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; btr Rq(d), 63);
        }
        Opcode::FPNeg64 => {
            let d = ra.use_def_gpr(args[0], inst_ref);
            dynasm!(ra.asm ; .arch x64 ; btc Rq(d), 63);
        }
        Opcode::FPAdd32 => emit_fp_binary(ra, inst_ref, helpers::fp_add_32 as usize as u64, args),
        Opcode::FPAdd64 => emit_fp_binary(ra, inst_ref, helpers::fp_add_64 as usize as u64, args),
        Opcode::FPSub32 => emit_fp_binary(ra, inst_ref, helpers::fp_sub_32 as usize as u64, args),
        Opcode::FPSub64 => emit_fp_binary(ra, inst_ref, helpers::fp_sub_64 as usize as u64, args),
        Opcode::FPMul32 => emit_fp_binary(ra, inst_ref, helpers::fp_mul_32 as usize as u64, args),
        Opcode::FPMul64 => emit_fp_binary(ra, inst_ref, helpers::fp_mul_64 as usize as u64, args),
        Opcode::FPDiv32 => emit_fp_binary(ra, inst_ref, helpers::fp_div_32 as usize as u64, args),
        Opcode::FPDiv64 => emit_fp_binary(ra, inst_ref, helpers::fp_div_64 as usize as u64, args),
        Opcode::FPSqrt32 => {
            ra.host_call(
                Some(inst_ref),
                helpers::fp_sqrt_32 as usize as u64,
                &[CallArg::StatePtr, CallArg::Val(args[0])],
            );
        }
        Opcode::FPSqrt64 => {
            ra.host_call(
                Some(inst_ref),
                helpers::fp_sqrt_64 as usize as u64,
                &[CallArg::StatePtr, CallArg::Val(args[0])],
            );
        }
        Opcode::FPCompare32 => {
            ra.host_call(
                Some(inst_ref),
                helpers::fp_compare_32 as usize as u64,
                &[CallArg::StatePtr, CallArg::Val(args[0]), CallArg::Val(args[1]), CallArg::Val(args[2])],
            );
        }
        Opcode::FPCompare64 => {
            ra.host_call(
                Some(inst_ref),
                helpers::fp_compare_64 as usize as u64,
                &[CallArg::StatePtr, CallArg::Val(args[0]), CallArg::Val(args[1]), CallArg::Val(args[2])],
            );
        }

        Opcode::GetCarryFromOp | Opcode::GetOverflowFromOp | Opcode::GetGEFromOp => {
            unreachable!("pseudo-operations are emitted with their parent op")
        }

        other => unreachable!("no emitter for opcode {other:?}"),
    }
}

#[derive(Clone, Copy)]
enum LogicOp {
    And,
    Or,
    Xor,
}

fn emit_logic(ra: &mut RegAlloc<'_>, inst_ref: InstRef, args: [Value; 4], op: LogicOp) {
    let d = ra.use_scratch_gpr(args[0]);
    if let Some(imm) = imm_u32(args[1]) {
        match op {
            LogicOp::And => dynasm!(ra.asm ; .arch x64 ; and Rd(d), imm as i32),
            LogicOp::Or => dynasm!(ra.asm ; .arch x64 ; or Rd(d), imm as i32),
            LogicOp::Xor => dynasm!(ra.asm ; .arch x64 ; xor Rd(d), imm as i32),
        }
    } else {
        let s = ra.use_gpr(args[1]);
        match op {
            LogicOp::And => dynasm!(ra.asm ; .arch x64 ; and Rd(d), Rd(s)),
            LogicOp::Or => dynasm!(ra.asm ; .arch x64 ; or Rd(d), Rd(s)),
            LogicOp::Xor => dynasm!(ra.asm ; .arch x64 ; xor Rd(d), Rd(s)),
        }
    }
    ra.bind_result(d, inst_ref);
}

/// Add32/Sub32 with their carry and overflow pseudo-ops.
///
/// A32 subtraction is `a + NOT(b) + carry`: the host borrow flag is the
/// inverse of the A32 carry, so the carry-in is complemented on the way
/// in and the carry-out on the way out.
fn emit_add_sub(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>, inst_ref: InstRef, is_add: bool) {
    let inst = ctx.block.get(inst_ref);
    let args = inst.args;
    let carry_out = ctx.block.find_pseudo_op(inst_ref, Opcode::GetCarryFromOp);
    let overflow_out = ctx.block.find_pseudo_op(inst_ref, Opcode::GetOverflowFromOp);

    enum CarrySetup {
        None,
        WithCarry,
    }

    // Establish the host carry flag, then pick add/adc or sub/sbb.
    let setup = match (is_add, args[2]) {
        (true, Value::ImmU1(false)) => CarrySetup::None,
        (false, Value::ImmU1(true)) => CarrySetup::None,
        (true, Value::ImmU1(true)) => {
            dynasm!(ra.asm ; .arch x64 ; stc);
            CarrySetup::WithCarry
        }
        (false, Value::ImmU1(false)) => {
            dynasm!(ra.asm ; .arch x64 ; stc);
            CarrySetup::WithCarry
        }
        (_, carry_in) => {
            load_carry_flag(ra, carry_in);
            if !is_add {
                dynasm!(ra.asm ; .arch x64 ; cmc);
            }
            CarrySetup::WithCarry
        }
    };

    let d = ra.use_scratch_gpr(args[0]);
    let imm = imm_u32(args[1]);
    match (is_add, &setup, imm) {
        (true, CarrySetup::None, Some(imm)) => {
            dynasm!(ra.asm ; .arch x64 ; add Rd(d), imm as i32)
        }
        (true, CarrySetup::None, None) => {
            let s = ra.use_gpr(args[1]);
            dynasm!(ra.asm ; .arch x64 ; add Rd(d), Rd(s))
        }
        (true, CarrySetup::WithCarry, Some(imm)) => {
            dynasm!(ra.asm ; .arch x64 ; adc Rd(d), imm as i32)
        }
        (true, CarrySetup::WithCarry, None) => {
            let s = ra.use_gpr(args[1]);
            dynasm!(ra.asm ; .arch x64 ; adc Rd(d), Rd(s))
        }
        (false, CarrySetup::None, Some(imm)) => {
            dynasm!(ra.asm ; .arch x64 ; sub Rd(d), imm as i32)
        }
        (false, CarrySetup::None, None) => {
            let s = ra.use_gpr(args[1]);
            dynasm!(ra.asm ; .arch x64 ; sub Rd(d), Rd(s))
        }
        (false, CarrySetup::WithCarry, Some(imm)) => {
            dynasm!(ra.asm ; .arch x64 ; sbb Rd(d), imm as i32)
        }
        (false, CarrySetup::WithCarry, None) => {
            let s = ra.use_gpr(args[1]);
            dynasm!(ra.asm ; .arch x64 ; sbb Rd(d), Rd(s))
        }
    }

    // The flag reads must happen before anything clobbers host flags;
    // register moves are safe, arithmetic is not.
    define_flag_from_cc(ra, carry_out, if is_add { FlagCc::Carry } else { FlagCc::NotCarry });
    define_flag_from_cc(ra, overflow_out, FlagCc::Overflow);
    ra.bind_result(d, inst_ref);
}

/// Constant-amount shifts are emitted inline with their carry; variable
/// amounts go through the runtime helpers.
fn emit_shift(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>, inst_ref: InstRef, opcode: Opcode) {
    let inst = ctx.block.get(inst_ref);
    let args = inst.args;
    let carry_out = ctx.block.find_pseudo_op(inst_ref, Opcode::GetCarryFromOp);

    let Value::ImmU8(amount) = args[1] else {
        // Variable amount: helper returns result | carry << 32.
        let f = match opcode {
            Opcode::LogicalShiftLeft32 => helpers::lsl_32 as usize as u64,
            Opcode::LogicalShiftRight32 => helpers::lsr_32 as usize as u64,
            Opcode::ArithmeticShiftRight32 => helpers::asr_32 as usize as u64,
            _ => helpers::ror_32 as usize as u64,
        };
        let rax = ra.host_call(
            None,
            f,
            &[CallArg::Val(args[0]), CallArg::Val(args[1]), CallArg::Val(args[2])],
        );
        if let Some(carry) = carry_out {
            let c = ra.def_gpr(carry);
            dynasm!(ra.asm
                ; .arch x64
                ; mov Rq(c), Rq(rax)
                ; shr Rq(c), 32
                ; and Rd(c), 1
            );
        }
        let d = ra.def_gpr(inst_ref);
        dynasm!(ra.asm ; .arch x64 ; mov Rd(d), Rd(rax));
        return;
    };

    let amount = amount as u32;
    let d = ra.use_scratch_gpr(args[0]);

    match opcode {
        Opcode::LogicalShiftLeft32 => match amount {
            0 => emit_carry_passthrough(ra, carry_out, args[2]),
            1..=31 => {
                dynasm!(ra.asm ; .arch x64 ; shl Rd(d), amount as i8);
                define_flag_from_cc(ra, carry_out, FlagCc::Carry);
            }
            32 => {
                if let Some(carry) = carry_out {
                    let c = ra.def_gpr(carry);
                    dynasm!(ra.asm
                        ; .arch x64
                        ; mov Rd(c), Rd(d)
                        ; and Rd(c), 1
                    );
                }
                dynasm!(ra.asm ; .arch x64 ; xor Rd(d), Rd(d));
            }
            _ => {
                dynasm!(ra.asm ; .arch x64 ; xor Rd(d), Rd(d));
                define_zero_flag(ra, carry_out);
            }
        },
        Opcode::LogicalShiftRight32 => match amount {
            0 => emit_carry_passthrough(ra, carry_out, args[2]),
            1..=31 => {
                dynasm!(ra.asm ; .arch x64 ; shr Rd(d), amount as i8);
                define_flag_from_cc(ra, carry_out, FlagCc::Carry);
            }
            32 => {
                if let Some(carry) = carry_out {
                    let c = ra.def_gpr(carry);
                    dynasm!(ra.asm
                        ; .arch x64
                        ; mov Rd(c), Rd(d)
                        ; shr Rd(c), 31
                    );
                }
                dynasm!(ra.asm ; .arch x64 ; xor Rd(d), Rd(d));
            }
            _ => {
                dynasm!(ra.asm ; .arch x64 ; xor Rd(d), Rd(d));
                define_zero_flag(ra, carry_out);
            }
        },
        Opcode::ArithmeticShiftRight32 => match amount {
            0 => emit_carry_passthrough(ra, carry_out, args[2]),
            1..=31 => {
                dynasm!(ra.asm ; .arch x64 ; sar Rd(d), amount as i8);
                define_flag_from_cc(ra, carry_out, FlagCc::Carry);
            }
            _ => {
                dynasm!(ra.asm ; .arch x64 ; sar Rd(d), 31);
                if let Some(carry) = carry_out {
                    let c = ra.def_gpr(carry);
                    dynasm!(ra.asm
                        ; .arch x64
                        ; mov Rd(c), Rd(d)
                        ; and Rd(c), 1
                    );
                }
            }
        },
        _ => {
            // RotateRight32.
            if amount == 0 {
                emit_carry_passthrough(ra, carry_out, args[2]);
            } else {
                let eff = amount % 32;
                if eff != 0 {
                    dynasm!(ra.asm ; .arch x64 ; ror Rd(d), eff as i8);
                }
                if let Some(carry) = carry_out {
                    let c = ra.def_gpr(carry);
                    dynasm!(ra.asm
                        ; .arch x64
                        ; mov Rd(c), Rd(d)
                        ; shr Rd(c), 31
                    );
                }
            }
        }
    }
    ra.bind_result(d, inst_ref);
}

/// Shift by zero: the result passes through and the carry-out is the
/// carry-in.
fn emit_carry_passthrough(ra: &mut RegAlloc<'_>, carry_out: Option<InstRef>, carry_in: Value) {
    let Some(carry) = carry_out else { return };
    if let Some(imm) = imm_u32(carry_in) {
        let c = ra.def_gpr(carry);
        dynasm!(ra.asm ; .arch x64 ; mov Rd(c), imm as i32);
    } else {
        let s = ra.use_gpr(carry_in);
        let c = ra.def_gpr(carry);
        dynasm!(ra.asm ; .arch x64 ; mov Rd(c), Rd(s));
    }
}

fn define_zero_flag(ra: &mut RegAlloc<'_>, pseudo: Option<InstRef>) {
    let Some(pseudo) = pseudo else { return };
    let c = ra.def_gpr(pseudo);
    dynasm!(ra.asm ; .arch x64 ; xor Rd(c), Rd(c));
}

fn emit_set_flag(ra: &mut RegAlloc<'_>, value: Value, bit: u32) {
    let off = A32JitState::offset_of_cpsr_nzcv() as i32;
    let mask = (1u32 << bit) as i32;
    let keep = !(1u32 << bit) as i32;
    let shift = bit as i8;
    match value {
        Value::ImmU1(true) => {
            dynasm!(ra.asm ; .arch x64 ; or DWORD [r15 + off], mask);
        }
        Value::ImmU1(false) => {
            dynasm!(ra.asm ; .arch x64 ; and DWORD [r15 + off], keep);
        }
        value => {
            let s = ra.use_scratch_gpr(value);
            dynasm!(ra.asm
                ; .arch x64
                ; shl Rd(s), shift
                ; and DWORD [r15 + off], keep
                ; or [r15 + off], Rd(s)
            );
        }
    }
}

fn emit_bx_write_pc(ra: &mut RegAlloc<'_>, target: Value) {
    let upper_off = A32JitState::offset_of_upper_location_descriptor() as i32;
    let pc_off = A32JitState::offset_of_reg(15) as i32;

    if let Some(imm) = imm_u32(target) {
        let t = imm & 1;
        let mask = if t != 0 { 0xFFFF_FFFEu32 } else { 0xFFFF_FFFCu32 };
        let u = ra.scratch_gpr();
        dynasm!(ra.asm
            ; .arch x64
            ; mov Rd(u), [r15 + upper_off]
            ; and Rd(u), -2
            ; or Rd(u), t as i32
            ; mov [r15 + upper_off], Rd(u)
            ; mov DWORD [r15 + pc_off], (imm & mask) as i32
        );
        return;
    }

    let s = ra.use_scratch_gpr(target);
    let t = ra.scratch_gpr();
    let u = ra.scratch_gpr();
    dynasm!(ra.asm
        ; .arch x64
        ; mov Rd(t), Rd(s)
        ; and Rd(t), 1
        // Fold the Thumb bit into the upper location descriptor.
        ; mov Rd(u), [r15 + upper_off]
        ; and Rd(u), -2
        ; or Rd(u), Rd(t)
        ; mov [r15 + upper_off], Rd(u)
        // Alignment mask: !1 for Thumb targets, !3 for ARM targets.
        ; shl Rd(t), 1
        ; or Rd(t), 0xFFFF_FFFCu32 as i32
        ; and Rd(s), Rd(t)
        ; mov [r15 + pc_off], Rd(s)
    );
}

fn emit_push_rsb(ctx: &mut EmitContext<'_>, ra: &mut RegAlloc<'_>, target_hash: u64) {
    let ptr_off = A32JitState::offset_of_rsb_ptr() as i32;
    let locs_off = A32JitState::offset_of_rsb_location_descriptors() as i32;
    let ptrs_off = A32JitState::offset_of_rsb_codeptrs() as i32;
    let target = LocationDescriptor::new(target_hash);

    // The code pointer loads through a patchable slot so later emission
    // of the target can link it directly.
    ra.scratch_at(abi::RCX);
    ctx.patch_slot(ra.asm, PatchKind::RsbCodePtr, target);

    let idx = ra.scratch_gpr();
    let hash = ra.scratch_gpr();
    let ptr_mask = RSB_PTR_MASK as i32;
    let hash_imm = target_hash as i64;
    dynasm!(ra.asm
        ; .arch x64
        ; mov Rd(idx), [r15 + ptr_off]
        ; add Rd(idx), 1
        ; and Rd(idx), ptr_mask
        ; mov [r15 + ptr_off], Rd(idx)
        ; mov Rq(hash), QWORD hash_imm
        ; mov [r15 + Rq(idx) * 8 + locs_off], Rq(hash)
        ; mov [r15 + Rq(idx) * 8 + ptrs_off], rcx
    );
}

fn emit_helper_1(ra: &mut RegAlloc<'_>, inst_ref: InstRef, f: u64, a: Value) {
    ra.host_call(Some(inst_ref), f, &[CallArg::Val(a)]);
}

fn emit_helper_2(ra: &mut RegAlloc<'_>, inst_ref: InstRef, f: u64, a: Value, b: Value) {
    ra.host_call(Some(inst_ref), f, &[CallArg::Val(a), CallArg::Val(b)]);
}

/// Helper call whose result packs a flag nibble above bit 32, feeding a
/// pseudo-op (overflow or GE).
fn emit_flagged_helper_2(
    ctx: &mut EmitContext<'_>,
    ra: &mut RegAlloc<'_>,
    inst_ref: InstRef,
    f: u64,
    a: Value,
    b: Value,
    pseudo_kind: Opcode,
) {
    let pseudo = ctx.block.find_pseudo_op(inst_ref, pseudo_kind);
    let rax = ra.host_call(None, f, &[CallArg::Val(a), CallArg::Val(b)]);
    if let Some(pseudo) = pseudo {
        let p = ra.def_gpr(pseudo);
        dynasm!(ra.asm
            ; .arch x64
            ; mov Rq(p), Rq(rax)
            ; shr Rq(p), 32
            ; and Rd(p), 0xF
        );
    }
    let d = ra.def_gpr(inst_ref);
    dynasm!(ra.asm ; .arch x64 ; mov Rd(d), Rd(rax));
}

fn emit_fp_binary(ra: &mut RegAlloc<'_>, inst_ref: InstRef, f: u64, args: [Value; 4]) {
    ra.host_call(
        Some(inst_ref),
        f,
        &[CallArg::StatePtr, CallArg::Val(args[0]), CallArg::Val(args[1])],
    );
}

fn packed_helper(op: Opcode) -> Option<u64> {
    use helpers::*;
    let f: u64 = match op {
        Opcode::PackedAddU8 => packed_add_u8 as usize as u64,
        Opcode::PackedAddS8 => packed_add_s8 as usize as u64,
        Opcode::PackedSubU8 => packed_sub_u8 as usize as u64,
        Opcode::PackedSubS8 => packed_sub_s8 as usize as u64,
        Opcode::PackedAddU16 => packed_add_u16 as usize as u64,
        Opcode::PackedAddS16 => packed_add_s16 as usize as u64,
        Opcode::PackedSubU16 => packed_sub_u16 as usize as u64,
        Opcode::PackedSubS16 => packed_sub_s16 as usize as u64,
        Opcode::PackedAddSubU16 => packed_add_sub_u16 as usize as u64,
        Opcode::PackedAddSubS16 => packed_add_sub_s16 as usize as u64,
        Opcode::PackedSubAddU16 => packed_sub_add_u16 as usize as u64,
        Opcode::PackedSubAddS16 => packed_sub_add_s16 as usize as u64,
        Opcode::PackedHalvingAddU8 => packed_halving_add_u8 as usize as u64,
        Opcode::PackedHalvingAddS8 => packed_halving_add_s8 as usize as u64,
        Opcode::PackedHalvingSubU8 => packed_halving_sub_u8 as usize as u64,
        Opcode::PackedHalvingSubS8 => packed_halving_sub_s8 as usize as u64,
        Opcode::PackedHalvingAddU16 => packed_halving_add_u16 as usize as u64,
        Opcode::PackedHalvingAddS16 => packed_halving_add_s16 as usize as u64,
        Opcode::PackedHalvingSubU16 => packed_halving_sub_u16 as usize as u64,
        Opcode::PackedHalvingSubS16 => packed_halving_sub_s16 as usize as u64,
        Opcode::PackedHalvingAddSubU16 => packed_halving_add_sub_u16 as usize as u64,
        Opcode::PackedHalvingAddSubS16 => packed_halving_add_sub_s16 as usize as u64,
        Opcode::PackedHalvingSubAddU16 => packed_halving_sub_add_u16 as usize as u64,
        Opcode::PackedHalvingSubAddS16 => packed_halving_sub_add_s16 as usize as u64,
        Opcode::PackedSaturatedAddU8 => packed_saturated_add_u8 as usize as u64,
        Opcode::PackedSaturatedAddS8 => packed_saturated_add_s8 as usize as u64,
        Opcode::PackedSaturatedSubU8 => packed_saturated_sub_u8 as usize as u64,
        Opcode::PackedSaturatedSubS8 => packed_saturated_sub_s8 as usize as u64,
        Opcode::PackedSaturatedAddU16 => packed_saturated_add_u16 as usize as u64,
        Opcode::PackedSaturatedAddS16 => packed_saturated_add_s16 as usize as u64,
        Opcode::PackedSaturatedSubU16 => packed_saturated_sub_u16 as usize as u64,
        Opcode::PackedSaturatedSubS16 => packed_saturated_sub_s16 as usize as u64,
        Opcode::PackedAbsDiffSumU8 => packed_abs_diff_sum_u8 as usize as u64,
        _ => return None,
    };
    Some(f)
}
