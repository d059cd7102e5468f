use dynasmrt::{dynasm, DynasmApi};

use crate::backend::x64::hostloc::{HostLoc, NUM_GPRS, TOTAL_LOC_COUNT};
use crate::backend::x64::jit_state::A32JitState;
use crate::backend::x64::{abi, Asm};
use crate::ir::block::Block;
use crate::ir::value::{InstRef, Value};

/// An argument to a host call.
pub enum CallArg {
    /// A literal (callback environment pointers, immediates).
    Imm(u64),
    /// An IR value.
    Val(Value),
    /// The guest state block pointer (R15).
    StatePtr,
}

#[derive(Clone, Default)]
struct LocInfo {
    /// IR value stored here, if any.
    value: Option<InstRef>,
    /// Uses consumed so far.
    consumed: u32,
    /// Expected total uses, from the IR use count.
    total: u32,
    /// Read- or write-locked for the duration of the current op.
    locked: bool,
    /// Write-locked: the op may clobber the contents.
    scratch: bool,
    last_touch: u64,
}

/// Maps IR values to host registers and spill slots at the moment of
/// emission.
///
/// Walks the block linearly with the emitters: an emitter asks for its
/// arguments (`use_gpr` for read-only access, `use_scratch_gpr` when it
/// will clobber the register) and destinations (`def_gpr`,
/// `use_def_gpr`), and calls `end_of_op` when done. Spills live in the
/// guest state block's scratch area. Caller-saved registers are flushed
/// across host calls; values prefer callee-saved homes so they survive
/// them.
pub struct RegAlloc<'a> {
    pub asm: &'a mut Asm,
    block: &'a Block,
    locs: Vec<LocInfo>,
    tick: u64,
    pending_defs: Vec<(u8, InstRef)>,
}

impl<'a> RegAlloc<'a> {
    pub fn new(asm: &'a mut Asm, block: &'a Block) -> Self {
        let mut locs = Vec::with_capacity(TOTAL_LOC_COUNT);
        locs.resize_with(TOTAL_LOC_COUNT, LocInfo::default);
        // RSP and the state pointer are never allocatable.
        locs[abi::RSP as usize].locked = true;
        locs[abi::R15 as usize].locked = true;
        Self {
            asm,
            block,
            locs,
            tick: 0,
            pending_defs: Vec::new(),
        }
    }

    fn touch(&mut self, idx: usize) {
        self.tick += 1;
        self.locs[idx].last_touch = self.tick;
    }

    fn find_value(&self, value: InstRef) -> Option<usize> {
        self.locs.iter().position(|l| l.value == Some(value))
    }

    fn spill_offset(slot: usize) -> i32 {
        A32JitState::offset_of_spill_slot(slot) as i32
    }

    fn free_spill_slot(&self) -> usize {
        (NUM_GPRS..TOTAL_LOC_COUNT)
            .find(|&i| self.locs[i].value.is_none())
            .expect("spill area exhausted")
    }

    /// Move the value in `reg` out to a spill slot.
    fn spill(&mut self, reg: u8) {
        debug_assert!(!self.locs[reg as usize].locked, "spilling a locked register");
        let slot_idx = self.free_spill_slot();
        let slot = slot_idx - NUM_GPRS;
        let off = Self::spill_offset(slot);
        dynasm!(self.asm ; .arch x64 ; mov [r15 + off], Rq(reg));
        self.locs[slot_idx] = LocInfo {
            last_touch: self.locs[reg as usize].last_touch,
            locked: false,
            scratch: false,
            ..std::mem::take(&mut self.locs[reg as usize])
        };
    }

    /// Pick a free register from `order`, evicting the least-recently
    /// used unlocked value if everything is occupied.
    fn alloc_gpr(&mut self, order: &[u8]) -> u8 {
        if let Some(&reg) = order
            .iter()
            .find(|&&r| !self.locs[r as usize].locked && self.locs[r as usize].value.is_none())
        {
            return reg;
        }

        let victim = order
            .iter()
            .copied()
            .filter(|&r| !self.locs[r as usize].locked)
            .min_by_key(|&r| self.locs[r as usize].last_touch)
            .expect("register allocator conflict: every register is locked");
        self.spill(victim);
        victim
    }

    fn lock_read(&mut self, reg: u8) {
        self.locs[reg as usize].locked = true;
    }

    fn lock_scratch(&mut self, reg: u8) {
        let info = &mut self.locs[reg as usize];
        info.locked = true;
        info.scratch = true;
    }

    /// Bring an IR value into a general-purpose register.
    fn ensure_in_gpr(&mut self, value: InstRef) -> u8 {
        let idx = self
            .find_value(value)
            .unwrap_or_else(|| panic!("value %{} has no live location", value.0));
        if idx < NUM_GPRS {
            return idx as u8;
        }

        let slot = idx - NUM_GPRS;
        let reg = self.alloc_gpr(&abi::VALUE_ALLOC_ORDER);
        let off = Self::spill_offset(slot);
        dynasm!(self.asm ; .arch x64 ; mov Rq(reg), [r15 + off]);
        self.locs[reg as usize] = std::mem::take(&mut self.locs[idx]);
        reg
    }

    fn materialize_imm(&mut self, value: &Value) -> u8 {
        let reg = self.alloc_gpr(&abi::SCRATCH_ALLOC_ORDER);
        let imm = value.get_imm_as_u64();
        if imm <= u32::MAX as u64 {
            let imm = imm as i32;
            dynasm!(self.asm ; .arch x64 ; mov Rd(reg), imm);
        } else {
            let imm = imm as i64;
            dynasm!(self.asm ; .arch x64 ; mov Rq(reg), QWORD imm);
        }
        self.lock_scratch(reg);
        self.touch(reg as usize);
        reg
    }

    /// Read access to a value for the current op.
    pub fn use_gpr(&mut self, value: Value) -> u8 {
        if value.is_immediate() {
            return self.materialize_imm(&value);
        }
        let r = value.inst_ref();
        let reg = self.ensure_in_gpr(r);
        self.locs[reg as usize].consumed += 1;
        self.lock_read(reg);
        self.touch(reg as usize);
        reg
    }

    /// Access to a value the op will clobber. The register returned is
    /// exclusively the op's: either the value's dying home or a copy.
    pub fn use_scratch_gpr(&mut self, value: Value) -> u8 {
        if value.is_immediate() {
            return self.materialize_imm(&value);
        }
        let r = value.inst_ref();
        let reg = self.ensure_in_gpr(r);
        let info = &self.locs[reg as usize];
        let dying = info.consumed + 1 >= info.total;

        if dying && !info.locked {
            // Take over the register; the value ceases to exist.
            let info = &mut self.locs[reg as usize];
            info.value = None;
            info.consumed = 0;
            info.total = 0;
            self.lock_scratch(reg);
            self.touch(reg as usize);
            return reg;
        }

        // Other uses remain: copy to a fresh register.
        self.locs[reg as usize].consumed += 1;
        self.lock_read(reg);
        let copy = self.alloc_gpr(&abi::SCRATCH_ALLOC_ORDER);
        dynasm!(self.asm ; .arch x64 ; mov Rq(copy), Rq(reg));
        self.lock_scratch(copy);
        self.touch(copy as usize);
        copy
    }

    /// Allocate a destination register for an op result.
    pub fn def_gpr(&mut self, inst: InstRef) -> u8 {
        let reg = self.alloc_gpr(&abi::VALUE_ALLOC_ORDER);
        self.lock_scratch(reg);
        self.touch(reg as usize);
        self.pending_defs.push((reg, inst));
        reg
    }

    /// Consume `value` into a scratch register that becomes the home of
    /// `inst`'s result.
    pub fn use_def_gpr(&mut self, value: Value, inst: InstRef) -> u8 {
        let reg = self.use_scratch_gpr(value);
        self.pending_defs.push((reg, inst));
        reg
    }

    /// Bind an already-held scratch register as the home of `inst`'s
    /// result at the end of the op.
    pub fn bind_result(&mut self, reg: u8, inst: InstRef) {
        debug_assert!(self.locs[reg as usize].scratch);
        self.pending_defs.push((reg, inst));
    }

    /// A transient register for the duration of the op.
    pub fn scratch_gpr(&mut self) -> u8 {
        let reg = self.alloc_gpr(&abi::SCRATCH_ALLOC_ORDER);
        self.lock_scratch(reg);
        self.touch(reg as usize);
        reg
    }

    /// Lock a specific register for the op, relocating any value in it.
    pub fn scratch_at(&mut self, reg: u8) -> u8 {
        assert!(
            !self.locs[reg as usize].locked,
            "register allocator conflict: r{reg} already locked"
        );
        if self.locs[reg as usize].value.is_some() {
            self.spill(reg);
        }
        self.lock_scratch(reg);
        self.touch(reg as usize);
        reg
    }

    /// Spill every live caller-saved register ahead of a host call.
    fn flush_caller_saved(&mut self) {
        for reg in abi::CALLER_SAVED {
            let info = &self.locs[reg as usize];
            if info.value.is_some() {
                assert!(!info.locked, "value locked in caller-saved r{reg} across a call");
                self.spill(reg);
            }
        }
    }

    /// Emit a call to `f` with `args` in the System V parameter
    /// registers. Returns the register holding the result (RAX), locked
    /// as scratch for this op; pass `dest` to bind it to an IR result.
    pub fn host_call(&mut self, dest: Option<InstRef>, f: u64, args: &[CallArg]) -> u8 {
        assert!(args.len() <= abi::ABI_PARAMS.len());
        self.flush_caller_saved();

        for (i, arg) in args.iter().enumerate() {
            let param = abi::ABI_PARAMS[i];
            debug_assert!(self.locs[param as usize].value.is_none());
            match arg {
                CallArg::StatePtr => {
                    dynasm!(self.asm ; .arch x64 ; mov Rq(param), r15);
                }
                CallArg::Imm(imm) => {
                    let imm = *imm as i64;
                    dynasm!(self.asm ; .arch x64 ; mov Rq(param), QWORD imm);
                }
                CallArg::Val(value) if value.is_immediate() => {
                    let imm = value.get_imm_as_u64() as i64;
                    dynasm!(self.asm ; .arch x64 ; mov Rq(param), QWORD imm);
                }
                CallArg::Val(value) => {
                    let r = value.inst_ref();
                    let idx = self
                        .find_value(r)
                        .unwrap_or_else(|| panic!("call arg %{} has no live location", r.0));
                    if idx < NUM_GPRS {
                        dynasm!(self.asm ; .arch x64 ; mov Rq(param), Rq(idx as u8));
                    } else {
                        let off = Self::spill_offset(idx - NUM_GPRS);
                        dynasm!(self.asm ; .arch x64 ; mov Rq(param), [r15 + off]);
                    }
                    self.locs[idx].consumed += 1;
                }
            }
        }

        let f = f as i64;
        dynasm!(self.asm
            ; .arch x64
            ; mov rax, QWORD f
            ; call rax
        );

        self.lock_scratch(abi::RAX);
        self.touch(abi::RAX as usize);
        if let Some(inst) = dest {
            self.pending_defs.push((abi::RAX, inst));
        }
        abi::RAX
    }

    /// Release this op's locks, retire dead values and bind results.
    pub fn end_of_op(&mut self) {
        for i in 0..TOTAL_LOC_COUNT {
            if i == abi::RSP as usize || i == abi::R15 as usize {
                continue;
            }
            let info = &mut self.locs[i];
            info.locked = false;
            info.scratch = false;
            if info.value.is_some() && info.consumed >= info.total {
                info.value = None;
                info.consumed = 0;
                info.total = 0;
            }
        }
        for (reg, inst) in std::mem::take(&mut self.pending_defs) {
            let total = self.block.get(inst).use_count;
            if total == 0 {
                continue;
            }
            self.locs[reg as usize] = LocInfo {
                value: Some(inst),
                consumed: 0,
                total,
                locked: false,
                scratch: false,
                last_touch: self.tick,
            };
        }
    }

    /// Every value location, for diagnostics.
    pub fn live_locations(&self) -> Vec<(InstRef, HostLoc)> {
        self.locs
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.value.map(|v| (v, HostLoc::from_index(i))))
            .collect()
    }
}
