use std::fmt::Write as _;

use tracing::debug;

use crate::backend::x64::block_cache::BlockCache;
use crate::backend::x64::block_of_code::{BlockOfCode, RunCodeCallbacks};
use crate::backend::x64::emit::{emit_block, EmitCallbacks, EmitConfig};
use crate::backend::x64::emit_terminal::{
    fast_dispatch_index, FastDispatchEntry, FAST_DISPATCH_TABLE_SIZE,
};
use crate::backend::x64::invalidation::IntervalSet;
use crate::backend::x64::jit_state::{A32JitState, RSB_PTR_MASK, RSB_SIZE};
use crate::error::JitError;
use crate::frontend::a32::translate::{self, TranslationOptions};
use crate::halt_reason::HaltReason;
use crate::ir::location::{A32LocationDescriptor, LocationDescriptor};
use crate::ir::opt;
use crate::jit_config::{Config, ExceptionKind, OptimizationFlag};

/// When the code buffer's free space falls below this at a cache miss,
/// the whole cache is invalidated before emission.
const MINIMUM_REMAINING_CODE_SIZE: usize = 1024 * 1024;

/// Public A32 recompiler instance.
///
/// Create one per emulated core; `run()` must not be called concurrently
/// with any other operation on the same instance. Independent instances
/// share nothing.
pub struct Jit {
    inner: Box<Inner>,
}

/// An opaque snapshot of guest state, restorable with
/// [`Jit::load_context`]. Restoring a context captured before a cache
/// wipe clears the return stack buffer, since its code pointers are
/// stale.
#[derive(Clone)]
pub struct Context {
    regs: [u32; 16],
    ext_regs: [u32; 64],
    cpsr: u32,
    fpscr: u32,
    rsb_ptr: u32,
    rsb_location_descriptors: [u64; RSB_SIZE],
    rsb_codeptrs: [u64; RSB_SIZE],
    invalidation_generation: u64,
}

struct Inner {
    jit_state: A32JitState,
    callbacks: Box<dyn crate::jit_config::Callbacks>,
    code: Option<BlockOfCode>,
    cache: BlockCache,
    fast_dispatch_table: Vec<FastDispatchEntry>,

    // Invalidation requests made during execution queue up here and run
    // once execution yields.
    invalid_cache_ranges: IntervalSet,
    invalidate_entire_cache: bool,
    invalidation_generation: u64,

    is_executing: bool,
    self_ptr: u64,

    define_unpredictable_behaviour: bool,
    hook_hint_instructions: bool,
    enable_fast_dispatch: bool,
    optimizations: OptimizationFlag,
}

impl Jit {
    pub fn new(config: Config) -> Result<Self, JitError> {
        let enable_fast_dispatch = config.enable_fast_dispatch
            && config.has_optimization(OptimizationFlag::FAST_DISPATCH);

        let mut inner = Box::new(Inner {
            jit_state: A32JitState::new(),
            callbacks: config.callbacks,
            code: None,
            cache: BlockCache::new(),
            fast_dispatch_table: Vec::new(),
            invalid_cache_ranges: IntervalSet::new(),
            invalidate_entire_cache: false,
            invalidation_generation: 0,
            is_executing: false,
            self_ptr: 0,
            define_unpredictable_behaviour: config.define_unpredictable_behaviour,
            hook_hint_instructions: config.hook_hint_instructions,
            enable_fast_dispatch,
            optimizations: config.optimizations,
        });

        // The boxed Inner has a stable address; the generated dispatcher
        // and every emitted host call close over it.
        inner.self_ptr = &mut *inner as *mut Inner as u64;

        let run_callbacks = RunCodeCallbacks {
            arg: inner.self_ptr,
            lookup_block: lookup_block_trampoline as usize as u64,
            add_ticks: add_ticks_trampoline as usize as u64,
            get_ticks_remaining: get_ticks_remaining_trampoline as usize as u64,
        };
        inner.code = Some(BlockOfCode::new(config.code_cache_size, &run_callbacks)?);

        if enable_fast_dispatch {
            let invalid = FastDispatchEntry {
                location: u64::MAX,
                code_ptr: inner.code_ref().return_from_run_code_addr() as u64,
            };
            inner.fast_dispatch_table = vec![invalid; FAST_DISPATCH_TABLE_SIZE];
        }

        Ok(Self { inner })
    }

    /// Execute guest code until the tick budget runs out or a halt is
    /// requested. Returns the accumulated halt reasons (empty for normal
    /// tick exhaustion).
    pub fn run(&mut self) -> HaltReason {
        assert!(!self.inner.is_executing, "Jit::run is not reentrant");
        self.inner.is_executing = true;
        self.inner.jit_state.halt_reason = 0;

        let reason = self.inner.execute();

        self.inner.is_executing = false;
        self.inner.perform_cache_invalidation();
        HaltReason::from_bits_truncate(reason)
    }

    /// Request an advisory stop; the current block yields at its next
    /// terminal check.
    pub fn halt_execution(&mut self) {
        self.inner.jit_state.halt_reason |= HaltReason::EXTERNAL_HALT.bits();
    }

    /// Reset all guest state.
    pub fn reset(&mut self) {
        assert!(!self.inner.is_executing);
        self.inner.jit_state.reset();
    }

    /// Discard every translated block.
    pub fn clear_cache(&mut self) {
        self.inner.invalidate_entire_cache = true;
        self.inner.request_cache_invalidation();
    }

    /// Invalidate translations overlapping `[start, start + length)`.
    /// Safe to call from within callbacks during execution: the request
    /// queues and the engine returns promptly.
    pub fn invalidate_cache_range(&mut self, start: u32, length: usize) {
        self.inner.invalid_cache_ranges.add(start, length);
        self.inner.request_cache_invalidation();
    }

    pub fn regs(&self) -> &[u32; 16] {
        &self.inner.jit_state.regs
    }

    pub fn regs_mut(&mut self) -> &mut [u32; 16] {
        &mut self.inner.jit_state.regs
    }

    pub fn ext_regs(&self) -> &[u32; 64] {
        &self.inner.jit_state.ext_regs
    }

    pub fn ext_regs_mut(&mut self) -> &mut [u32; 64] {
        &mut self.inner.jit_state.ext_regs
    }

    pub fn cpsr(&self) -> u32 {
        self.inner.jit_state.cpsr()
    }

    pub fn set_cpsr(&mut self, value: u32) {
        self.inner.jit_state.set_cpsr(value);
    }

    pub fn fpscr(&self) -> u32 {
        self.inner.jit_state.fpscr()
    }

    pub fn set_fpscr(&mut self, value: u32) {
        self.inner.jit_state.set_fpscr(value);
    }

    pub fn save_context(&self) -> Context {
        let state = &self.inner.jit_state;
        Context {
            regs: state.regs,
            ext_regs: state.ext_regs,
            cpsr: state.cpsr(),
            fpscr: state.fpscr(),
            rsb_ptr: state.rsb_ptr,
            rsb_location_descriptors: state.rsb_location_descriptors,
            rsb_codeptrs: state.rsb_codeptrs,
            invalidation_generation: self.inner.invalidation_generation,
        }
    }

    pub fn load_context(&mut self, ctx: &Context) {
        let state = &mut self.inner.jit_state;
        state.regs = ctx.regs;
        state.ext_regs = ctx.ext_regs;
        state.set_cpsr(ctx.cpsr);
        state.set_fpscr(ctx.fpscr);
        if ctx.invalidation_generation == self.inner.invalidation_generation {
            state.rsb_ptr = ctx.rsb_ptr;
            state.rsb_location_descriptors = ctx.rsb_location_descriptors;
            state.rsb_codeptrs = ctx.rsb_codeptrs;
        } else {
            // The snapshot predates a cache wipe; its code pointers are
            // dangling.
            state.reset_rsb();
        }
    }

    /// Debug description of the emitted code for a location.
    pub fn disassemble(&self, descriptor: LocationDescriptor) -> String {
        let Some(block) = self.inner.cache.get(&descriptor) else {
            return format!("{descriptor}: not in cache\n");
        };
        let code = self.inner.code_ref();
        let addr = code.base_addr() + block.entrypoint_offset;
        let mut out = format!("address: {addr:#x}\nsize: {} bytes\n", block.size);
        for (i, byte) in code
            .buffer
            .read_at(block.entrypoint_offset, block.size)
            .iter()
            .enumerate()
        {
            if i % 16 == 0 {
                if i != 0 {
                    out.push('\n');
                }
                let _ = write!(out, "{:#010x}: ", addr + i);
            }
            let _ = write!(out, "{byte:02x} ");
        }
        out.push('\n');
        out
    }
}

impl Inner {
    fn code_ref(&self) -> &BlockOfCode {
        self.code.as_ref().expect("code buffer initialized in Jit::new")
    }

    fn code_mut(&mut self) -> &mut BlockOfCode {
        self.code.as_mut().expect("code buffer initialized in Jit::new")
    }

    fn has_optimization(&self, flag: OptimizationFlag) -> bool {
        self.optimizations.contains(flag)
    }

    fn translation_options(&self) -> TranslationOptions {
        TranslationOptions {
            define_unpredictable_behaviour: self.define_unpredictable_behaviour,
            hook_hint_instructions: self.hook_hint_instructions,
            ..TranslationOptions::default()
        }
    }

    /// Dispatcher entry: try the RSB short-circuit, else do a full
    /// lookup, then enter generated code until it yields.
    fn execute(&mut self) -> u32 {
        let hash = self.jit_state.location_descriptor();
        let predicted = (self.jit_state.rsb_ptr.wrapping_sub(1)) & RSB_PTR_MASK;
        let code_ptr = if self.has_optimization(OptimizationFlag::RETURN_STACK_BUFFER)
            && self.jit_state.rsb_location_descriptors[predicted as usize] == hash
        {
            self.jit_state.rsb_ptr = predicted;
            self.jit_state.rsb_codeptrs[predicted as usize] as usize
        } else {
            self.get_block_addr(LocationDescriptor::new(hash))
        };

        let run = self.code_ref().run_code_fn();
        let state = &mut self.jit_state as *mut A32JitState;
        unsafe { run(state, code_ptr as *const u8) }
    }

    /// Translate-or-find the block for `descriptor` and return its host
    /// entrypoint address.
    fn get_block_addr(&mut self, descriptor: LocationDescriptor) -> usize {
        if let Some(block) = self.cache.get(&descriptor) {
            return self.code_ref().base_addr() + block.entrypoint_offset;
        }

        if self.code_ref().space_remaining() < MINIMUM_REMAINING_CODE_SIZE {
            debug!("code buffer low on space; performing full invalidation");
            self.invalidate_entire_cache = true;
            self.perform_cache_invalidation();
        }

        let a32 = A32LocationDescriptor::from_location(descriptor);
        let options = self.translation_options();

        let callbacks = self.callbacks.as_mut();
        let mut ir_block = {
            let mut read_code = |vaddr: u32| callbacks.memory_read_code(vaddr);
            translate::translate(a32, &mut read_code, options)
        };

        if self.has_optimization(OptimizationFlag::GET_SET_ELIMINATION) {
            opt::a32_get_set_elimination(&mut ir_block);
        }
        opt::dead_code_elimination(&mut ir_block);
        if self.has_optimization(OptimizationFlag::CONST_PROP) {
            opt::constant_memory_reads(&mut ir_block, self.callbacks.as_mut());
            opt::constant_propagation(&mut ir_block);
            opt::dead_code_elimination(&mut ir_block);
        }
        if self.has_optimization(OptimizationFlag::MISC_IR_OPT) {
            let callbacks = self.callbacks.as_mut();
            let mut probe = |loc: A32LocationDescriptor| {
                let mut read_code = |vaddr: u32| callbacks.memory_read_code(vaddr);
                translate::would_interpret(loc, &mut read_code, options)
            };
            opt::merge_interpret_blocks(&mut ir_block, &mut probe);
        }
        #[cfg(debug_assertions)]
        opt::verification_pass(&ir_block);

        let emit_cfg = self.emit_config();
        let range_start = a32.pc();
        let range_end = ir_block.end_address.max(range_start.wrapping_add(4));

        let code = self.code.as_mut().expect("code buffer initialized in Jit::new");
        let cache = &self.cache;
        let base = code.base_addr();
        let info = emit_block(code, &emit_cfg, &ir_block, &|target| {
            cache.get(&target).map(|b| base + b.entrypoint_offset)
        });

        let entry = base + info.entrypoint_offset;
        self.cache
            .insert(descriptor, range_start, range_end, info, self.code.as_mut().unwrap());
        entry
    }

    fn emit_config(&self) -> EmitConfig {
        let block_linking = self.has_optimization(OptimizationFlag::BLOCK_LINKING);
        EmitConfig {
            callbacks: EmitCallbacks {
                arg: self.self_ptr,
                memory_read_8: memory_read_8_trampoline as usize as u64,
                memory_read_16: memory_read_16_trampoline as usize as u64,
                memory_read_32: memory_read_32_trampoline as usize as u64,
                memory_read_64: memory_read_64_trampoline as usize as u64,
                memory_write_8: memory_write_8_trampoline as usize as u64,
                memory_write_16: memory_write_16_trampoline as usize as u64,
                memory_write_32: memory_write_32_trampoline as usize as u64,
                memory_write_64: memory_write_64_trampoline as usize as u64,
                call_svc: call_svc_trampoline as usize as u64,
                exception_raised: exception_raised_trampoline as usize as u64,
                interpreter_fallback: interpreter_fallback_trampoline as usize as u64,
            },
            fast_dispatch_table_addr: if self.enable_fast_dispatch {
                self.fast_dispatch_table.as_ptr() as u64
            } else {
                0
            },
            enable_block_linking: block_linking,
            enable_rsb: self.has_optimization(OptimizationFlag::RETURN_STACK_BUFFER),
            enable_fast_dispatch: self.enable_fast_dispatch,
        }
    }

    fn reset_fast_dispatch_table(&mut self) {
        if self.fast_dispatch_table.is_empty() {
            return;
        }
        let invalid = FastDispatchEntry {
            location: u64::MAX,
            code_ptr: self.code_ref().return_from_run_code_addr() as u64,
        };
        self.fast_dispatch_table.fill(invalid);
    }

    fn request_cache_invalidation(&mut self) {
        if self.is_executing {
            self.jit_state.halt_reason |= HaltReason::CACHE_INVALIDATION.bits();
            return;
        }
        self.perform_cache_invalidation();
    }

    /// Apply queued invalidations. Runs only while execution is yielded;
    /// afterwards no dangling code pointer is reachable from the cache,
    /// the RSB or the fast-dispatch table.
    fn perform_cache_invalidation(&mut self) {
        if self.invalidate_entire_cache {
            self.jit_state.reset_rsb();
            self.cache.clear();
            self.code_mut().clear_cache();
            self.reset_fast_dispatch_table();

            self.invalid_cache_ranges.clear();
            self.invalidate_entire_cache = false;
            self.invalidation_generation += 1;
            return;
        }

        if self.invalid_cache_ranges.is_empty() {
            return;
        }

        self.jit_state.reset_rsb();
        let ranges = std::mem::take(&mut self.invalid_cache_ranges);
        let code = self.code.as_mut().expect("code buffer initialized in Jit::new");
        self.cache.invalidate_ranges(&ranges, code);
        self.reset_fast_dispatch_table();
        self.invalidation_generation += 1;
    }

    /// Dispatcher-side block lookup; also populates the fast-dispatch
    /// table so emitted FastDispatchHint probes can hit next time.
    fn lookup_current_block(&mut self) -> u64 {
        let hash = self.jit_state.location_descriptor();
        let addr = self.get_block_addr(LocationDescriptor::new(hash)) as u64;
        if self.enable_fast_dispatch {
            let index = fast_dispatch_index(hash);
            self.fast_dispatch_table[index] = FastDispatchEntry {
                location: hash,
                code_ptr: addr,
            };
        }
        addr
    }
}

unsafe fn inner_from_arg<'a>(arg: u64) -> &'a mut Inner {
    &mut *(arg as *mut Inner)
}

extern "sysv64" fn lookup_block_trampoline(arg: u64) -> u64 {
    let inner = unsafe { inner_from_arg(arg) };
    inner.lookup_current_block()
}

extern "sysv64" fn add_ticks_trampoline(arg: u64, ticks: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.add_ticks(ticks);
}

extern "sysv64" fn get_ticks_remaining_trampoline(arg: u64) -> u64 {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.get_ticks_remaining()
}

extern "sysv64" fn memory_read_8_trampoline(arg: u64, vaddr: u64) -> u64 {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_read_8(vaddr as u32) as u64
}

extern "sysv64" fn memory_read_16_trampoline(arg: u64, vaddr: u64) -> u64 {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_read_16(vaddr as u32) as u64
}

extern "sysv64" fn memory_read_32_trampoline(arg: u64, vaddr: u64) -> u64 {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_read_32(vaddr as u32) as u64
}

extern "sysv64" fn memory_read_64_trampoline(arg: u64, vaddr: u64) -> u64 {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_read_64(vaddr as u32)
}

extern "sysv64" fn memory_write_8_trampoline(arg: u64, vaddr: u64, value: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_write_8(vaddr as u32, value as u8);
}

extern "sysv64" fn memory_write_16_trampoline(arg: u64, vaddr: u64, value: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_write_16(vaddr as u32, value as u16);
}

extern "sysv64" fn memory_write_32_trampoline(arg: u64, vaddr: u64, value: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_write_32(vaddr as u32, value as u32);
}

extern "sysv64" fn memory_write_64_trampoline(arg: u64, vaddr: u64, value: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.memory_write_64(vaddr as u32, value);
}

extern "sysv64" fn call_svc_trampoline(arg: u64, swi: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner.callbacks.call_svc(swi as u32);
}

extern "sysv64" fn exception_raised_trampoline(arg: u64, pc: u64, exception: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner
        .callbacks
        .exception_raised(pc as u32, ExceptionKind::from_u64(exception));
}

extern "sysv64" fn interpreter_fallback_trampoline(arg: u64, pc: u64, num_instructions: u64) {
    let inner = unsafe { inner_from_arg(arg) };
    inner
        .callbacks
        .interpreter_fallback(pc as u32, num_instructions as usize);
}
