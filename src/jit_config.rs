/// Exception kinds reported through [`Callbacks::exception_raised`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ExceptionKind {
    /// An UNDEFINED instruction (or a decode miss).
    Undefined = 0,
    /// An architecturally UNPREDICTABLE instruction.
    UnpredictableInstruction = 1,
    /// BKPT instruction.
    Breakpoint = 2,
    /// SEV instruction (only reported when `hook_hint` is set).
    SendEvent = 3,
    /// WFE instruction (only reported when `hook_hint` is set).
    WaitForEvent = 4,
    /// WFI instruction (only reported when `hook_hint` is set).
    WaitForInterrupt = 5,
    /// YIELD instruction (only reported when `hook_hint` is set).
    Yield = 6,
    /// The PC was set to memory the embedder marked non-executable.
    NoExecuteSetPC = 7,
}

impl ExceptionKind {
    pub fn from_u64(value: u64) -> Self {
        match value {
            0 => ExceptionKind::Undefined,
            1 => ExceptionKind::UnpredictableInstruction,
            2 => ExceptionKind::Breakpoint,
            3 => ExceptionKind::SendEvent,
            4 => ExceptionKind::WaitForEvent,
            5 => ExceptionKind::WaitForInterrupt,
            6 => ExceptionKind::Yield,
            _ => ExceptionKind::NoExecuteSetPC,
        }
    }
}

/// Callbacks provided by the host for JIT execution.
///
/// These are invoked from JIT-generated code (via trampolines) for memory
/// access, system calls, tick counting and other host interactions.
/// Callbacks are assumed total: a failure inside one is the embedder's
/// responsibility.
pub trait Callbacks {
    /// Read a 32-bit instruction word from guest memory. Must return the
    /// same value for a given address until the containing range is
    /// invalidated. Returns `None` if the address is unmapped.
    fn memory_read_code(&mut self, vaddr: u32) -> Option<u32>;

    /// Read 8 bits from guest memory.
    fn memory_read_8(&mut self, vaddr: u32) -> u8;
    /// Read 16 bits from guest memory.
    fn memory_read_16(&mut self, vaddr: u32) -> u16;
    /// Read 32 bits from guest memory.
    fn memory_read_32(&mut self, vaddr: u32) -> u32;
    /// Read 64 bits from guest memory.
    fn memory_read_64(&mut self, vaddr: u32) -> u64;

    /// Write 8 bits to guest memory.
    fn memory_write_8(&mut self, vaddr: u32, value: u8);
    /// Write 16 bits to guest memory.
    fn memory_write_16(&mut self, vaddr: u32, value: u16);
    /// Write 32 bits to guest memory.
    fn memory_write_32(&mut self, vaddr: u32, value: u32);
    /// Write 64 bits to guest memory.
    fn memory_write_64(&mut self, vaddr: u32, value: u64);

    /// Whether the page containing `vaddr` is read-only. Gates folding of
    /// constant-address memory reads at translation time.
    fn is_read_only_memory(&mut self, _vaddr: u32) -> bool {
        false
    }

    /// Called when SVC #imm is executed.
    fn call_svc(&mut self, swi: u32);

    /// Called when a guest-visible exception is raised.
    fn exception_raised(&mut self, pc: u32, exception: ExceptionKind);

    /// Interpret `num_instructions` instructions starting at `pc`.
    ///
    /// Backs the Interpret terminal, which the frontend only produces as a
    /// bail-out; the default notifies the embedder and gives up.
    fn interpreter_fallback(&mut self, pc: u32, _num_instructions: usize) {
        self.exception_raised(pc, ExceptionKind::Undefined);
    }

    /// Add ticks consumed during this execution slice.
    fn add_ticks(&mut self, ticks: u64);

    /// Get the remaining tick budget.
    fn get_ticks_remaining(&mut self) -> u64;
}

/// Fine-grained optimization flags.
///
/// Safe optimizations occupy the low 16 bits. Use bitwise OR to combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptimizationFlag(u32);

impl OptimizationFlag {
    /// Direct jmp patching between compiled blocks.
    pub const BLOCK_LINKING: Self = Self(0x0000_0001);
    /// Return stack buffer prediction for returns.
    pub const RETURN_STACK_BUFFER: Self = Self(0x0000_0002);
    /// Direct-mapped fast-dispatch table consulted before cache lookup.
    pub const FAST_DISPATCH: Self = Self(0x0000_0004);
    /// GetSetElimination IR pass.
    pub const GET_SET_ELIMINATION: Self = Self(0x0000_0008);
    /// ConstantPropagation IR pass (and constant memory reads).
    pub const CONST_PROP: Self = Self(0x0000_0010);
    /// Miscellaneous IR optimizations (merge-interpret-blocks).
    pub const MISC_IR_OPT: Self = Self(0x0000_0020);

    /// No optimizations enabled.
    pub const NO_OPTIMIZATIONS: Self = Self(0);
    /// All safe optimizations enabled.
    pub const ALL_SAFE_OPTIMIZATIONS: Self = Self(0x0000_FFFF);

    /// Returns true if `flag` is set within `self`.
    #[inline]
    pub fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0 && flag.0 != 0
    }

    /// Raw bits.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for OptimizationFlag {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for OptimizationFlag {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for OptimizationFlag {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::Not for OptimizationFlag {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Configuration for creating a [`crate::Jit`] instance.
pub struct Config {
    /// Host callbacks for memory access, system calls and tick counting.
    pub callbacks: Box<dyn Callbacks>,
    /// Whether UNPREDICTABLE inputs execute a documented-reasonable
    /// behaviour instead of raising an exception.
    pub define_unpredictable_behaviour: bool,
    /// Whether hint instructions (SEV/WFE/WFI/YIELD) are reported through
    /// `exception_raised` instead of executing as NOPs.
    pub hook_hint_instructions: bool,
    /// Whether the fast-dispatch table is generated and consulted.
    pub enable_fast_dispatch: bool,
    /// Code cache size in bytes.
    pub code_cache_size: usize,
    /// Which optimization passes and runtime features are enabled.
    pub optimizations: OptimizationFlag,
}

impl Config {
    /// Default code cache size: 128 MiB of reserved address space.
    pub const DEFAULT_CODE_CACHE_SIZE: usize = 128 * 1024 * 1024;

    pub fn new(callbacks: Box<dyn Callbacks>) -> Self {
        Self {
            callbacks,
            define_unpredictable_behaviour: false,
            hook_hint_instructions: false,
            enable_fast_dispatch: true,
            code_cache_size: Self::DEFAULT_CODE_CACHE_SIZE,
            optimizations: OptimizationFlag::ALL_SAFE_OPTIMIZATIONS,
        }
    }

    /// Check whether a specific optimization flag is active.
    pub fn has_optimization(&self, flag: OptimizationFlag) -> bool {
        self.optimizations.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimization_flag_ops() {
        let flags = OptimizationFlag::BLOCK_LINKING | OptimizationFlag::CONST_PROP;
        assert!(flags.contains(OptimizationFlag::BLOCK_LINKING));
        assert!(flags.contains(OptimizationFlag::CONST_PROP));
        assert!(!flags.contains(OptimizationFlag::FAST_DISPATCH));
        assert!(!OptimizationFlag::NO_OPTIMIZATIONS.contains(OptimizationFlag::BLOCK_LINKING));
    }

    #[test]
    fn test_all_safe_contains_each_pass() {
        let all = OptimizationFlag::ALL_SAFE_OPTIMIZATIONS;
        assert!(all.contains(OptimizationFlag::GET_SET_ELIMINATION));
        assert!(all.contains(OptimizationFlag::RETURN_STACK_BUFFER));
        assert!(all.contains(OptimizationFlag::MISC_IR_OPT));
    }
}
