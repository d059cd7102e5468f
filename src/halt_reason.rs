use bitflags::bitflags;

bitflags! {
    /// Reasons the JIT execution loop stopped.
    ///
    /// Multiple reasons can be active simultaneously (OR'd together).
    /// An empty set means the tick budget was exhausted normally.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HaltReason: u32 {
        /// Single-step completed.
        const STEP               = 1 << 0;
        /// Exception raised during execution.
        const EXCEPTION_RAISED   = 1 << 3;
        /// Cache invalidation was requested from within a callback.
        const CACHE_INVALIDATION = 1 << 4;
        /// External halt requested via `halt_execution`.
        const EXTERNAL_HALT      = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_reason_bitflags() {
        let reason = HaltReason::EXTERNAL_HALT | HaltReason::CACHE_INVALIDATION;
        assert!(reason.contains(HaltReason::EXTERNAL_HALT));
        assert!(reason.contains(HaltReason::CACHE_INVALIDATION));
        assert!(!reason.contains(HaltReason::EXCEPTION_RAISED));
    }

    #[test]
    fn test_halt_reason_empty_means_ticks_exhausted() {
        let reason = HaltReason::empty();
        assert!(reason.is_empty());
        assert_eq!(reason.bits(), 0);
    }
}
