use thiserror::Error;

/// Errors surfaced while constructing a JIT instance.
///
/// Failures during emission itself (assembly errors, allocator conflicts)
/// are internal invariant violations and assert instead; they are never
/// surfaced to the guest.
#[derive(Debug, Error)]
pub enum JitError {
    /// The executable code buffer could not be mapped.
    #[error("failed to map code buffer of {size} bytes (errno {errno})")]
    CodeBufferAllocation { size: usize, errno: i32 },

    /// The configured code cache size is too small to hold the dispatcher
    /// prelude plus at least one block.
    #[error("code cache size {0} is too small")]
    CodeCacheTooSmall(usize),
}
