//! A dynamic binary translator for 32-bit ARM guest code.
//!
//! Guest A32 (and a Thumb subset, with scalar VFP) instructions are
//! recompiled at runtime into x86-64 host code and executed directly. The
//! embedding host supplies guest memory, timing and system-call semantics
//! through the [`jit_config::Callbacks`] trait; the engine owns the
//! executable code cache, the dispatcher and the invalidation protocol.
//!
//! Create one [`jit::Jit`] per emulated core, configure callbacks, then
//! call [`jit::Jit::run`].

pub mod backend;
pub mod error;
pub mod frontend;
pub mod halt_reason;
pub mod ir;
pub mod jit;
pub mod jit_config;

pub use error::JitError;
pub use halt_reason::HaltReason;
pub use jit::{Context, Jit};
pub use jit_config::{Callbacks, Config, ExceptionKind, OptimizationFlag};
