pub mod abi;
pub mod block_cache;
pub mod block_of_code;
pub mod code_buffer;
pub mod emit;
pub mod emit_terminal;
pub mod helpers;
pub mod hostloc;
pub mod invalidation;
pub mod jit_state;
pub mod reg_alloc;

/// The assembler type every emitter writes through: a `dynasmrt`
/// vector assembler positioned at the block's final absolute address, so
/// jumps to dispatcher stubs resolve at assembly time.
pub type Asm = dynasmrt::VecAssembler<dynasmrt::x64::X64Relocation>;
