//! Optimization passes applied, in a fixed order, to each translated
//! block before emission. Every pass rewrites the block in place and
//! preserves observable guest semantics exactly: nothing is reordered
//! past an impure op and floating-point expressions are never
//! reassociated.

pub mod constant_memory_reads;
pub mod constant_propagation;
pub mod dead_code_elimination;
pub mod get_set_elimination;
pub mod merge_interpret_blocks;
pub mod verification;

pub use constant_memory_reads::constant_memory_reads;
pub use constant_propagation::constant_propagation;
pub use dead_code_elimination::dead_code_elimination;
pub use get_set_elimination::a32_get_set_elimination;
pub use merge_interpret_blocks::merge_interpret_blocks;
pub use verification::verification_pass;
