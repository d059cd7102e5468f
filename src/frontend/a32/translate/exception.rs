use crate::ir::terminal::Terminal;
use crate::ir::value::Value;
use crate::jit_config::ExceptionKind;

use super::ArmVisitor;

/// SVC: supervisor call. Execution resumes at the next instruction unless
/// the embedder halted from the callback.
pub fn arm_svc(v: &mut ArmVisitor<'_>) -> bool {
    let imm = v.field('v');
    v.ir.call_supervisor(Value::ImmU32(imm));
    let next = v.next_location();
    v.ir.set_term(Terminal::check_halt(Terminal::link_block_fast(next.to_location())));
    false
}

/// BKPT: breakpoint.
pub fn arm_bkpt(v: &mut ArmVisitor<'_>) -> bool {
    v.raise_exception(ExceptionKind::Breakpoint)
}

/// UDF: permanently undefined encoding.
pub fn arm_udf(v: &mut ArmVisitor<'_>) -> bool {
    v.undefined()
}
