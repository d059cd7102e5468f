use crate::jit_config::ExceptionKind;

use super::ArmVisitor;

/// NOP and hint encodings with no architectural effect (PLD, DSB-class
/// barriers on a single-core guest).
pub fn arm_nop(v: &mut ArmVisitor<'_>) -> bool {
    let _ = v;
    true
}

fn emit_hint(v: &mut ArmVisitor<'_>, kind: ExceptionKind) -> bool {
    if v.options.hook_hint_instructions {
        return v.raise_exception(kind);
    }
    true
}

pub fn arm_yield(v: &mut ArmVisitor<'_>) -> bool {
    emit_hint(v, ExceptionKind::Yield)
}

pub fn arm_wfe(v: &mut ArmVisitor<'_>) -> bool {
    emit_hint(v, ExceptionKind::WaitForEvent)
}

pub fn arm_wfi(v: &mut ArmVisitor<'_>) -> bool {
    emit_hint(v, ExceptionKind::WaitForInterrupt)
}

pub fn arm_sev(v: &mut ArmVisitor<'_>) -> bool {
    emit_hint(v, ExceptionKind::SendEvent)
}
