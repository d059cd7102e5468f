use crate::ir::block::Block;
use crate::ir::opcode::Opcode;
use crate::ir::value::{InstRef, Value};

/// What kind of storage a tracked slot currently models. A slot whose
/// tracking kind changes (e.g. an S register observed through its D alias)
/// is re-established rather than forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackKind {
    Reg,
    Ext32,
    Ext64,
    CFlag,
    NFlag,
    ZFlag,
    VFlag,
    Ge,
}

#[derive(Clone, Default)]
struct SlotInfo {
    /// Last known value of the slot, if any.
    value: Option<Value>,
    kind: Option<TrackKind>,
    /// Whether `value` came from a still-live Set that a later Set may
    /// supersede.
    set_present: bool,
    last_set_index: usize,
}

impl SlotInfo {
    fn reset(&mut self) {
        *self = SlotInfo::default();
    }
}

/// A32 get/set elimination.
///
/// Forward-propagates the last `Set` of each guest register or flag into
/// subsequent `Get`s, and drops a `Set` superseded by a later `Set` of the
/// same slot with no intervening escape. The escape set is anything that
/// can observe or modify guest state outside the tracked ops: supervisor
/// calls, exceptions, memory accesses, whole-CPSR writes.
pub fn a32_get_set_elimination(block: &mut Block) {
    let mut regs: [SlotInfo; 16] = std::array::from_fn(|_| SlotInfo::default());
    let mut exts: [SlotInfo; 64] = std::array::from_fn(|_| SlotInfo::default());
    let mut n_flag = SlotInfo::default();
    let mut z_flag = SlotInfo::default();
    let mut c_flag = SlotInfo::default();
    let mut v_flag = SlotInfo::default();
    let mut ge = SlotInfo::default();

    for i in 0..block.instructions.len() {
        if block.instructions[i].is_tombstone() {
            continue;
        }
        let opcode = block.instructions[i].opcode;
        let inst_ref = InstRef(i as u32);

        match opcode {
            Opcode::A32GetRegister => {
                let r = block.instructions[i].args[0].get_reg().number();
                do_get(block, &mut regs[r], inst_ref, TrackKind::Reg);
            }
            Opcode::A32SetRegister => {
                let r = block.instructions[i].args[0].get_reg().number();
                let value = block.instructions[i].args[1];
                do_set(block, &mut regs[r], value, i, TrackKind::Reg);
            }
            Opcode::A32GetExtendedRegister32 => {
                let idx = block.instructions[i].args[0].get_ext_reg().backing_index();
                do_get(block, &mut exts[idx], inst_ref, TrackKind::Ext32);
            }
            Opcode::A32SetExtendedRegister32 => {
                let reg = block.instructions[i].args[0].get_ext_reg();
                let idx = reg.backing_index();
                let value = block.instructions[i].args[1];
                // The write also clobbers any D alias tracked over this slot.
                exts[idx ^ 1].reset();
                do_set(block, &mut exts[idx], value, i, TrackKind::Ext32);
            }
            Opcode::A32GetExtendedRegister64 => {
                let idx = block.instructions[i].args[0].get_ext_reg().backing_index();
                exts[idx + 1].reset();
                do_get(block, &mut exts[idx], inst_ref, TrackKind::Ext64);
            }
            Opcode::A32SetExtendedRegister64 => {
                let idx = block.instructions[i].args[0].get_ext_reg().backing_index();
                let value = block.instructions[i].args[1];
                exts[idx + 1].reset();
                do_set(block, &mut exts[idx], value, i, TrackKind::Ext64);
            }
            Opcode::A32GetCFlag => {
                do_get(block, &mut c_flag, inst_ref, TrackKind::CFlag);
            }
            Opcode::A32SetCFlag => {
                let value = block.instructions[i].args[0];
                do_set(block, &mut c_flag, value, i, TrackKind::CFlag);
            }
            Opcode::A32SetNFlag => {
                let value = block.instructions[i].args[0];
                do_set(block, &mut n_flag, value, i, TrackKind::NFlag);
            }
            Opcode::A32SetZFlag => {
                let value = block.instructions[i].args[0];
                do_set(block, &mut z_flag, value, i, TrackKind::ZFlag);
            }
            Opcode::A32SetVFlag => {
                let value = block.instructions[i].args[0];
                do_set(block, &mut v_flag, value, i, TrackKind::VFlag);
            }
            Opcode::A32GetGEFlags => {
                do_get(block, &mut ge, inst_ref, TrackKind::Ge);
            }
            Opcode::A32SetGEFlags => {
                let value = block.instructions[i].args[0];
                do_set(block, &mut ge, value, i, TrackKind::Ge);
            }
            // Reading the whole CPSR observes every flag; pin down all
            // pending flag stores without forgetting register values.
            Opcode::A32GetCpsr | Opcode::A32GetFpscr => {
                for info in [&mut n_flag, &mut z_flag, &mut c_flag, &mut v_flag, &mut ge] {
                    info.set_present = false;
                }
            }
            // Writes NZCV wholesale; prior individual stores stay (they
            // wrote other fields' views) but forwarding is no longer valid.
            Opcode::A32SetCpsrNZCVRaw | Opcode::A32SetFpscrNZCV => {
                for info in [&mut n_flag, &mut z_flag, &mut c_flag, &mut v_flag] {
                    info.reset();
                }
            }
            _ => {
                if opcode.is_a32_state_barrier() {
                    for slot in regs.iter_mut() {
                        slot.reset();
                    }
                    for slot in exts.iter_mut() {
                        slot.reset();
                    }
                    for info in [&mut n_flag, &mut z_flag, &mut c_flag, &mut v_flag, &mut ge] {
                        info.reset();
                    }
                }
            }
        }
    }
}

fn do_get(block: &mut Block, info: &mut SlotInfo, get_inst: InstRef, kind: TrackKind) {
    if let (Some(known), Some(known_kind)) = (info.value, info.kind) {
        if known_kind == kind {
            block.replace_uses_with(get_inst, known);
            return;
        }
    }

    *info = SlotInfo {
        value: Some(Value::Inst(get_inst)),
        kind: Some(kind),
        set_present: false,
        last_set_index: 0,
    };
}

fn do_set(block: &mut Block, info: &mut SlotInfo, value: Value, set_idx: usize, kind: TrackKind) {
    if info.set_present && info.kind == Some(kind) {
        // The previous store is superseded with no intervening observer.
        let prev = info.last_set_index;
        let num_args = block.instructions[prev].num_args();
        for j in 0..num_args {
            if let Value::Inst(r) = block.instructions[prev].args[j] {
                let arg = &mut block.instructions[r.index()];
                arg.use_count = arg.use_count.saturating_sub(1);
            }
        }
        block.instructions[prev].tombstone();
    }

    *info = SlotInfo {
        value: Some(value),
        kind: Some(kind),
        set_present: true,
        last_set_index: set_idx,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::a32::types::Reg;
    use crate::ir::location::LocationDescriptor;

    #[test]
    fn test_get_after_set_is_forwarded() {
        let mut block = Block::new(LocationDescriptor(0));
        let v = Value::ImmU32(42);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), v]);
        let get = block.append(Opcode::A32GetRegister, &[Value::ImmReg(Reg::R0)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R1), Value::Inst(get)]);

        a32_get_set_elimination(&mut block);

        assert!(block.get(get).is_tombstone());
        assert_eq!(block.instructions[2].args[1], Value::ImmU32(42));
    }

    #[test]
    fn test_dead_store_is_removed() {
        let mut block = Block::new(LocationDescriptor(0));
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::ImmU32(1)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::ImmU32(2)]);

        a32_get_set_elimination(&mut block);

        assert!(block.instructions[0].is_tombstone());
        assert!(!block.instructions[1].is_tombstone());
    }

    #[test]
    fn test_memory_op_is_an_escape() {
        let mut block = Block::new(LocationDescriptor(0));
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::ImmU32(1)]);
        block.append(Opcode::WriteMemory32, &[Value::ImmU32(0x100), Value::ImmU32(0)]);
        block.append(Opcode::A32SetRegister, &[Value::ImmReg(Reg::R0), Value::ImmU32(2)]);

        a32_get_set_elimination(&mut block);

        // The first store escaped through the memory write; both stay.
        assert!(!block.instructions[0].is_tombstone());
        assert!(!block.instructions[2].is_tombstone());
    }

    #[test]
    fn test_c_flag_forwarding() {
        let mut block = Block::new(LocationDescriptor(0));
        let c = Value::ImmU1(true);
        block.append(Opcode::A32SetCFlag, &[c]);
        let get = block.append(Opcode::A32GetCFlag, &[]);
        block.append(Opcode::A32SetNFlag, &[Value::Inst(get)]);

        a32_get_set_elimination(&mut block);

        assert!(block.get(get).is_tombstone());
        assert_eq!(block.instructions[2].args[0], Value::ImmU1(true));
    }

    #[test]
    fn test_s_write_invalidates_d_alias() {
        use crate::frontend::a32::types::ExtReg;
        let mut block = Block::new(LocationDescriptor(0));
        block.append(
            Opcode::A32SetExtendedRegister64,
            &[Value::ImmExtReg(ExtReg::D(0)), Value::ImmU64(7)],
        );
        block.append(
            Opcode::A32SetExtendedRegister32,
            &[Value::ImmExtReg(ExtReg::S(1)), Value::ImmU32(9)],
        );
        let get = block.append(
            Opcode::A32GetExtendedRegister64,
            &[Value::ImmExtReg(ExtReg::D(0))],
        );
        block.append(
            Opcode::A32SetRegister,
            &[Value::ImmReg(Reg::R0), Value::ImmU32(0)],
        );
        let _ = get;

        a32_get_set_elimination(&mut block);

        // The D0 read must not be forwarded from the stale D0 store.
        assert!(!block.get(get).is_tombstone());
    }
}
