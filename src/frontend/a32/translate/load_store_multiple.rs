use crate::frontend::a32::types::Reg;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;

use super::ArmVisitor;

/// Start address and writeback delta for the four LDM/STM addressing
/// modes, relative to the base register.
fn start_offset(p: bool, u: bool, count: u32) -> (i64, i64) {
    match (p, u) {
        // IA: start at base, base += 4n.
        (false, true) => (0, 4 * count as i64),
        // IB: start at base + 4.
        (true, true) => (4, 4 * count as i64),
        // DA: start at base - 4n + 4, base -= 4n.
        (false, false) => (-(4 * count as i64) + 4, -(4 * count as i64)),
        // DB: start at base - 4n.
        (true, false) => (-(4 * count as i64), -(4 * count as i64)),
    }
}

fn add_imm(v: &mut ArmVisitor<'_>, base: Value, delta: i64) -> Value {
    match delta {
        0 => base,
        d if d > 0 => v.ir.ir().add_32(base, Value::ImmU32(d as u32), Value::ImmU1(false)),
        d => v.ir.ir().sub_32(base, Value::ImmU32((-d) as u32), Value::ImmU1(true)),
    }
}

/// LDM and variants (IA/IB/DA/DB selected by P/U).
pub fn arm_ldm(v: &mut ArmVisitor<'_>) -> bool {
    let list = v.field('r');
    let w = v.field('w') != 0;
    let rn = v.reg('n');
    let count = list.count_ones();
    if rn == Reg::R15 || count == 0 {
        return v.unpredictable();
    }

    let (start, delta) = start_offset(v.field('p') != 0, v.field('u') != 0, count);
    let base = v.ir.get_register(rn);
    let mut address = add_imm(v, base, start);

    let mut pc_value = None;
    for i in 0..16 {
        if list & (1 << i) == 0 {
            continue;
        }
        let data = v.ir.read_memory_32(address);
        if i == 15 {
            pc_value = Some(data);
        } else {
            v.ir.set_register(Reg::from_u32(i), data);
        }
        address = v.ir.ir().add_32(address, Value::ImmU32(4), Value::ImmU1(false));
    }

    if w && list & (1 << rn.number()) == 0 {
        let new_base = add_imm(v, base, delta);
        v.ir.set_register(rn, new_base);
    }

    if let Some(data) = pc_value {
        v.ir.bx_write_pc(data);
        v.ir.set_term(Terminal::PopRSBHint);
        return false;
    }
    true
}

/// STM and variants.
pub fn arm_stm(v: &mut ArmVisitor<'_>) -> bool {
    let list = v.field('r');
    let w = v.field('w') != 0;
    let rn = v.reg('n');
    let count = list.count_ones();
    if rn == Reg::R15 || count == 0 {
        return v.unpredictable();
    }

    let (start, delta) = start_offset(v.field('p') != 0, v.field('u') != 0, count);
    let base = v.ir.get_register(rn);
    let mut address = add_imm(v, base, start);

    for i in 0..16 {
        if list & (1 << i) == 0 {
            continue;
        }
        let data = v.ir.get_register(Reg::from_u32(i));
        v.ir.write_memory_32(address, data);
        address = v.ir.ir().add_32(address, Value::ImmU32(4), Value::ImmU1(false));
    }

    if w {
        let new_base = add_imm(v, base, delta);
        v.ir.set_register(rn, new_base);
    }
    true
}
