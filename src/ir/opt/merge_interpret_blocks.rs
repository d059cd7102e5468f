use crate::ir::block::Block;
use crate::ir::location::{A32LocationDescriptor, LocationDescriptor};
use crate::ir::terminal::Terminal;

/// Upper bound on how many instructions a single Interpret terminal may
/// cover. Keeps the probe loop finite on pathological input.
const MAX_MERGED_INSTRUCTIONS: usize = 64;

/// Extend an Interpret terminal over consecutive instructions that would
/// also interpret, instead of bouncing through the dispatcher between
/// them.
///
/// `would_interpret` probes whether translating the single instruction at
/// a location would immediately bail to the interpreter; the caller wires
/// it to the frontend so this pass stays independent of decode tables.
pub fn merge_interpret_blocks(
    block: &mut Block,
    would_interpret: &mut dyn FnMut(A32LocationDescriptor) -> bool,
) {
    let Terminal::Interpret {
        next,
        num_instructions,
    } = block.terminal
    else {
        return;
    };

    let start = A32LocationDescriptor::from_location(next);
    if start.single_stepping() {
        return;
    }

    let step = start.instruction_size() as i32;
    let mut count = num_instructions;
    let mut cursor = start.advance_pc(step * num_instructions as i32);

    while count < MAX_MERGED_INSTRUCTIONS && would_interpret(cursor) {
        count += 1;
        cursor = cursor.advance_pc(step);
    }

    if count != num_instructions {
        block.set_terminal(Terminal::Interpret {
            next,
            num_instructions: count,
        });
    }
}

/// Convenience wrapper used by tests.
pub fn interpret_terminal(next: LocationDescriptor, num_instructions: usize) -> Terminal {
    Terminal::Interpret {
        next,
        num_instructions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merges_consecutive_interpreted_instructions() {
        let start = A32LocationDescriptor::at(0x100);
        let mut block = Block::new(start.to_location());
        block.set_terminal(interpret_terminal(start.to_location(), 1));

        // Instructions at 0x104 and 0x108 would also interpret.
        let mut probe = |loc: A32LocationDescriptor| matches!(loc.pc(), 0x104 | 0x108);
        merge_interpret_blocks(&mut block, &mut probe);

        match block.terminal {
            Terminal::Interpret {
                num_instructions, ..
            } => assert_eq!(num_instructions, 3),
            ref t => panic!("unexpected terminal {t}"),
        }
    }

    #[test]
    fn test_non_interpret_terminal_untouched() {
        let mut block = Block::new(LocationDescriptor(0));
        block.set_terminal(Terminal::ReturnToDispatch);
        let mut probe = |_loc: A32LocationDescriptor| true;
        merge_interpret_blocks(&mut block, &mut probe);
        assert!(matches!(block.terminal, Terminal::ReturnToDispatch));
    }
}
