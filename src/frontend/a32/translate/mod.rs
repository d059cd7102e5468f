pub mod branch;
pub mod conditional_state;
pub mod data_processing;
pub mod divide;
pub mod exception;
pub mod extension;
pub mod helpers;
pub mod hint;
pub mod load_store;
pub mod load_store_multiple;
pub mod misc;
pub mod multiply;
pub mod packing;
pub mod parallel;
pub mod reversal;
pub mod saturated;
pub mod status_register;
pub mod thumb16;
pub mod thumb32;
pub mod vfp;

use tracing::trace;

use crate::frontend::a32::decoder::{self, Matcher};
use crate::frontend::a32::it_state::ItState;
use crate::frontend::a32::types::{ExtReg, Reg};
use crate::ir::a32_emitter::A32IrEmitter;
use crate::ir::block::Block;
use crate::ir::cond::Cond;
use crate::ir::location::A32LocationDescriptor;
use crate::ir::terminal::Terminal;
use crate::ir::value::Value;
use crate::jit_config::ExceptionKind;
use self::conditional_state::{ConditionalState, Disposition};

/// Enumerated translation options, fixed per JIT instance.
#[derive(Debug, Clone, Copy)]
pub struct TranslationOptions {
    /// UNPREDICTABLE inputs execute a documented-reasonable behaviour
    /// instead of raising an exception.
    pub define_unpredictable_behaviour: bool,
    /// Hint instructions are reported through `exception_raised`.
    pub hook_hint_instructions: bool,
    /// Maximum guest instructions per block before falling off with a
    /// LinkBlock to the next location.
    pub max_instructions: usize,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            define_unpredictable_behaviour: false,
            hook_hint_instructions: false,
            max_instructions: 64,
        }
    }
}

/// Per-instruction visitor context handed to decode-table handlers.
///
/// Named bitfields bound by the matched pattern are read through
/// [`ArmVisitor::field`]; IR is appended through `ir`.
pub struct ArmVisitor<'a> {
    pub ir: A32IrEmitter<'a>,
    pub word: u32,
    pub matcher: &'static Matcher,
    pub options: TranslationOptions,
    /// Set by the Thumb IT instruction; applied to the cursor by the
    /// translation loop.
    pub new_it_state: Option<ItState>,
}

/// Handler signature stored in the decode tables. Returns `true` to
/// continue translating into the same block, `false` when a terminal has
/// been set.
pub type Handler = fn(&mut ArmVisitor<'_>) -> bool;

impl<'a> ArmVisitor<'a> {
    /// Extract the named bitfield bound by the matched pattern.
    pub fn field(&self, letter: char) -> u32 {
        self.matcher.field(letter, self.word)
    }

    pub fn reg(&self, letter: char) -> Reg {
        Reg::from_u32(self.field(letter))
    }

    /// The instruction's condition nibble (A32 encodings only).
    pub fn cond(&self) -> Cond {
        Cond::from_u8((self.word >> 28) as u8)
    }

    /// A VFP register from a 4-bit field plus its extension bit, sized by
    /// the `z` (double-precision) bit.
    pub fn vfp_reg(&self, double: bool, base: u32, ext: u32) -> ExtReg {
        if double {
            ExtReg::D(((ext << 4) | base) as u8)
        } else {
            ExtReg::S(((base << 1) | ext) as u8)
        }
    }

    /// The location of the instruction following this one.
    pub fn next_location(&self) -> A32LocationDescriptor {
        let loc = self.ir.current_location;
        loc.advance_pc(loc.instruction_size() as i32)
    }

    /// Raise Undefined and bail to the dispatcher.
    pub fn undefined(&mut self) -> bool {
        self.ir.exception_raised(ExceptionKind::Undefined);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    /// Handle an UNPREDICTABLE input per configuration. Returns `true`
    /// when the caller should proceed with its documented behaviour.
    pub fn unpredictable(&mut self) -> bool {
        if self.options.define_unpredictable_behaviour {
            return true;
        }
        self.ir.exception_raised(ExceptionKind::UnpredictableInstruction);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    /// Raise an exception and resume at the next instruction unless the
    /// embedder halted.
    pub fn raise_exception(&mut self, kind: ExceptionKind) -> bool {
        self.ir.exception_raised(kind);
        let next = self.next_location();
        self.ir.set_term(Terminal::check_halt(Terminal::link_block(next.to_location())));
        false
    }
}

/// Translate a basic block of guest code starting at `descriptor`.
///
/// Fetches instruction words through `read_code`, decodes and visits each
/// instruction, and stops when a visitor sets a terminal or the block
/// length cap is hit (falling off with `LinkBlock` to the next location).
pub fn translate(
    descriptor: A32LocationDescriptor,
    read_code: &mut dyn FnMut(u32) -> Option<u32>,
    options: TranslationOptions,
) -> Block {
    let mut block = Block::new(descriptor.to_location());
    let mut cond_state = ConditionalState::new();
    let mut current = descriptor;

    loop {
        let stepped = if current.t_flag() {
            translate_thumb_instruction(&mut block, &mut cond_state, &mut current, read_code, options)
        } else {
            translate_arm_instruction(&mut block, &mut cond_state, &mut current, read_code, options)
        };

        match stepped {
            Step::Continue => {
                if block.cycle_count >= options.max_instructions as u64 {
                    block.set_terminal(Terminal::link_block(current.to_location()));
                    break;
                }
            }
            Step::Stop => break,
        }
    }

    if block.terminal.is_invalid() {
        block.set_terminal(Terminal::link_block(current.to_location()));
    }
    if block.cond.is_some() {
        block.cond_failed_location = Some(current.to_location());
    }
    block.end_address = current.pc();

    trace!(
        pc = format_args!("{:#x}", descriptor.pc()),
        instructions = block.cycle_count,
        terminal = %block.terminal,
        "translated block"
    );
    block
}

/// Translate exactly one instruction; used by single-stepping and the
/// merge-interpret-blocks probe.
pub fn translate_single(
    descriptor: A32LocationDescriptor,
    read_code: &mut dyn FnMut(u32) -> Option<u32>,
    options: TranslationOptions,
) -> Block {
    let options = TranslationOptions {
        max_instructions: 1,
        ..options
    };
    translate(descriptor, read_code, options)
}

enum Step {
    Continue,
    Stop,
}

fn translate_arm_instruction(
    block: &mut Block,
    cond_state: &mut ConditionalState,
    current: &mut A32LocationDescriptor,
    read_code: &mut dyn FnMut(u32) -> Option<u32>,
    options: TranslationOptions,
) -> Step {
    let pc = current.pc();
    let Some(word) = read_code(pc) else {
        let mut ir = A32IrEmitter::new(block, *current);
        ir.exception_raised(ExceptionKind::NoExecuteSetPC);
        ir.set_term(Terminal::ReturnToDispatch);
        return Step::Stop;
    };

    let cond = Cond::from_u8((word >> 28) as u8);
    match cond_state.consider(cond, block) {
        Disposition::Proceed => {}
        Disposition::BreakBlock => {
            block.set_terminal(Terminal::link_block(current.to_location()));
            return Step::Stop;
        }
    }

    let should_continue = match decoder::decode_arm(word) {
        Some(matcher) => {
            let mut visitor = ArmVisitor {
                ir: A32IrEmitter::new(block, *current),
                word,
                matcher,
                options,
                new_it_state: None,
            };
            (matcher.handler)(&mut visitor)
        }
        None => {
            let mut visitor = decode_miss_visitor(block, *current, word, options);
            visitor.undefined()
        }
    };

    block.cycle_count += 1;
    *current = current.advance_pc(4);
    if should_continue {
        Step::Continue
    } else {
        Step::Stop
    }
}

fn translate_thumb_instruction(
    block: &mut Block,
    cond_state: &mut ConditionalState,
    current: &mut A32LocationDescriptor,
    read_code: &mut dyn FnMut(u32) -> Option<u32>,
    options: TranslationOptions,
) -> Step {
    let pc = current.pc();
    let Some(fetch) = read_code(pc) else {
        let mut ir = A32IrEmitter::new(block, *current);
        ir.exception_raised(ExceptionKind::NoExecuteSetPC);
        ir.set_term(Terminal::ReturnToDispatch);
        return Step::Stop;
    };
    let hw1 = (fetch & 0xFFFF) as u16;
    let is_thumb32 = (hw1 >> 11) >= 0b11101;

    let it = current.it();
    let cond = if it.is_in_it_block() { it.cond() } else { Cond::AL };
    match cond_state.consider(cond, block) {
        Disposition::Proceed => {}
        Disposition::BreakBlock => {
            block.set_terminal(Terminal::link_block(current.to_location()));
            return Step::Stop;
        }
    }

    let (word, advance, matcher) = if is_thumb32 {
        let Some(hw2_fetch) = read_code(pc.wrapping_add(2)) else {
            let mut ir = A32IrEmitter::new(block, *current);
            ir.exception_raised(ExceptionKind::NoExecuteSetPC);
            ir.set_term(Terminal::ReturnToDispatch);
            return Step::Stop;
        };
        let hw2 = (hw2_fetch & 0xFFFF) as u16;
        let word = ((hw1 as u32) << 16) | hw2 as u32;
        (word, 4, decoder::decode_thumb32(word))
    } else {
        (hw1 as u32, 2, decoder::decode_thumb16(hw1))
    };

    let mut new_it_state = None;
    let should_continue = match matcher {
        Some(matcher) => {
            let mut visitor = ArmVisitor {
                ir: A32IrEmitter::new(block, *current),
                word,
                matcher,
                options,
                new_it_state: None,
            };
            let cont = (matcher.handler)(&mut visitor);
            new_it_state = visitor.new_it_state;
            cont
        }
        None => {
            let mut visitor = decode_miss_visitor(block, *current, word, options);
            visitor.undefined()
        }
    };

    block.cycle_count += 1;
    *current = current.advance_pc(advance);
    *current = match new_it_state {
        // The IT instruction establishes new state for what follows.
        Some(it) => current.set_it(it),
        None => current.advance_it(),
    };

    if should_continue {
        Step::Continue
    } else {
        Step::Stop
    }
}

fn decode_miss_visitor<'a>(
    block: &'a mut Block,
    location: A32LocationDescriptor,
    word: u32,
    options: TranslationOptions,
) -> ArmVisitor<'a> {
    ArmVisitor {
        ir: A32IrEmitter::new(block, location),
        word,
        matcher: decoder::invalid_matcher(),
        options,
        new_it_state: None,
    }
}

/// Probe whether the single instruction at `loc` would immediately bail
/// to the interpreter; drives the merge-interpret-blocks pass.
pub fn would_interpret(
    loc: A32LocationDescriptor,
    read_code: &mut dyn FnMut(u32) -> Option<u32>,
    options: TranslationOptions,
) -> bool {
    let block = translate_single(loc, read_code, options);
    matches!(block.terminal, Terminal::Interpret { .. })
}

/// Shared tail for writing a computed value to the PC from a visitor,
/// choosing the terminal hint by the source of the branch.
pub fn emit_bx_and_terminal(v: &mut ArmVisitor<'_>, target: Value, is_return: bool) -> bool {
    v.ir.bx_write_pc(target);
    if is_return {
        v.ir.set_term(Terminal::PopRSBHint);
    } else {
        v.ir.set_term(Terminal::FastDispatchHint);
    }
    false
}
