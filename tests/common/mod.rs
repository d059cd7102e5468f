//! Shared test environment: guest memory backed by a code vector, write
//! recording, a tick budget, and a bit-pattern instruction generator.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use a32jit::{Callbacks, Config, ExceptionKind, Jit};

#[derive(Default)]
pub struct EnvState {
    pub code_mem: Vec<u32>,
    pub writes: BTreeMap<u32, u8>,
    pub ticks_left: u64,
    pub exceptions: Vec<(u32, ExceptionKind)>,
    pub svc_calls: Vec<u32>,
}

impl EnvState {
    fn read_byte(&self, vaddr: u32) -> u8 {
        if let Some(&b) = self.writes.get(&vaddr) {
            return b;
        }
        let index = (vaddr / 4) as usize;
        if index < self.code_mem.len() {
            (self.code_mem[index] >> ((vaddr % 4) * 8)) as u8
        } else {
            0
        }
    }

    fn read(&self, vaddr: u32, bytes: u32) -> u64 {
        let mut value = 0u64;
        for i in 0..bytes {
            value |= (self.read_byte(vaddr.wrapping_add(i)) as u64) << (8 * i);
        }
        value
    }

    fn write(&mut self, vaddr: u32, value: u64, bytes: u32) {
        for i in 0..bytes {
            self.writes
                .insert(vaddr.wrapping_add(i), (value >> (8 * i)) as u8);
        }
    }
}

pub struct TestEnv(pub Rc<RefCell<EnvState>>);

impl Callbacks for TestEnv {
    fn memory_read_code(&mut self, vaddr: u32) -> Option<u32> {
        let state = self.0.borrow();
        let index = (vaddr / 4) as usize;
        if vaddr % 4 == 0 && index < state.code_mem.len() {
            Some(state.code_mem[index])
        } else if (vaddr as usize) < state.code_mem.len() * 4 {
            // Halfword-aligned Thumb fetch.
            Some(state.read(vaddr, 4) as u32)
        } else {
            // Off the end of the program: spin in place.
            Some(0xEAFF_FFFE)
        }
    }

    fn memory_read_8(&mut self, vaddr: u32) -> u8 {
        self.0.borrow().read(vaddr, 1) as u8
    }

    fn memory_read_16(&mut self, vaddr: u32) -> u16 {
        self.0.borrow().read(vaddr, 2) as u16
    }

    fn memory_read_32(&mut self, vaddr: u32) -> u32 {
        self.0.borrow().read(vaddr, 4) as u32
    }

    fn memory_read_64(&mut self, vaddr: u32) -> u64 {
        self.0.borrow().read(vaddr, 8)
    }

    fn memory_write_8(&mut self, vaddr: u32, value: u8) {
        self.0.borrow_mut().write(vaddr, value as u64, 1);
    }

    fn memory_write_16(&mut self, vaddr: u32, value: u16) {
        self.0.borrow_mut().write(vaddr, value as u64, 2);
    }

    fn memory_write_32(&mut self, vaddr: u32, value: u32) {
        self.0.borrow_mut().write(vaddr, value as u64, 4);
    }

    fn memory_write_64(&mut self, vaddr: u32, value: u64) {
        self.0.borrow_mut().write(vaddr, value, 8);
    }

    fn call_svc(&mut self, swi: u32) {
        self.0.borrow_mut().svc_calls.push(swi);
    }

    fn exception_raised(&mut self, pc: u32, exception: ExceptionKind) {
        self.0.borrow_mut().exceptions.push((pc, exception));
    }

    fn add_ticks(&mut self, ticks: u64) {
        let mut state = self.0.borrow_mut();
        state.ticks_left = state.ticks_left.saturating_sub(ticks);
    }

    fn get_ticks_remaining(&mut self) -> u64 {
        self.0.borrow().ticks_left
    }
}

/// A JIT wired to a fresh shared environment.
pub fn make_jit(code: &[u32]) -> (Jit, Rc<RefCell<EnvState>>) {
    let env = Rc::new(RefCell::new(EnvState {
        code_mem: code.to_vec(),
        ..EnvState::default()
    }));
    let config = Config::new(Box::new(TestEnv(env.clone())));
    let jit = Jit::new(config).expect("failed to construct JIT");
    (jit, env)
}

pub fn run_ticks(jit: &mut Jit, env: &Rc<RefCell<EnvState>>, ticks: u64) {
    env.borrow_mut().ticks_left = ticks;
    jit.run();
}

/// Generates random instruction words from a 32-character bit-pattern
/// template (`0`, `1` or don't-care) with a validity predicate.
pub struct InstructionGenerator {
    bits: u32,
    mask: u32,
    is_valid: fn(u32) -> bool,
}

impl InstructionGenerator {
    pub fn new(format: &str, is_valid: fn(u32) -> bool) -> Self {
        assert_eq!(format.len(), 32);
        let mut bits = 0;
        let mut mask = 0;
        for (i, c) in format.chars().enumerate() {
            let bit = 1u32 << (31 - i);
            match c {
                '0' => mask |= bit,
                '1' => {
                    bits |= bit;
                    mask |= bit;
                }
                _ => {}
            }
        }
        Self {
            bits,
            mask,
            is_valid,
        }
    }

    pub fn generate(&self, rng: &mut XorShift) -> u32 {
        loop {
            let random = rng.next() as u32;
            // Condition AL keeps generated programs deterministic.
            let inst = ((self.bits | (random & !self.mask)) & 0x0FFF_FFFF) | 0xE000_0000;
            if (self.is_valid)(inst) {
                return inst;
            }
        }
    }
}

/// Deterministic xorshift64 for repeatable pseudo-random test inputs.
pub struct XorShift(pub u64);

impl XorShift {
    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}
