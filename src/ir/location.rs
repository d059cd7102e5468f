use std::fmt;

use crate::frontend::a32::fpscr::{Fpscr, FPSCR_MODE_MASK};
use crate::frontend::a32::it_state::ItState;
use crate::frontend::a32::psr::Psr;

/// Generic location descriptor: the folded u64 hash that keys the block
/// cache. Two descriptors are equal iff all of their fields match
/// bit-for-bit, which the folding preserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationDescriptor(pub u64);

impl LocationDescriptor {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loc:{:#018x}", self.0)
    }
}

// Bit positions inside the upper location descriptor word.
const UPPER_T_BIT: u32 = 1 << 0;
const UPPER_E_BIT: u32 = 1 << 1;
const UPPER_SINGLE_STEP_BIT: u32 = 1 << 2;
const UPPER_IT_SHIFT: u32 = 8;
const UPPER_IT_MASK: u32 = 0xFF << UPPER_IT_SHIFT;

/// A32 location descriptor.
///
/// The low 32 bits of the folded hash are the guest PC. The high 32 bits
/// ("upper location descriptor") collect everything else that changes the
/// meaning of code at that PC: the FPSCR mode bits, the Thumb and
/// endianness execution state, IT-block state and the single-step flag.
/// The guest state block mirrors the upper word so emitted code can
/// rebuild the full descriptor cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct A32LocationDescriptor {
    arm_pc: u32,
    upper: u32,
}

impl A32LocationDescriptor {
    pub fn new(arm_pc: u32, cpsr: Psr, fpscr: Fpscr, single_stepping: bool) -> Self {
        let mut upper = fpscr.value() & FPSCR_MODE_MASK;
        if cpsr.t() {
            upper |= UPPER_T_BIT;
        }
        if cpsr.e() {
            upper |= UPPER_E_BIT;
        }
        if single_stepping {
            upper |= UPPER_SINGLE_STEP_BIT;
        }
        upper |= (cpsr.it() as u32) << UPPER_IT_SHIFT;
        Self { arm_pc, upper }
    }

    /// A descriptor at `pc` in ARM state with default modes.
    pub fn at(pc: u32) -> Self {
        Self {
            arm_pc: pc,
            upper: 0,
        }
    }

    pub fn from_parts(arm_pc: u32, upper: u32) -> Self {
        Self { arm_pc, upper }
    }

    pub fn from_location(loc: LocationDescriptor) -> Self {
        Self {
            arm_pc: loc.value() as u32,
            upper: (loc.value() >> 32) as u32,
        }
    }

    pub fn pc(self) -> u32 {
        self.arm_pc
    }

    /// The packed upper word, as mirrored in the guest state block.
    pub fn upper_location_descriptor(self) -> u32 {
        self.upper
    }

    pub fn t_flag(self) -> bool {
        self.upper & UPPER_T_BIT != 0
    }

    pub fn e_flag(self) -> bool {
        self.upper & UPPER_E_BIT != 0
    }

    pub fn single_stepping(self) -> bool {
        self.upper & UPPER_SINGLE_STEP_BIT != 0
    }

    pub fn it(self) -> ItState {
        ItState::new(((self.upper & UPPER_IT_MASK) >> UPPER_IT_SHIFT) as u8)
    }

    pub fn fpscr_mode(self) -> u32 {
        self.upper & FPSCR_MODE_MASK
    }

    /// Width of one instruction step in the current execution state.
    pub fn instruction_size(self) -> u32 {
        if self.t_flag() {
            2
        } else {
            4
        }
    }

    pub fn set_pc(self, pc: u32) -> Self {
        Self { arm_pc: pc, ..self }
    }

    pub fn advance_pc(self, amount: i32) -> Self {
        Self {
            arm_pc: self.arm_pc.wrapping_add(amount as u32),
            ..self
        }
    }

    pub fn set_t_flag(self, t: bool) -> Self {
        let upper = (self.upper & !UPPER_T_BIT) | if t { UPPER_T_BIT } else { 0 };
        Self { upper, ..self }
    }

    pub fn set_it(self, it: ItState) -> Self {
        let upper = (self.upper & !UPPER_IT_MASK) | ((it.value() as u32) << UPPER_IT_SHIFT);
        Self { upper, ..self }
    }

    pub fn advance_it(self) -> Self {
        self.set_it(self.it().advance())
    }

    pub fn set_single_stepping(self, ss: bool) -> Self {
        let upper =
            (self.upper & !UPPER_SINGLE_STEP_BIT) | if ss { UPPER_SINGLE_STEP_BIT } else { 0 };
        Self { upper, ..self }
    }

    /// Fold into the cache key.
    pub fn unique_hash(self) -> u64 {
        (self.arm_pc as u64) | ((self.upper as u64) << 32)
    }

    pub fn to_location(self) -> LocationDescriptor {
        LocationDescriptor(self.unique_hash())
    }
}

impl From<A32LocationDescriptor> for LocationDescriptor {
    fn from(a32: A32LocationDescriptor) -> Self {
        a32.to_location()
    }
}

impl From<LocationDescriptor> for A32LocationDescriptor {
    fn from(loc: LocationDescriptor) -> Self {
        A32LocationDescriptor::from_location(loc)
    }
}

impl fmt::Display for A32LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(pc:{:#x} upper:{:#x} T:{} ss:{})",
            self.arm_pc,
            self.upper,
            self.t_flag() as u8,
            self.single_stepping() as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_basic() {
        let loc = A32LocationDescriptor::at(0x0800_1000);
        assert_eq!(loc.pc(), 0x0800_1000);
        assert!(!loc.t_flag());
        assert!(!loc.single_stepping());
        assert_eq!(loc.unique_hash(), 0x0800_1000);
    }

    #[test]
    fn test_location_hash_differs_by_state() {
        let loc1 = A32LocationDescriptor::at(0x1000);
        let loc2 = loc1.set_t_flag(true);
        assert_ne!(loc1.unique_hash(), loc2.unique_hash());
        assert_eq!(loc1.pc(), loc2.pc());
    }

    #[test]
    fn test_location_round_trip() {
        let mut cpsr = Psr::default();
        cpsr.set_t(true);
        cpsr.set_it(0x1C);
        let loc = A32LocationDescriptor::new(0x2000, cpsr, Fpscr::new(3 << 22), false);
        let folded = loc.to_location();
        let back = A32LocationDescriptor::from_location(folded);
        assert_eq!(back, loc);
        assert!(back.t_flag());
        assert!(back.it().is_in_it_block());
        assert_eq!(back.fpscr_mode(), 3 << 22);
    }

    #[test]
    fn test_advance_pc_by_state() {
        let arm = A32LocationDescriptor::at(0x1000);
        assert_eq!(arm.instruction_size(), 4);
        let thumb = arm.set_t_flag(true);
        assert_eq!(thumb.instruction_size(), 2);
        assert_eq!(thumb.advance_pc(2).pc(), 0x1002);
    }
}
