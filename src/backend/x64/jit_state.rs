use core::mem::offset_of;

use crate::frontend::a32::fpscr::{FPSCR_CUMULATIVE_MASK, FPSCR_MODE_MASK, FPSCR_QC};
use crate::frontend::a32::psr::{Psr, CPSR_JAIFM_MASK};

/// Return stack buffer size; must be a power of two.
pub const RSB_SIZE: usize = 8;
pub const RSB_PTR_MASK: u32 = RSB_SIZE as u32 - 1;

/// Spill slots the register allocator may claim in the scratch area.
pub const SPILL_SLOT_COUNT: usize = 64;

/// The A32 guest state block.
///
/// Flat and pointer-stable for the life of a JIT instance; R15 points
/// here while emitted code runs, and every field is addressed by the
/// compile-time constant offsets below. CPSR and FPSCR are kept as split
/// fields the way emitted code wants to touch them; the architectural
/// registers are reassembled on demand.
#[repr(C, align(16))]
pub struct A32JitState {
    /// General-purpose registers r0-r15.
    pub regs: [u32; 16],
    /// The high word of the current location descriptor: FPSCR mode bits,
    /// T/E bits and IT state.
    pub upper_location_descriptor: u32,
    /// NZCV in architectural positions (bits 31:28).
    pub cpsr_nzcv: u32,
    /// Q sticky flag in architectural position (bit 27).
    pub cpsr_q: u32,
    /// GE flags as a 4-bit value.
    pub cpsr_ge: u32,
    /// The remaining CPSR bits (J, A, I, F, mode).
    pub cpsr_jaifm: u32,

    /// VFP S registers (D registers alias aligned pairs).
    pub ext_regs: [u32; 64],
    /// FPSCR condition flags (bits 31:28).
    pub fpscr_nzcv: u32,
    /// FPSCR cumulative exception bits plus QC.
    pub fpscr_exc: u32,

    /// Transient bit tested by the CheckBit terminal.
    pub check_bit: u32,
    /// Halt reason bits; non-zero requests a prompt dispatcher exit.
    pub halt_reason: u32,

    /// Tick budget for the current `run()` slice.
    pub cycles_to_run: i64,
    /// Ticks left in the slice; blocks subtract their cost on entry.
    pub cycles_remaining: i64,

    /// Return stack buffer for return-target prediction.
    pub rsb_ptr: u32,
    _rsb_pad: u32,
    pub rsb_location_descriptors: [u64; RSB_SIZE],
    pub rsb_codeptrs: [u64; RSB_SIZE],

    /// Register-allocator spill area used by emitted code.
    pub spill: [u64; SPILL_SLOT_COUNT],
}

impl A32JitState {
    pub fn new() -> Self {
        let mut state = Self {
            regs: [0; 16],
            upper_location_descriptor: 0,
            cpsr_nzcv: 0,
            cpsr_q: 0,
            cpsr_ge: 0,
            cpsr_jaifm: 0,
            ext_regs: [0; 64],
            fpscr_nzcv: 0,
            fpscr_exc: 0,
            check_bit: 0,
            halt_reason: 0,
            cycles_to_run: 0,
            cycles_remaining: 0,
            rsb_ptr: 0,
            _rsb_pad: 0,
            rsb_location_descriptors: [0; RSB_SIZE],
            rsb_codeptrs: [0; RSB_SIZE],
            spill: [0; SPILL_SLOT_COUNT],
        };
        state.reset_rsb();
        state
    }

    /// Reset guest-visible state, preserving the RSB invalidation rule.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Invalidate every RSB entry.
    pub fn reset_rsb(&mut self) {
        self.rsb_ptr = 0;
        self.rsb_location_descriptors.fill(u64::MAX);
        self.rsb_codeptrs.fill(0);
    }

    /// Assemble the architectural CPSR from the split fields.
    pub fn cpsr(&self) -> u32 {
        let mut psr = Psr::new(
            self.cpsr_nzcv
                | self.cpsr_q
                | ((self.cpsr_ge & 0xF) << 16)
                | (self.cpsr_jaifm & CPSR_JAIFM_MASK),
        );
        let upper = self.upper_location_descriptor;
        psr.set_t(upper & 1 != 0);
        psr.set_e(upper & 2 != 0);
        psr.set_it(((upper >> 8) & 0xFF) as u8);
        psr.value()
    }

    /// Split an architectural CPSR into the runtime fields.
    pub fn set_cpsr(&mut self, value: u32) {
        let psr = Psr::new(value);
        self.cpsr_nzcv = psr.nzcv();
        self.cpsr_q = value & (1 << 27);
        self.cpsr_ge = psr.ge();
        self.cpsr_jaifm = value & CPSR_JAIFM_MASK;

        let mut upper = self.upper_location_descriptor & FPSCR_MODE_MASK;
        if psr.t() {
            upper |= 1;
        }
        if psr.e() {
            upper |= 2;
        }
        upper |= (psr.it() as u32) << 8;
        self.upper_location_descriptor = upper;
    }

    /// Assemble the architectural FPSCR.
    pub fn fpscr(&self) -> u32 {
        (self.upper_location_descriptor & FPSCR_MODE_MASK)
            | self.fpscr_nzcv
            | (self.fpscr_exc & (FPSCR_CUMULATIVE_MASK | FPSCR_QC))
    }

    pub fn set_fpscr(&mut self, value: u32) {
        self.upper_location_descriptor = (self.upper_location_descriptor & !FPSCR_MODE_MASK)
            | (value & FPSCR_MODE_MASK);
        self.fpscr_nzcv = value & 0xF000_0000;
        self.fpscr_exc = value & (FPSCR_CUMULATIVE_MASK | FPSCR_QC);
    }

    /// The folded location descriptor of the current guest state.
    pub fn location_descriptor(&self) -> u64 {
        (self.regs[15] as u64) | ((self.upper_location_descriptor as u64) << 32)
    }

    // --- Field offsets for emitted code (addressed off R15) ---

    pub const fn offset_of_reg(index: usize) -> usize {
        offset_of!(A32JitState, regs) + index * 4
    }

    pub const fn offset_of_upper_location_descriptor() -> usize {
        offset_of!(A32JitState, upper_location_descriptor)
    }

    pub const fn offset_of_cpsr_nzcv() -> usize {
        offset_of!(A32JitState, cpsr_nzcv)
    }

    pub const fn offset_of_cpsr_q() -> usize {
        offset_of!(A32JitState, cpsr_q)
    }

    pub const fn offset_of_cpsr_ge() -> usize {
        offset_of!(A32JitState, cpsr_ge)
    }

    pub const fn offset_of_ext_reg(index: usize) -> usize {
        offset_of!(A32JitState, ext_regs) + index * 4
    }

    pub const fn offset_of_fpscr_nzcv() -> usize {
        offset_of!(A32JitState, fpscr_nzcv)
    }

    pub const fn offset_of_check_bit() -> usize {
        offset_of!(A32JitState, check_bit)
    }

    pub const fn offset_of_halt_reason() -> usize {
        offset_of!(A32JitState, halt_reason)
    }

    pub const fn offset_of_cycles_to_run() -> usize {
        offset_of!(A32JitState, cycles_to_run)
    }

    pub const fn offset_of_cycles_remaining() -> usize {
        offset_of!(A32JitState, cycles_remaining)
    }

    pub const fn offset_of_rsb_ptr() -> usize {
        offset_of!(A32JitState, rsb_ptr)
    }

    pub const fn offset_of_rsb_location_descriptors() -> usize {
        offset_of!(A32JitState, rsb_location_descriptors)
    }

    pub const fn offset_of_rsb_codeptrs() -> usize {
        offset_of!(A32JitState, rsb_codeptrs)
    }

    pub const fn offset_of_spill_slot(slot: usize) -> usize {
        offset_of!(A32JitState, spill) + slot * 8
    }
}

impl Default for A32JitState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_mode_cpsr_round_trip() {
        let mut state = A32JitState::new();
        state.set_cpsr(0x0000_01D0);
        assert_eq!(state.cpsr(), 0x0000_01D0);

        state.set_cpsr(0x2000_01D0);
        assert_eq!(state.cpsr_nzcv, 0x2000_0000);
        assert_eq!(state.cpsr(), 0x2000_01D0);

        state.set_cpsr(0x080F_01D0);
        assert_eq!(state.cpsr_q, 0x0800_0000);
        assert_eq!(state.cpsr_ge, 0xF);
        assert_eq!(state.cpsr(), 0x080F_01D0);
    }

    #[test]
    fn test_thumb_bit_lands_in_upper_descriptor() {
        let mut state = A32JitState::new();
        state.set_cpsr(0x0000_01F0);
        assert_eq!(state.upper_location_descriptor & 1, 1);
        assert_eq!(state.cpsr() & (1 << 5), 1 << 5);
    }

    #[test]
    fn test_fpscr_round_trip() {
        let mut state = A32JitState::new();
        let value = 0x0300_009F;
        state.set_fpscr(value);
        assert_eq!(state.fpscr(), value);
        // FPSCR mode bits share the upper descriptor word.
        assert_ne!(state.upper_location_descriptor & FPSCR_MODE_MASK, 0);
    }

    #[test]
    fn test_location_descriptor_tracks_pc_and_upper() {
        let mut state = A32JitState::new();
        state.regs[15] = 0x1234;
        assert_eq!(state.location_descriptor(), 0x1234);
        state.set_cpsr(0x0000_0030); // Thumb
        assert_eq!(state.location_descriptor(), 0x1_0000_1234);
    }

    #[test]
    fn test_rsb_reset() {
        let mut state = A32JitState::new();
        state.rsb_codeptrs[3] = 0xDEAD;
        state.rsb_location_descriptors[3] = 0x1000;
        state.reset_rsb();
        assert!(state.rsb_codeptrs.iter().all(|&p| p == 0));
        assert!(state.rsb_location_descriptors.iter().all(|&d| d == u64::MAX));
    }

    #[test]
    fn test_offsets_are_distinct_and_aligned() {
        assert_eq!(A32JitState::offset_of_reg(1) - A32JitState::offset_of_reg(0), 4);
        assert_eq!(A32JitState::offset_of_spill_slot(1) % 8, 0);
        assert_eq!(A32JitState::offset_of_rsb_location_descriptors() % 8, 0);
    }
}
