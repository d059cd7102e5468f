use std::fmt;

/// A32 general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    /// Stack pointer.
    R13,
    /// Link register.
    R14,
    /// Program counter.
    R15,
}

impl Reg {
    pub fn from_u32(value: u32) -> Self {
        match value & 0xF {
            0 => Reg::R0,
            1 => Reg::R1,
            2 => Reg::R2,
            3 => Reg::R3,
            4 => Reg::R4,
            5 => Reg::R5,
            6 => Reg::R6,
            7 => Reg::R7,
            8 => Reg::R8,
            9 => Reg::R9,
            10 => Reg::R10,
            11 => Reg::R11,
            12 => Reg::R12,
            13 => Reg::R13,
            14 => Reg::R14,
            _ => Reg::R15,
        }
    }

    pub fn number(self) -> usize {
        self as usize
    }

    pub const SP: Reg = Reg::R13;
    pub const LR: Reg = Reg::R14;
    pub const PC: Reg = Reg::R15;
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::R13 => f.write_str("sp"),
            Reg::R14 => f.write_str("lr"),
            Reg::R15 => f.write_str("pc"),
            r => write!(f, "r{}", r.number()),
        }
    }
}

/// A32 extended (VFP) register: a single-precision S register or a
/// double-precision D register aliasing a pair of S slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtReg {
    S(u8),
    D(u8),
}

impl ExtReg {
    /// Index of the first 32-bit backing slot in the guest state block.
    pub fn backing_index(self) -> usize {
        match self {
            ExtReg::S(n) => n as usize,
            ExtReg::D(n) => (n as usize) * 2,
        }
    }

    /// Number of 32-bit backing slots occupied.
    pub fn backing_width(self) -> usize {
        match self {
            ExtReg::S(_) => 1,
            ExtReg::D(_) => 2,
        }
    }

    pub fn is_single(self) -> bool {
        matches!(self, ExtReg::S(_))
    }

    /// The register `offset` places after `self`, in the same precision.
    pub fn offset(self, offset: usize) -> ExtReg {
        match self {
            ExtReg::S(n) => ExtReg::S(n + offset as u8),
            ExtReg::D(n) => ExtReg::D(n + offset as u8),
        }
    }
}

impl fmt::Display for ExtReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtReg::S(n) => write!(f, "s{n}"),
            ExtReg::D(n) => write!(f, "d{n}"),
        }
    }
}

/// A32 shift types for data-processing operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftType {
    LSL = 0,
    LSR = 1,
    ASR = 2,
    ROR = 3,
}

impl ShiftType {
    pub fn from_u8(value: u8) -> Self {
        match value & 3 {
            0 => ShiftType::LSL,
            1 => ShiftType::LSR,
            2 => ShiftType::ASR,
            _ => ShiftType::ROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_round_trip() {
        for i in 0..16 {
            assert_eq!(Reg::from_u32(i).number(), i as usize);
        }
    }

    #[test]
    fn test_reg_display() {
        assert_eq!(Reg::R0.to_string(), "r0");
        assert_eq!(Reg::R13.to_string(), "sp");
        assert_eq!(Reg::R15.to_string(), "pc");
    }

    #[test]
    fn test_ext_reg_backing() {
        assert_eq!(ExtReg::S(5).backing_index(), 5);
        assert_eq!(ExtReg::D(5).backing_index(), 10);
        assert_eq!(ExtReg::D(5).backing_width(), 2);
        assert_eq!(ExtReg::S(2).offset(3), ExtReg::S(5));
    }
}
