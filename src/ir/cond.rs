use std::fmt;

/// A32 condition codes (the `cond` field of a conditional instruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    EQ = 0,
    NE = 1,
    CS = 2,
    CC = 3,
    MI = 4,
    PL = 5,
    VS = 6,
    VC = 7,
    HI = 8,
    LS = 9,
    GE = 10,
    LT = 11,
    GT = 12,
    LE = 13,
    AL = 14,
    /// The 0b1111 encoding; in A32 this selects the unconditional space.
    NV = 15,
}

impl Cond {
    pub fn from_u8(value: u8) -> Self {
        match value & 0xF {
            0 => Cond::EQ,
            1 => Cond::NE,
            2 => Cond::CS,
            3 => Cond::CC,
            4 => Cond::MI,
            5 => Cond::PL,
            6 => Cond::VS,
            7 => Cond::VC,
            8 => Cond::HI,
            9 => Cond::LS,
            10 => Cond::GE,
            11 => Cond::LT,
            12 => Cond::GT,
            13 => Cond::LE,
            14 => Cond::AL,
            _ => Cond::NV,
        }
    }

    /// Evaluate this condition against packed NZCV bits (31:28).
    pub fn passed(self, nzcv: u32) -> bool {
        let n = nzcv & 0x8000_0000 != 0;
        let z = nzcv & 0x4000_0000 != 0;
        let c = nzcv & 0x2000_0000 != 0;
        let v = nzcv & 0x1000_0000 != 0;
        match self {
            Cond::EQ => z,
            Cond::NE => !z,
            Cond::CS => c,
            Cond::CC => !c,
            Cond::MI => n,
            Cond::PL => !n,
            Cond::VS => v,
            Cond::VC => !v,
            Cond::HI => c && !z,
            Cond::LS => !c || z,
            Cond::GE => n == v,
            Cond::LT => n != v,
            Cond::GT => !z && n == v,
            Cond::LE => z || n != v,
            Cond::AL | Cond::NV => true,
        }
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cond::EQ => "eq",
            Cond::NE => "ne",
            Cond::CS => "cs",
            Cond::CC => "cc",
            Cond::MI => "mi",
            Cond::PL => "pl",
            Cond::VS => "vs",
            Cond::VC => "vc",
            Cond::HI => "hi",
            Cond::LS => "ls",
            Cond::GE => "ge",
            Cond::LT => "lt",
            Cond::GT => "gt",
            Cond::LE => "le",
            Cond::AL => "al",
            Cond::NV => "nv",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: u32 = 0x8000_0000;
    const Z: u32 = 0x4000_0000;
    const C: u32 = 0x2000_0000;
    const V: u32 = 0x1000_0000;

    #[test]
    fn test_cond_round_trip() {
        for i in 0..16u8 {
            assert_eq!(Cond::from_u8(i) as u8, i);
        }
    }

    #[test]
    fn test_cond_evaluation() {
        assert!(Cond::EQ.passed(Z));
        assert!(!Cond::EQ.passed(0));
        assert!(Cond::HI.passed(C));
        assert!(!Cond::HI.passed(C | Z));
        assert!(Cond::GE.passed(N | V));
        assert!(Cond::GE.passed(0));
        assert!(!Cond::GE.passed(N));
        assert!(Cond::GT.passed(0));
        assert!(!Cond::GT.passed(Z));
        assert!(Cond::LE.passed(N));
        assert!(Cond::AL.passed(0));
    }
}
