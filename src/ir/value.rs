use std::fmt;

use crate::frontend::a32::types::{ExtReg, Reg};
use crate::ir::cond::Cond;
use crate::ir::types::Type;

/// Index into a block's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstRef(pub u32);

impl InstRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An IR value: either an immediate or a reference to an instruction's
/// result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Void,
    Inst(InstRef),
    ImmU1(bool),
    ImmU8(u8),
    ImmU16(u16),
    ImmU32(u32),
    ImmU64(u64),
    ImmReg(Reg),
    ImmExtReg(ExtReg),
    ImmCond(Cond),
}

impl Value {
    /// Get the IR type of this value. Instruction references resolve to
    /// `Opaque`; callers that need the concrete type go through the block.
    pub fn get_type(&self) -> Type {
        match self {
            Value::Void => Type::Void,
            Value::Inst(_) => Type::Opaque,
            Value::ImmU1(_) => Type::U1,
            Value::ImmU8(_) => Type::U8,
            Value::ImmU16(_) => Type::U16,
            Value::ImmU32(_) => Type::U32,
            Value::ImmU64(_) => Type::U64,
            Value::ImmReg(_) => Type::Reg,
            Value::ImmExtReg(_) => Type::ExtReg,
            Value::ImmCond(_) => Type::Cond,
        }
    }

    pub fn is_immediate(&self) -> bool {
        !matches!(self, Value::Inst(_) | Value::Void)
    }

    pub fn is_inst(&self) -> bool {
        matches!(self, Value::Inst(_))
    }

    pub fn inst_ref(&self) -> InstRef {
        match self {
            Value::Inst(r) => *r,
            _ => panic!("Value::inst_ref called on non-Inst value: {self:?}"),
        }
    }

    pub fn get_u1(&self) -> bool {
        match self {
            Value::ImmU1(v) => *v,
            _ => panic!("Value::get_u1 called on {self:?}"),
        }
    }

    pub fn get_u8(&self) -> u8 {
        match self {
            Value::ImmU8(v) => *v,
            _ => panic!("Value::get_u8 called on {self:?}"),
        }
    }

    pub fn get_u32(&self) -> u32 {
        match self {
            Value::ImmU32(v) => *v,
            _ => panic!("Value::get_u32 called on {self:?}"),
        }
    }

    pub fn get_u64(&self) -> u64 {
        match self {
            Value::ImmU64(v) => *v,
            _ => panic!("Value::get_u64 called on {self:?}"),
        }
    }

    pub fn get_reg(&self) -> Reg {
        match self {
            Value::ImmReg(r) => *r,
            _ => panic!("Value::get_reg called on {self:?}"),
        }
    }

    pub fn get_ext_reg(&self) -> ExtReg {
        match self {
            Value::ImmExtReg(r) => *r,
            _ => panic!("Value::get_ext_reg called on {self:?}"),
        }
    }

    pub fn get_cond(&self) -> Cond {
        match self {
            Value::ImmCond(c) => *c,
            _ => panic!("Value::get_cond called on {self:?}"),
        }
    }

    /// Get any integer immediate zero-extended to u64.
    pub fn get_imm_as_u64(&self) -> u64 {
        match self {
            Value::ImmU1(v) => *v as u64,
            Value::ImmU8(v) => *v as u64,
            Value::ImmU16(v) => *v as u64,
            Value::ImmU32(v) => *v as u64,
            Value::ImmU64(v) => *v,
            _ => panic!("Value::get_imm_as_u64 called on {self:?}"),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::ImmU1(v) => !v,
            Value::ImmU8(v) => *v == 0,
            Value::ImmU16(v) => *v == 0,
            Value::ImmU32(v) => *v == 0,
            Value::ImmU64(v) => *v == 0,
            _ => false,
        }
    }

    pub fn has_all_bits_set(&self) -> bool {
        match self {
            Value::ImmU1(v) => *v,
            Value::ImmU8(v) => *v == u8::MAX,
            Value::ImmU16(v) => *v == u16::MAX,
            Value::ImmU32(v) => *v == u32::MAX,
            Value::ImmU64(v) => *v == u64::MAX,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Inst(r) => write!(f, "{r}"),
            Value::ImmU1(v) => write!(f, "#{}", *v as u8),
            Value::ImmU8(v) => write!(f, "#{v:#x}"),
            Value::ImmU16(v) => write!(f, "#{v:#x}"),
            Value::ImmU32(v) => write!(f, "#{v:#x}"),
            Value::ImmU64(v) => write!(f, "#{v:#x}"),
            Value::ImmReg(r) => write!(f, "{r}"),
            Value::ImmExtReg(r) => write!(f, "{r}"),
            Value::ImmCond(c) => write!(f, "{c}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::ImmU1(v)
    }
}
impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::ImmU8(v)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::ImmU16(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::ImmU32(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::ImmU64(v)
    }
}
impl From<Reg> for Value {
    fn from(r: Reg) -> Self {
        Value::ImmReg(r)
    }
}
impl From<ExtReg> for Value {
    fn from(r: ExtReg) -> Self {
        Value::ImmExtReg(r)
    }
}
impl From<Cond> for Value {
    fn from(c: Cond) -> Self {
        Value::ImmCond(c)
    }
}
impl From<InstRef> for Value {
    fn from(r: InstRef) -> Self {
        Value::Inst(r)
    }
}
