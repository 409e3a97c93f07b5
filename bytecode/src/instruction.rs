use std::fmt;

use crate::op::{Op, opcode_name};

/// One decoded instruction.
///
/// The opcode is kept as its raw byte so unassigned values can still be
/// reported by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the opcode.
    pub offset: usize,
    pub opcode: u8,
    pub arg: Option<u16>,
}

impl Instruction {
    #[inline(always)]
    pub fn op(&self) -> Result<Op, u8> {
        Op::try_from(self.opcode)
    }

    /// Encoded size in bytes: 1, or 3 with an operand.
    #[inline(always)]
    pub fn size(&self) -> usize {
        if self.arg.is_some() { 3 } else { 1 }
    }

    /// Offset of the instruction that follows this one.
    #[inline(always)]
    pub fn next_offset(&self) -> usize {
        self.offset + self.size()
    }

    /// Operand, or 0 for argument-less opcodes.
    #[inline(always)]
    pub fn arg(&self) -> u16 {
        self.arg.unwrap_or(0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = opcode_name(self.opcode);
        match self.arg {
            Some(arg) => write!(f, "{:>5} {name:<20} {arg:>5}", self.offset),
            None => write!(f, "{:>5} {name}", self.offset),
        }
    }
}
