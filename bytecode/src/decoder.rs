use thiserror::Error;

use crate::instruction::Instruction;
use crate::op::{HAVE_ARGUMENT, opcode_name};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{} at offset {offset} is missing its operand", opcode_name(*opcode))]
    TruncatedOperand { offset: usize, opcode: u8 },

    #[error("offset {0} is past the end of the bytecode")]
    OutOfBounds(usize),
}

/// Decode the instruction starting at `offset`.
///
/// Opcodes at or above [`HAVE_ARGUMENT`] take the next two bytes as a
/// little-endian operand. There is no extended-argument prefix.
#[inline]
pub fn decode_at(bytes: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
    let opcode = *bytes.get(offset).ok_or(DecodeError::OutOfBounds(offset))?;
    let arg = if opcode >= HAVE_ARGUMENT {
        let lo = bytes.get(offset + 1);
        let hi = bytes.get(offset + 2);
        match (lo, hi) {
            (Some(&lo), Some(&hi)) => Some(u16::from_le_bytes([lo, hi])),
            _ => return Err(DecodeError::TruncatedOperand { offset, opcode }),
        }
    } else {
        None
    };
    Ok(Instruction { offset, opcode, arg })
}

/// Sequential decoder over a bytecode string.
///
/// Unlike the interpreter, which validates each opcode as it dispatches, the
/// decoder only splits the stream; unassigned opcodes decode fine.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.is_at_end() {
            return None;
        }
        match decode_at(self.bytes, self.pos) {
            Ok(instr) => {
                self.pos = instr.next_offset();
                Some(Ok(instr))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
