use std::fmt;

use bytecode::DecodeError;
use heap::HeapError;
use thiserror::Error;

use crate::interpreter::Why;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Value,
    Block,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::Value => f.write_str("value"),
            StackKind::Block => f.write_str("block"),
        }
    }
}

/// Ways a call can disagree with its callee.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Arity {
    #[error("keyword arguments are not supported ({0} given)")]
    KeywordArgs(u8),

    #[error("{name}() takes {expected} positional arguments but {given} were given")]
    Args {
        name: String,
        expected: i64,
        given: usize,
    },

    #[error("callee produced {0} return values, expected exactly one")]
    Returns(usize),
}

/// What went wrong while interpreting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error("malformed bytecode: {0}")]
    MalformedBytecode(#[from] DecodeError),

    #[error("{0} stack underflow")]
    StackUnderflow(StackKind),

    #[error("unsupported opcode {name} ({opcode})")]
    UnsupportedOpcode { opcode: u8, name: String },

    #[error("arity mismatch: {0}")]
    ArityMismatch(#[from] Arity),

    #[error("name '{0}' is not defined")]
    UnboundName(String),

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("native {name} failed: {reason}")]
    NativeFailure { name: &'static str, reason: String },

    #[error("maximum call depth of {0} frames exceeded")]
    RecursionLimit(usize),

    #[error("{0:?} signal escaped its frame")]
    UnhandledSignal(Why),
}

/// An [`ErrorKind`] located at an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (in {code} at offset {offset})")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    /// Name of the code object that was executing.
    pub code: String,
    /// Offset of the failing instruction.
    pub offset: usize,
}
