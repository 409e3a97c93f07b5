use std::io;

use object::{Handle, RawHandle, Tag, tag_debug_name};
use thiserror::Error;

/// Failure to turn a byte stream into a [`Heap`](crate::Heap).
///
/// No partially loaded heap is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Bad magic, truncated header or nonsensical header sizes.
    #[error("format error: {0}")]
    Format(String),

    /// The header parsed but the body does not match it.
    #[error("corrupt heap: {0}")]
    Corrupt(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to interpret a loaded cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("handle {0} does not name a cell")]
    InvalidHandle(RawHandle),

    #[error("type mismatch at {handle}: expected {expected}, found {}", tag_debug_name(*found))]
    TypeMismatch {
        handle: Handle,
        expected: Tag,
        found: i16,
    },

    #[error("cell {handle} has unknown tag {tag}")]
    UnknownTag { handle: Handle, tag: i16 },

    #[error("corrupt cell {handle}: {reason}")]
    Corrupt { handle: Handle, reason: &'static str },
}
