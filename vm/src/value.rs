use std::fmt;

use heap::{Heap, HeapError};
use object::{Handle, RawHandle};

/// Key into the [`NativeRegistry`](crate::NativeRegistry).
///
/// Kept apart from [`Handle`] so a native function can never be mistaken
/// for a heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(u16);

impl NativeId {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// `None` once `index` no longer fits the id space.
    pub fn from_index(index: usize) -> Option<Self> {
        u16::try_from(index).ok().map(Self)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The negative handle heap images use for this native: `-1` for the
    /// first registered function, `-2` for the second, and so on.
    pub const fn sentinel(self) -> RawHandle {
        -(self.0 as RawHandle) - 1
    }

    pub fn from_sentinel(raw: RawHandle) -> Option<Self> {
        if raw >= 0 {
            return None;
        }
        u16::try_from(-(raw + 1)).ok().map(Self)
    }
}

/// What the value stack holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// A heap cell.
    Cell(Handle),
    /// A built-in function.
    Native(NativeId),
    /// The result of a native call with nothing to return.
    None,
    /// Pushed when a handler block catches an exception; the error itself is
    /// kept on the VM.
    Exception,
}

impl Value {
    /// Interpret a wire handle: negative values name natives, the rest cells.
    pub fn from_raw(heap: &Heap, raw: RawHandle) -> Result<Value, HeapError> {
        if raw < 0 {
            return NativeId::from_sentinel(raw)
                .map(Value::Native)
                .ok_or(HeapError::InvalidHandle(raw));
        }
        Ok(Value::Cell(heap.handle(raw)?))
    }

    pub fn as_cell(self) -> Option<Handle> {
        match self {
            Value::Cell(handle) => Some(handle),
            _ => None,
        }
    }

    /// Render for diagnostics, looking cells up in `heap`.
    pub fn describe(self, heap: &Heap) -> String {
        match self {
            Value::Cell(handle) => heap.debug_string(handle),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Cell(handle) => write!(f, "{handle}"),
            Value::Native(id) => write!(f, "(native {})", id.sentinel()),
            Value::None => write!(f, "None"),
            Value::Exception => write!(f, "(exception)"),
        }
    }
}
