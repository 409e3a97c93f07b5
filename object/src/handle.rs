use std::fmt;

/// Handle as it appears on the wire: a signed 32-bit cell index.
///
/// Negative values never name a cell. The loader and the views only ever
/// hand out [`Handle`]s, which are known to be non-negative.
pub type RawHandle = i32;

/// Index of a cell in the heap's cell table.
///
/// A `Handle` is only a position; whether it is in range for a particular
/// heap is checked when it is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    #[inline(always)]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Interpret a wire handle. Returns `None` for negative values.
    #[inline]
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Wire representation of this handle.
    ///
    /// Heaps never hold more than `i32::MAX` cells, so the cast is lossless
    /// for every handle a heap hands out.
    #[inline(always)]
    pub const fn raw(self) -> RawHandle {
        self.0 as RawHandle
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
