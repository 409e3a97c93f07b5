//! The 16-byte cell record.
//!
//! On disk a cell is a C-style struct with two overlapping unions:
//!
//! ```text
//! offset  0   tag        i16
//!         2   is_slab    u8
//!         3   small_len  u8
//!         4   small_val  [u8; 12]  | big_len i32 (bytes 4..8)
//!         8                        | i64 / f64 payload (bytes 8..16)
//!        12                        | slab offset i32 (bytes 12..16)
//! ```
//!
//! [`WireCell`] is that record byte-for-byte. [`Cell`] is what the heap keeps
//! after loading: the `is_slab` flag is folded into [`Storage`] so the inline
//! bytes and the slab reference can never be read through the wrong
//! interpretation.

use crate::Tag;

/// Size of one cell record in bytes.
pub const CELL_SIZE: usize = 16;

/// Bytes available for inline payload (`small_val`).
pub const INLINE_CAPACITY: usize = 12;

/// Inline payload offset of the 8-byte numeric slot.
const NUMERIC_AT: usize = 4;

/// Inline payload offset of the serialized slab offset.
const SLAB_OFFSET_AT: usize = 8;

/// A cell exactly as serialized in a heap image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireCell {
    pub tag: i16,
    pub is_slab: bool,
    pub small_len: u8,
    /// Bytes 4..16 of the record.
    pub payload: [u8; INLINE_CAPACITY],
}

impl WireCell {
    pub fn from_bytes(bytes: &[u8; CELL_SIZE]) -> Self {
        let mut payload = [0u8; INLINE_CAPACITY];
        payload.copy_from_slice(&bytes[4..]);
        Self {
            tag: i16::from_le_bytes([bytes[0], bytes[1]]),
            is_slab: bytes[2] != 0,
            small_len: bytes[3],
            payload,
        }
    }

    pub fn to_bytes(&self) -> [u8; CELL_SIZE] {
        let mut out = [0u8; CELL_SIZE];
        out[0..2].copy_from_slice(&self.tag.to_le_bytes());
        out[2] = self.is_slab as u8;
        out[3] = self.small_len;
        out[4..].copy_from_slice(&self.payload);
        out
    }

    /// The serialized slab offset. Only meaningful when `is_slab` is set.
    pub fn slab_offset(&self) -> i32 {
        read_i32(&self.payload, SLAB_OFFSET_AT)
    }

    /// The `big_len` field. Writers fill it in; readers trust the slab's own
    /// length prefix instead.
    pub fn big_len(&self) -> i32 {
        read_i32(&self.payload, 0)
    }
}

/// Byte offset of a slab inside the slab region.
///
/// This replaces the raw pointer the original format patches in: it is an
/// index into the heap's slab buffer and is only created by the loader after
/// bounds checking, or by an image writer laying slabs out itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlabRef(u32);

impl SlabRef {
    #[inline(always)]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[inline(always)]
    pub const fn offset(self) -> usize {
        self.0 as usize
    }
}

/// Where a cell keeps its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Inline {
        len: u8,
        bytes: [u8; INLINE_CAPACITY],
    },
    Slab(SlabRef),
}

/// A loaded cell: a raw tag plus resolved storage.
///
/// The tag stays raw because the loader does not validate cell contents;
/// typed access checks it lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub tag: i16,
    pub storage: Storage,
}

impl Cell {
    pub fn none() -> Self {
        Self::scalar(Tag::None, [0; 8])
    }

    pub fn bool(value: bool) -> Self {
        Self::scalar(Tag::Bool, (value as i64).to_le_bytes())
    }

    pub fn int(value: i64) -> Self {
        Self::scalar(Tag::Int, value.to_le_bytes())
    }

    pub fn float(value: f64) -> Self {
        Self::scalar(Tag::Float, value.to_le_bytes())
    }

    /// An inline cell holding `data` in `small_val`.
    ///
    /// Returns `None` if `data` does not fit.
    pub fn inline(tag: Tag, len: u8, data: &[u8]) -> Option<Self> {
        if data.len() > INLINE_CAPACITY {
            return None;
        }
        let mut bytes = [0u8; INLINE_CAPACITY];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            tag: tag.raw(),
            storage: Storage::Inline { len, bytes },
        })
    }

    pub fn slab(tag: Tag, slab: SlabRef) -> Self {
        Self {
            tag: tag.raw(),
            storage: Storage::Slab(slab),
        }
    }

    fn scalar(tag: Tag, numeric: [u8; 8]) -> Self {
        let mut bytes = [0u8; INLINE_CAPACITY];
        bytes[NUMERIC_AT..].copy_from_slice(&numeric);
        Self {
            tag: tag.raw(),
            storage: Storage::Inline { len: 0, bytes },
        }
    }

    #[inline]
    pub fn tag(&self) -> Result<Tag, i16> {
        Tag::try_from(self.tag)
    }

    #[inline]
    pub fn is_slab(&self) -> bool {
        matches!(self.storage, Storage::Slab(_))
    }

    /// The 8-byte numeric slot, if the cell is inline.
    pub fn numeric_bits(&self) -> Option<[u8; 8]> {
        match &self.storage {
            Storage::Inline { bytes, .. } => {
                let mut out = [0u8; 8];
                out.copy_from_slice(&bytes[NUMERIC_AT..]);
                Some(out)
            }
            Storage::Slab(_) => None,
        }
    }

    /// Decode a wire record whose slab offset (if any) was already checked.
    pub fn from_wire(wire: &WireCell, slab: Option<SlabRef>) -> Self {
        let storage = match slab {
            Some(slab) => Storage::Slab(slab),
            None => Storage::Inline {
                len: wire.small_len,
                bytes: wire.payload,
            },
        };
        Self {
            tag: wire.tag,
            storage,
        }
    }

    /// Encode back to the wire format.
    ///
    /// `big_len` is written for slab-backed cells; it is the payload length
    /// of the slab the cell points at.
    pub fn to_wire(&self, big_len: i32) -> WireCell {
        match self.storage {
            Storage::Inline { len, bytes } => WireCell {
                tag: self.tag,
                is_slab: false,
                small_len: len,
                payload: bytes,
            },
            Storage::Slab(slab) => {
                let mut payload = [0u8; INLINE_CAPACITY];
                payload[0..4].copy_from_slice(&big_len.to_le_bytes());
                payload[SLAB_OFFSET_AT..]
                    .copy_from_slice(&(slab.offset() as i32).to_le_bytes());
                WireCell {
                    tag: self.tag,
                    is_slab: true,
                    small_len: 0,
                    payload,
                }
            }
        }
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[at..at + 4]);
    i32::from_le_bytes(b)
}
