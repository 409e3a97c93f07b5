//! The loaded object heap.
//!
//! A [`Heap`] owns the slab region and the cell table for its whole lifetime.
//! Everything else refers to heap values through [`Handle`]s or through views
//! that borrow the heap, so no view can outlive the memory it reads.

use std::io::{self, Write};

use object::{Cell, Handle, INLINE_CAPACITY, RawHandle, SlabRef, Storage, Tag};

use crate::image::{IMAGE_MAGIC, write_i32};
use crate::{CodeView, HeapError, Object, StrView, TupleView};

/// Size of the length prefix at the start of every slab.
pub const SLAB_HEADER: usize = 4;

/// Bytes per handle inside a tuple or code slab.
pub const HANDLE_SIZE: usize = 4;

#[derive(Debug)]
pub struct Heap {
    slabs: Box<[u8]>,
    cells: Vec<Cell>,
}

/// One slab as seen from the cells that reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabSpan {
    /// Offset of the length prefix.
    pub offset: usize,
    /// Self-reported length (bytes for strings, entries for tuples/code).
    pub len: usize,
    /// Bytes of payload following the prefix.
    pub payload_bytes: usize,
}

impl Heap {
    /// Assemble a heap from already validated parts.
    ///
    /// Every [`Storage::Slab`] in `cells` must point inside `slabs`.
    pub(crate) fn from_parts(slabs: Vec<u8>, cells: Vec<Cell>) -> Self {
        Self {
            slabs: slabs.into_boxed_slice(),
            cells,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn slab_size(&self) -> usize {
        self.slabs.len()
    }

    /// The final cell, which by convention is the entry code object.
    pub fn last(&self) -> Option<Handle> {
        let index = self.cells.len().checked_sub(1)?;
        Some(Handle::new(index as u32))
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        (0..self.cells.len()).map(|i| Handle::new(i as u32))
    }

    /// Validate a wire handle against this heap.
    pub fn handle(&self, raw: RawHandle) -> Result<Handle, HeapError> {
        Handle::from_raw(raw)
            .filter(|h| h.index() < self.cells.len())
            .ok_or(HeapError::InvalidHandle(raw))
    }

    pub fn cell(&self, handle: Handle) -> Result<&Cell, HeapError> {
        self.cells
            .get(handle.index())
            .ok_or(HeapError::InvalidHandle(handle.raw()))
    }

    /// The raw tag of a cell.
    pub fn tag(&self, handle: Handle) -> Result<i16, HeapError> {
        Ok(self.cell(handle)?.tag)
    }

    fn expect(&self, handle: Handle, expected: Tag) -> Result<&Cell, HeapError> {
        let cell = self.cell(handle)?;
        if cell.tag != expected.raw() {
            return Err(HeapError::TypeMismatch {
                handle,
                expected,
                found: cell.tag,
            });
        }
        Ok(cell)
    }

    // ── Typed access ───────────────────────────────────────────────

    /// Decode any cell into its typed form.
    pub fn get(&self, handle: Handle) -> Result<Object<'_>, HeapError> {
        let cell = self.cell(handle)?;
        let tag = cell
            .tag()
            .map_err(|tag| HeapError::UnknownTag { handle, tag })?;
        Ok(match tag {
            Tag::None => Object::None,
            Tag::Bool => Object::Bool(self.bool(handle)?),
            Tag::Int => Object::Int(self.int(handle)?),
            Tag::Float => Object::Float(self.float(handle)?),
            Tag::Str => Object::Str(self.str(handle)?),
            Tag::Tuple => Object::Tuple(self.tuple(handle)?),
            Tag::Code => Object::Code(self.code(handle)?),
        })
    }

    pub fn int(&self, handle: Handle) -> Result<i64, HeapError> {
        let bits = self.numeric(handle, Tag::Int)?;
        Ok(i64::from_le_bytes(bits))
    }

    pub fn float(&self, handle: Handle) -> Result<f64, HeapError> {
        let bits = self.numeric(handle, Tag::Float)?;
        Ok(f64::from_le_bytes(bits))
    }

    pub fn bool(&self, handle: Handle) -> Result<bool, HeapError> {
        let bits = self.numeric(handle, Tag::Bool)?;
        Ok(i64::from_le_bytes(bits) != 0)
    }

    fn numeric(&self, handle: Handle, tag: Tag) -> Result<[u8; 8], HeapError> {
        self.expect(handle, tag)?
            .numeric_bits()
            .ok_or(HeapError::Corrupt {
                handle,
                reason: "numeric value stored in a slab",
            })
    }

    pub fn str(&self, handle: Handle) -> Result<StrView<'_>, HeapError> {
        let cell = self.expect(handle, Tag::Str)?;
        let bytes = match &cell.storage {
            Storage::Inline { len, bytes } => {
                let len = *len as usize;
                if len > INLINE_CAPACITY {
                    return Err(HeapError::Corrupt {
                        handle,
                        reason: "inline string longer than a cell",
                    });
                }
                &bytes[..len]
            }
            Storage::Slab(slab) => self.slab_payload(handle, *slab, 1)?,
        };
        Ok(StrView::new(handle, bytes))
    }

    pub fn tuple(&self, handle: Handle) -> Result<TupleView<'_>, HeapError> {
        let cell = self.expect(handle, Tag::Tuple)?;
        self.handle_array(handle, cell)
    }

    pub fn code(&self, handle: Handle) -> Result<CodeView<'_>, HeapError> {
        let cell = self.expect(handle, Tag::Code)?;
        let Storage::Slab(slab) = cell.storage else {
            return Err(HeapError::Corrupt {
                handle,
                reason: "code object stored inline",
            });
        };
        let fields = self.slab_payload(handle, slab, HANDLE_SIZE)?;
        CodeView::new(self, handle, TupleView::new(handle, fields))
    }

    fn handle_array<'h>(
        &'h self,
        handle: Handle,
        cell: &'h Cell,
    ) -> Result<TupleView<'h>, HeapError> {
        let bytes = match &cell.storage {
            Storage::Inline { len, bytes } => {
                let byte_len = *len as usize * HANDLE_SIZE;
                if byte_len > INLINE_CAPACITY {
                    return Err(HeapError::Corrupt {
                        handle,
                        reason: "inline tuple longer than a cell",
                    });
                }
                &bytes[..byte_len]
            }
            Storage::Slab(slab) => self.slab_payload(handle, *slab, HANDLE_SIZE)?,
        };
        Ok(TupleView::new(handle, bytes))
    }

    // ── Slabs ──────────────────────────────────────────────────────

    /// Self-reported length of the slab at `slab`.
    pub fn slab_len(&self, slab: SlabRef) -> Option<usize> {
        let start = slab.offset();
        let prefix = self.slabs.get(start..start.checked_add(SLAB_HEADER)?)?;
        let len = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        usize::try_from(len).ok()
    }

    /// Payload of the slab at `slab`, whose entries are `elem_size` bytes.
    fn slab_payload(
        &self,
        handle: Handle,
        slab: SlabRef,
        elem_size: usize,
    ) -> Result<&[u8], HeapError> {
        let corrupt = HeapError::Corrupt {
            handle,
            reason: "slab extends past the slab region",
        };
        let len = self.slab_len(slab).ok_or(corrupt.clone())?;
        let start = slab.offset() + SLAB_HEADER;
        let end = len
            .checked_mul(elem_size)
            .and_then(|n| n.checked_add(start))
            .ok_or(corrupt.clone())?;
        self.slabs.get(start..end).ok_or(corrupt)
    }

    /// Every distinct slab referenced by a cell, ordered by offset.
    ///
    /// Slabs whose framing does not fit the region are skipped.
    pub fn slab_spans(&self) -> Vec<SlabSpan> {
        let mut spans: Vec<SlabSpan> = self
            .cells
            .iter()
            .filter_map(|cell| {
                let Storage::Slab(slab) = cell.storage else {
                    return None;
                };
                let len = self.slab_len(slab)?;
                let elem_size = match cell.tag() {
                    Ok(Tag::Str) => 1,
                    _ => HANDLE_SIZE,
                };
                Some(SlabSpan {
                    offset: slab.offset(),
                    len,
                    payload_bytes: len * elem_size,
                })
            })
            .collect();
        spans.sort_by_key(|span| span.offset);
        spans.dedup_by_key(|span| span.offset);
        spans
    }

    // ── Debugging / re-encoding ───────────────────────────────────

    /// Render a cell for logs, never failing.
    pub fn debug_string(&self, handle: Handle) -> String {
        match self.get(handle) {
            Ok(object) => format!("<id {}> {object}", handle.index()),
            Err(err) => format!("<id {}> <{err}>", handle.index()),
        }
    }

    /// Write this heap back out in the image format.
    ///
    /// Slab references are turned back into wire offsets; the slab region is
    /// written unchanged.
    pub fn write_image(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(IMAGE_MAGIC)?;
        write_i32(w, self.slabs.len() as i32)?;
        write_i32(w, self.cells.len() as i32)?;
        w.write_all(&self.slabs)?;
        for cell in &self.cells {
            let big_len = match cell.storage {
                Storage::Slab(slab) => self.slab_len(slab).unwrap_or(0) as i32,
                Storage::Inline { .. } => 0,
            };
            w.write_all(&cell.to_wire(big_len).to_bytes())?;
        }
        Ok(())
    }
}
