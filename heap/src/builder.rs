use std::io::{self, Write};

use object::{CELL_SIZE, Cell, Handle, INLINE_CAPACITY, RawHandle, SlabRef, Storage, Tag};

use crate::heap::{HANDLE_SIZE, SLAB_HEADER};
use crate::image::{IMAGE_MAGIC, write_i32};
use crate::{CodeField, Heap, LoadError, load_bytes};

/// Slabs start on 4-byte boundaries so their prefixes and handles stay aligned.
const SLAB_ALIGN: usize = 4;

/// Handle written into the reserved slot 0 of a code object's field table.
const RESERVED_FIELD: RawHandle = -1;

/// Description of a code object for [`ImageBuilder::code`].
#[derive(Debug, Clone, Default)]
pub struct CodeSpec<'a> {
    pub argcount: i64,
    pub nlocals: i64,
    pub stacksize: i64,
    pub flags: i64,
    pub firstlineno: i64,
    pub name: &'a str,
    pub filename: &'a str,
    pub bytecode: &'a [u8],
    pub names: &'a [&'a str],
    pub varnames: &'a [&'a str],
    pub consts: &'a [Handle],
}

/// Builds heap images: the encoder side of [`load`](crate::load).
///
/// Values small enough are stored inline; the rest get a slab. Slabs are
/// laid out back to back, each padded to a 4-byte boundary, and string slabs
/// carry a trailing NUL.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    slabs: Vec<u8>,
    cells: Vec<Cell>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Append an arbitrary cell.
    pub fn push_cell(&mut self, cell: Cell) -> Handle {
        let handle = Handle::new(self.cells.len() as u32);
        self.cells.push(cell);
        handle
    }

    pub fn none(&mut self) -> Handle {
        self.push_cell(Cell::none())
    }

    pub fn bool(&mut self, value: bool) -> Handle {
        self.push_cell(Cell::bool(value))
    }

    pub fn int(&mut self, value: i64) -> Handle {
        self.push_cell(Cell::int(value))
    }

    pub fn float(&mut self, value: f64) -> Handle {
        self.push_cell(Cell::float(value))
    }

    /// A string, inline when it fits with room for a terminating NUL.
    pub fn str(&mut self, value: impl AsRef<[u8]>) -> Handle {
        let bytes = value.as_ref();
        if bytes.len() < INLINE_CAPACITY {
            let mut padded = bytes.to_vec();
            padded.push(0);
            if let Some(cell) = Cell::inline(Tag::Str, bytes.len() as u8, &padded) {
                return self.push_cell(cell);
            }
        }
        self.str_slab(bytes)
    }

    /// A string that always lives in a slab.
    pub fn str_slab(&mut self, value: impl AsRef<[u8]>) -> Handle {
        let bytes = value.as_ref();
        let mut payload = bytes.to_vec();
        payload.push(0);
        let slab = self.slab(bytes.len(), &payload);
        self.push_cell(Cell::slab(Tag::Str, slab))
    }

    pub fn tuple(&mut self, items: &[Handle]) -> Handle {
        let raw: Vec<RawHandle> = items.iter().map(|h| h.raw()).collect();
        self.tuple_raw(&raw)
    }

    /// A tuple of wire handles, which may include out-of-range values.
    pub fn tuple_raw(&mut self, items: &[RawHandle]) -> Handle {
        let bytes = handle_bytes(items);
        match Cell::inline(Tag::Tuple, items.len() as u8, &bytes) {
            Some(cell) => self.push_cell(cell),
            None => self.tuple_slab_raw(items),
        }
    }

    pub fn tuple_slab(&mut self, items: &[Handle]) -> Handle {
        let raw: Vec<RawHandle> = items.iter().map(|h| h.raw()).collect();
        self.tuple_slab_raw(&raw)
    }

    fn tuple_slab_raw(&mut self, items: &[RawHandle]) -> Handle {
        let slab = self.slab(items.len(), &handle_bytes(items));
        self.push_cell(Cell::slab(Tag::Tuple, slab))
    }

    /// A code object plus all of the field cells it points at.
    ///
    /// The code cell is appended last, so calling this at the end makes it
    /// the image's entry point.
    pub fn code(&mut self, desc: &CodeSpec<'_>) -> Handle {
        let mut fields = vec![RESERVED_FIELD; CodeField::TABLE_LEN];
        fields[CodeField::ArgCount as usize] = self.int(desc.argcount).raw();
        fields[CodeField::NLocals as usize] = self.int(desc.nlocals).raw();
        fields[CodeField::StackSize as usize] = self.int(desc.stacksize).raw();
        fields[CodeField::Flags as usize] = self.int(desc.flags).raw();
        fields[CodeField::FirstLineNo as usize] = self.int(desc.firstlineno).raw();
        fields[CodeField::Name as usize] = self.str(desc.name).raw();
        fields[CodeField::Filename as usize] = self.str(desc.filename).raw();
        fields[CodeField::Code as usize] = self.str(desc.bytecode).raw();

        let names: Vec<Handle> = desc.names.iter().map(|n| self.str(n)).collect();
        fields[CodeField::Names as usize] = self.tuple(&names).raw();
        let varnames: Vec<Handle> = desc.varnames.iter().map(|n| self.str(n)).collect();
        fields[CodeField::VarNames as usize] = self.tuple(&varnames).raw();
        fields[CodeField::Consts as usize] = self.tuple(desc.consts).raw();

        self.code_raw(&fields)
    }

    /// A code object over an explicit field table.
    pub fn code_raw(&mut self, fields: &[RawHandle]) -> Handle {
        let slab = self.slab(fields.len(), &handle_bytes(fields));
        self.push_cell(Cell::slab(Tag::Code, slab))
    }

    /// Append one slab and return its reference.
    fn slab(&mut self, len: usize, payload: &[u8]) -> SlabRef {
        let offset = self.slabs.len();
        self.slabs.extend_from_slice(&(len as i32).to_le_bytes());
        self.slabs.extend_from_slice(payload);
        while self.slabs.len() % SLAB_ALIGN != 0 {
            self.slabs.push(0);
        }
        SlabRef::new(offset as u32)
    }

    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(IMAGE_MAGIC)?;
        write_i32(w, self.slabs.len() as i32)?;
        write_i32(w, self.cells.len() as i32)?;
        w.write_all(&self.slabs)?;
        for cell in &self.cells {
            w.write_all(&cell.to_wire(self.big_len(cell)).to_bytes())?;
        }
        Ok(())
    }

    fn big_len(&self, cell: &Cell) -> i32 {
        match cell.storage {
            Storage::Slab(slab) => {
                let at = slab.offset();
                self.slabs
                    .get(at..at + SLAB_HEADER)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .unwrap_or(0)
            }
            Storage::Inline { .. } => 0,
        }
    }

    /// The encoded image.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            IMAGE_MAGIC.len() + 8 + self.slabs.len() + self.cells.len() * CELL_SIZE,
        );
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    /// Encode and load back through the regular loader.
    pub fn into_heap(self) -> Result<Heap, LoadError> {
        load_bytes(&self.finish())
    }
}

fn handle_bytes(items: &[RawHandle]) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.len() * HANDLE_SIZE);
    for item in items {
        out.extend_from_slice(&item.to_le_bytes());
    }
    out
}
