//! Reading heap images.
//!
//! ```text
//! bytes[4]   magic "OHP2"
//! i32        total slab size
//! i32        cell count
//! bytes[..]  slab region
//! Cell[..]   16-byte cell records
//! ```
//!
//! All integers are little-endian.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use object::{CELL_SIZE, Cell, SlabRef, WireCell};

use crate::{Heap, LoadError};

pub const IMAGE_MAGIC: &[u8; 4] = b"OHP2";

pub fn load_file(path: &Path) -> Result<Heap, LoadError> {
    let mut reader = BufReader::new(File::open(path)?);
    load(&mut reader)
}

pub fn load_bytes(bytes: &[u8]) -> Result<Heap, LoadError> {
    let mut reader = bytes;
    load(&mut reader)
}

pub fn load(r: &mut dyn Read) -> Result<Heap, LoadError> {
    let mut magic = [0u8; 4];
    read_header_field(r, &mut magic, "magic")?;
    if &magic != IMAGE_MAGIC {
        return Err(LoadError::Format(format!(
            "expected {:?} in heap header, got {:?}",
            IMAGE_MAGIC.escape_ascii().to_string(),
            magic.escape_ascii().to_string(),
        )));
    }

    let total_slab_size = read_header_size(r, "total_slab_size")?;
    log::debug!("total_slab_size = {total_slab_size}");
    let num_cells = read_header_size(r, "num_cells")?;
    log::debug!("num_cells = {num_cells}");

    let slabs = read_up_to(r, total_slab_size)?;
    if slabs.len() != total_slab_size {
        return Err(LoadError::Corrupt(format!(
            "expected {total_slab_size} bytes of slabs, got {}",
            slabs.len()
        )));
    }

    let records = read_up_to(r, num_cells * CELL_SIZE)?;
    let got = records.len() / CELL_SIZE;
    if got != num_cells {
        return Err(LoadError::Corrupt(format!(
            "expected {num_cells} cells, got {got}"
        )));
    }

    // Every offset is checked before any cell is interpreted.
    let mut cells = Vec::with_capacity(num_cells);
    let mut num_slabs = 0usize;
    for (i, record) in records.chunks_exact(CELL_SIZE).enumerate() {
        let mut bytes = [0u8; CELL_SIZE];
        bytes.copy_from_slice(record);
        let wire = WireCell::from_bytes(&bytes);
        let slab = if wire.is_slab {
            num_slabs += 1;
            Some(resolve_offset(i, wire.slab_offset(), total_slab_size)?)
        } else {
            None
        };
        cells.push(Cell::from_wire(&wire, slab));
    }
    log::debug!("patched {num_slabs} slabs");

    let heap = Heap::from_parts(slabs, cells);
    if log::log_enabled!(log::Level::Debug) {
        for span in heap.slab_spans() {
            log::debug!("slab @{} len = {}", span.offset, span.len);
        }
    }
    Ok(heap)
}

fn resolve_offset(
    index: usize,
    offset: i32,
    total_slab_size: usize,
) -> Result<SlabRef, LoadError> {
    match u32::try_from(offset) {
        Ok(off) if (off as usize) < total_slab_size => Ok(SlabRef::new(off)),
        _ => Err(LoadError::Corrupt(format!(
            "cell {index}: slab offset {offset} outside slab region of {total_slab_size} bytes"
        ))),
    }
}

fn read_header_field(
    r: &mut dyn Read,
    buf: &mut [u8],
    what: &str,
) -> Result<(), LoadError> {
    r.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => {
            LoadError::Format(format!("truncated header reading {what}"))
        }
        _ => LoadError::Io(err),
    })
}

fn read_header_size(r: &mut dyn Read, what: &str) -> Result<usize, LoadError> {
    let mut b = [0u8; 4];
    read_header_field(r, &mut b, what)?;
    let value = i32::from_le_bytes(b);
    usize::try_from(value)
        .map_err(|_| LoadError::Format(format!("negative {what}: {value}")))
}

/// Read at most `limit` bytes, growing the buffer only as data arrives.
fn read_up_to(r: &mut dyn Read, limit: usize) -> Result<Vec<u8>, LoadError> {
    let mut buf = Vec::new();
    (&mut *r).take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

pub(crate) fn write_i32(w: &mut dyn Write, v: i32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}
