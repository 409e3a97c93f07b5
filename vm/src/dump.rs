use std::io::{self, Write};

use heap::Heap;

/// Write one line per cell, then a disassembly of the entry code if the last
/// cell is a code object.
pub fn dump_heap(heap: &Heap, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{} cells, {} slab bytes", heap.len(), heap.slab_size())?;
    for handle in heap.handles() {
        writeln!(w, "{}", heap.debug_string(handle))?;
    }

    let Some(entry) = heap.last() else {
        return Ok(());
    };
    let Ok(code) = heap.code(entry) else {
        writeln!(w, "last cell {entry} is not a code object")?;
        return Ok(());
    };
    let name = code.name().map(|s| s.to_string_lossy()).unwrap_or_default();
    writeln!(w)?;
    writeln!(w, "disassembly of {name}:")?;
    match code.code() {
        Ok(bytes) => w.write_all(bytecode::disassemble(bytes.as_bytes()).as_bytes())?,
        Err(err) => writeln!(w, "  {err}")?,
    }
    Ok(())
}
