mod builder;
mod error;
mod heap;
mod image;
mod view;

pub use builder::{CodeSpec, ImageBuilder};
pub use error::{HeapError, LoadError};
pub use heap::{HANDLE_SIZE, Heap, SLAB_HEADER, SlabSpan};
pub use image::{IMAGE_MAGIC, load, load_bytes, load_file};
pub use view::{CodeField, CodeView, Object, StrView, TupleView};

#[cfg(test)]
mod tests {
    use super::*;
    use object::{CELL_SIZE, Cell, Handle, SlabRef, Tag};

    fn sample_code(b: &mut ImageBuilder) -> Handle {
        let hello = b.str("hello");
        let long = b.str("a considerably longer constant string");
        b.code(&CodeSpec {
            argcount: 0,
            nlocals: 2,
            stacksize: 3,
            flags: 64,
            firstlineno: 7,
            name: "<module>",
            filename: "hello_world.py",
            bytecode: &[100, 0, 0, 83],
            names: &["print", "x", "y", "z"],
            varnames: &[],
            consts: &[hello, long],
        })
    }

    // ── Views ──────────────────────────────────────────────────────

    #[test]
    fn inline_and_slab_strings_read_back() {
        let mut b = ImageBuilder::new();
        let short = b.str("hi");
        let eleven = b.str("exactly 11!");
        let long = b.str("this one goes in a slab");
        let forced = b.str_slab("tiny");
        let heap = b.into_heap().unwrap();

        assert!(!heap.cell(short).unwrap().is_slab());
        assert!(!heap.cell(eleven).unwrap().is_slab());
        assert!(heap.cell(long).unwrap().is_slab());
        assert!(heap.cell(forced).unwrap().is_slab());

        assert_eq!(heap.str(short).unwrap().as_bytes(), b"hi");
        assert_eq!(heap.str(eleven).unwrap().as_bytes(), b"exactly 11!");
        assert_eq!(
            heap.str(long).unwrap().as_bytes(),
            b"this one goes in a slab"
        );
        assert_eq!(heap.str(forced).unwrap().len(), 4);
    }

    #[test]
    fn strings_keep_embedded_nuls() {
        let mut b = ImageBuilder::new();
        let inline = b.str(b"a\0b");
        let slab = b.str(b"0123456789\0abcdef");
        let heap = b.into_heap().unwrap();

        let s = heap.str(inline).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.as_bytes(), b"a\0b");
        assert_eq!(s.as_c_bytes(), b"a");

        let s = heap.str(slab).unwrap();
        assert_eq!(s.len(), 17);
        assert_eq!(s.as_c_bytes(), b"0123456789");
    }

    #[test]
    fn inline_and_slab_tuples_read_back() {
        let mut b = ImageBuilder::new();
        let items: Vec<Handle> = (0..5).map(|i| b.int(i)).collect();
        let small = b.tuple(&items[..3]);
        let big = b.tuple(&items);
        let empty = b.tuple(&[]);
        let heap = b.into_heap().unwrap();

        assert!(!heap.cell(small).unwrap().is_slab());
        assert!(heap.cell(big).unwrap().is_slab());

        let t = heap.tuple(small).unwrap();
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        let t = heap.tuple(big).unwrap();
        assert_eq!(t.len(), 5);
        assert_eq!(t.get(4), Some(4));
        assert_eq!(t.get(5), None);
        assert!(heap.tuple(empty).unwrap().is_empty());

        let fourth = heap.handle(t.get(3).unwrap()).unwrap();
        assert_eq!(heap.int(fourth).unwrap(), 3);
    }

    #[test]
    fn scalars_read_back() {
        let mut b = ImageBuilder::new();
        let n = b.none();
        let t = b.bool(true);
        let f = b.bool(false);
        let i = b.int(i64::MIN);
        let x = b.float(-0.125);
        let heap = b.into_heap().unwrap();

        assert!(matches!(heap.get(n).unwrap(), Object::None));
        assert!(heap.bool(t).unwrap());
        assert!(!heap.bool(f).unwrap());
        assert_eq!(heap.int(i).unwrap(), i64::MIN);
        assert_eq!(heap.float(x).unwrap(), -0.125);
    }

    #[test]
    fn code_fields_read_back() {
        let mut b = ImageBuilder::new();
        let code = sample_code(&mut b);
        let heap = b.into_heap().unwrap();

        assert_eq!(heap.last(), Some(code));
        let co = heap.code(code).unwrap();
        assert_eq!(co.argcount().unwrap(), 0);
        assert_eq!(co.nlocals().unwrap(), 2);
        assert_eq!(co.stacksize().unwrap(), 3);
        assert_eq!(co.flags().unwrap(), 64);
        assert_eq!(co.firstlineno().unwrap(), 7);
        assert_eq!(co.name().unwrap().as_bytes(), b"<module>");
        assert_eq!(co.filename().unwrap().as_bytes(), b"hello_world.py");
        assert_eq!(co.code().unwrap().as_bytes(), &[100, 0, 0, 83]);
        assert_eq!(co.names().unwrap().len(), 4);
        assert!(co.varnames().unwrap().is_empty());

        let consts = co.consts().unwrap();
        let first = heap.handle(consts.get(0).unwrap()).unwrap();
        assert_eq!(heap.str(first).unwrap().as_bytes(), b"hello");
        let names = co.names().unwrap();
        let print = heap.handle(names.get(0).unwrap()).unwrap();
        assert_eq!(heap.str(print).unwrap().as_bytes(), b"print");
    }

    #[test]
    fn accessors_check_tags() {
        let mut b = ImageBuilder::new();
        let i = b.int(1);
        let s = b.str("x");
        let heap = b.into_heap().unwrap();

        assert_eq!(
            heap.str(i).unwrap_err(),
            HeapError::TypeMismatch {
                handle: i,
                expected: Tag::Str,
                found: Tag::Int.raw(),
            }
        );
        assert!(matches!(
            heap.code(s),
            Err(HeapError::TypeMismatch { expected: Tag::Code, .. })
        ));
        assert!(matches!(heap.int(s), Err(HeapError::TypeMismatch { .. })));
    }

    #[test]
    fn handles_are_bounds_checked() {
        let mut b = ImageBuilder::new();
        b.none();
        let heap = b.into_heap().unwrap();

        assert_eq!(heap.handle(0), Ok(Handle::new(0)));
        assert_eq!(heap.handle(1), Err(HeapError::InvalidHandle(1)));
        assert_eq!(heap.handle(-1), Err(HeapError::InvalidHandle(-1)));
        assert!(heap.get(Handle::new(9)).is_err());
    }

    #[test]
    fn code_stored_inline_is_corrupt() {
        let mut b = ImageBuilder::new();
        let bogus = b.push_cell(Cell::inline(Tag::Code, 0, &[]).unwrap());
        let heap = b.into_heap().unwrap();
        assert!(matches!(heap.code(bogus), Err(HeapError::Corrupt { .. })));
    }

    #[test]
    fn short_code_field_table_is_corrupt() {
        let mut b = ImageBuilder::new();
        let code = b.code_raw(&[0, 0, 0]);
        let heap = b.into_heap().unwrap();
        assert!(matches!(heap.code(code), Err(HeapError::Corrupt { .. })));
    }

    #[test]
    fn unknown_tags_load_but_fail_on_access() {
        let mut b = ImageBuilder::new();
        let mut cell = Cell::none();
        cell.tag = -42;
        let odd = b.push_cell(cell);
        let heap = b.into_heap().unwrap();
        assert_eq!(heap.tag(odd), Ok(-42));
        assert_eq!(
            heap.get(odd).unwrap_err(),
            HeapError::UnknownTag { handle: odd, tag: -42 }
        );
    }

    #[test]
    fn debug_strings() {
        let mut b = ImageBuilder::new();
        let i = b.int(42);
        let s = b.str("hey");
        let code = sample_code(&mut b);
        let heap = b.into_heap().unwrap();

        assert_eq!(heap.debug_string(i), "<id 0> Int 42");
        assert_eq!(heap.debug_string(s), "<id 1> Str \"hey\"");
        assert!(heap.debug_string(code).ends_with("code <<module>>"));
        assert!(heap.debug_string(Handle::new(1000)).contains("does not name a cell"));
    }

    // ── Slab framing ───────────────────────────────────────────────

    #[test]
    fn slab_spans_cover_the_region() {
        let mut b = ImageBuilder::new();
        let items: Vec<Handle> = (0..9).map(|i| b.int(i)).collect();
        b.tuple(&items);
        b.str("some fairly long string here");
        b.str_slab("");
        b.str_slab("abc");
        sample_code(&mut b);
        let heap = b.into_heap().unwrap();

        let spans = heap.slab_spans();
        assert_eq!(spans.len(), 8);
        let mut cursor = 0;
        for span in &spans {
            // At most a NUL plus alignment padding separates slabs.
            assert!(span.offset >= cursor, "slab at {} overlaps", span.offset);
            assert!(span.offset - cursor <= 4, "gap before slab at {}", span.offset);
            cursor = span.offset + SLAB_HEADER + span.payload_bytes;
        }
        assert!(cursor <= heap.slab_size());
        assert!(heap.slab_size() - cursor <= 4);
    }

    // ── Loading ────────────────────────────────────────────────────

    #[test]
    fn bad_magic_is_a_format_error() {
        let mut image = ImageBuilder::new().finish();
        image[..4].copy_from_slice(b"OHP1");
        assert!(matches!(load_bytes(&image), Err(LoadError::Format(_))));
    }

    #[test]
    fn truncated_header_is_a_format_error() {
        assert!(matches!(load_bytes(b""), Err(LoadError::Format(_))));
        assert!(matches!(load_bytes(b"OH"), Err(LoadError::Format(_))));
        assert!(matches!(load_bytes(b"OHP2\x00\x00"), Err(LoadError::Format(_))));
        assert!(matches!(
            load_bytes(b"OHP2\x00\x00\x00\x00\x01"),
            Err(LoadError::Format(_))
        ));
    }

    #[test]
    fn negative_sizes_are_format_errors() {
        let mut image = Vec::new();
        image.extend_from_slice(IMAGE_MAGIC);
        image.extend_from_slice(&(-4i32).to_le_bytes());
        image.extend_from_slice(&0i32.to_le_bytes());
        assert!(matches!(load_bytes(&image), Err(LoadError::Format(_))));
    }

    #[test]
    fn missing_cells_are_corrupt() {
        let mut b = ImageBuilder::new();
        b.int(1);
        b.int(2);
        let mut image = b.finish();
        image.truncate(image.len() - CELL_SIZE / 2);
        let err = load_bytes(&image).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(ref msg) if msg.contains("expected 2 cells, got 1")));
    }

    #[test]
    fn short_slab_region_is_corrupt() {
        let mut image = Vec::new();
        image.extend_from_slice(IMAGE_MAGIC);
        image.extend_from_slice(&64i32.to_le_bytes());
        image.extend_from_slice(&0i32.to_le_bytes());
        image.extend_from_slice(&[0u8; 10]);
        assert!(matches!(load_bytes(&image), Err(LoadError::Corrupt(_))));
    }

    #[test]
    fn out_of_range_slab_offsets_are_corrupt() {
        for offset in [-4i32, 8, 1000] {
            let mut b = ImageBuilder::new();
            b.str_slab("ok");
            b.push_cell(Cell::slab(Tag::Str, SlabRef::new(0)));
            let mut image = b.finish();
            // Rewrite the second cell's wire offset (bytes 12..16 of the record).
            let at = image.len() - CELL_SIZE + 12;
            image[at..at + 4].copy_from_slice(&offset.to_le_bytes());
            assert!(
                matches!(load_bytes(&image), Err(LoadError::Corrupt(_))),
                "offset {offset} accepted"
            );
        }
    }

    #[test]
    fn bad_slab_length_fails_lazily() {
        let mut b = ImageBuilder::new();
        let s = b.str_slab("abcd");
        let mut image = b.finish();
        // Slab region starts right after the 12-byte header.
        image[12..16].copy_from_slice(&1000i32.to_le_bytes());
        let heap = load_bytes(&image).unwrap();
        assert!(matches!(heap.str(s), Err(HeapError::Corrupt { .. })));
    }

    #[test]
    fn empty_heap_has_no_entry() {
        let heap = ImageBuilder::new().into_heap().unwrap();
        assert!(heap.is_empty());
        assert_eq!(heap.last(), None);
    }

    #[test]
    fn rewriting_reproduces_the_image() {
        let mut b = ImageBuilder::new();
        b.float(1.5);
        b.str("a string long enough for a slab");
        sample_code(&mut b);
        let image = b.finish();

        let heap = load_bytes(&image).unwrap();
        let mut out = Vec::new();
        heap.write_image(&mut out).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn load_from_file() {
        let mut b = ImageBuilder::new();
        sample_code(&mut b);
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b.finish()).unwrap();

        let heap = load_file(file.path()).unwrap();
        let last = heap.last().unwrap();
        assert_eq!(heap.code(last).unwrap().name().unwrap().as_bytes(), b"<module>");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("nope.ohp")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
