mod cell;
mod handle;
mod header;

pub use cell::{CELL_SIZE, Cell, INLINE_CAPACITY, SlabRef, Storage, WireCell};
pub use handle::{Handle, RawHandle};
pub use header::{Tag, tag_debug_name};

#[cfg(test)]
mod tests {
    use super::*;

    // ── Tags ───────────────────────────────────────────────────────

    #[test]
    fn tags_round_trip_through_raw() {
        for tag in [
            Tag::None,
            Tag::Bool,
            Tag::Int,
            Tag::Float,
            Tag::Str,
            Tag::Tuple,
            Tag::Code,
        ] {
            assert_eq!(Tag::try_from(tag.raw()), Ok(tag));
            assert!(tag.raw() < 0);
        }
        assert_eq!(Tag::try_from(-8), Err(-8));
        assert_eq!(Tag::try_from(0), Err(0));
    }

    #[test]
    fn tag_debug_names() {
        assert_eq!(tag_debug_name(-1), "None");
        assert_eq!(tag_debug_name(-5), "str");
        assert_eq!(tag_debug_name(-7), "code");
        assert_eq!(tag_debug_name(3), "?");
    }

    // ── Handles ────────────────────────────────────────────────────

    #[test]
    fn negative_raw_handles_are_not_cells() {
        assert_eq!(Handle::from_raw(-1), None);
        assert_eq!(Handle::from_raw(0), Some(Handle::new(0)));
        assert_eq!(Handle::from_raw(41).map(Handle::index), Some(41));
        assert_eq!(Handle::new(7).raw(), 7);
    }

    // ── Wire layout ────────────────────────────────────────────────

    #[test]
    fn wire_layout_matches_record() {
        let mut bytes = [0u8; CELL_SIZE];
        bytes[0..2].copy_from_slice(&(-5i16).to_le_bytes());
        bytes[2] = 1;
        bytes[4..8].copy_from_slice(&20i32.to_le_bytes());
        bytes[12..16].copy_from_slice(&64i32.to_le_bytes());

        let wire = WireCell::from_bytes(&bytes);
        assert_eq!(wire.tag, -5);
        assert!(wire.is_slab);
        assert_eq!(wire.big_len(), 20);
        assert_eq!(wire.slab_offset(), 64);
        assert_eq!(wire.to_bytes(), bytes);
    }

    #[test]
    fn scalars_live_in_the_numeric_slot() {
        let cell = Cell::int(-123_456_789_012);
        let wire = cell.to_wire(0);
        let bytes = wire.to_bytes();
        assert_eq!(&bytes[8..16], &(-123_456_789_012i64).to_le_bytes());
        assert_eq!(bytes[2], 0);

        let f = Cell::float(2.5);
        assert_eq!(f.numeric_bits(), Some(2.5f64.to_le_bytes()));
    }

    #[test]
    fn inline_rejects_oversized_payload() {
        assert!(Cell::inline(Tag::Str, 12, &[b'x'; 12]).is_some());
        assert!(Cell::inline(Tag::Str, 13, &[b'x'; 13]).is_none());
    }

    #[test]
    fn slab_cells_encode_offset_and_len() {
        let cell = Cell::slab(Tag::Tuple, SlabRef::new(24));
        let wire = cell.to_wire(8);
        assert!(wire.is_slab);
        assert_eq!(wire.slab_offset(), 24);
        assert_eq!(wire.big_len(), 8);

        let back = Cell::from_wire(&wire, Some(SlabRef::new(24)));
        assert_eq!(back, cell);
        assert!(back.is_slab());
        assert_eq!(back.numeric_bits(), None);
    }
}
