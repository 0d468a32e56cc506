//! Mutable resize engine (spec §4.4): the routine every mutation funnels
//! through to open or close a run of character slots before the caller
//! writes the actual replacement characters into the freshly opened gap.
//!
//! Grounded on spec §4.4 verbatim for the shape of the primitive
//! (`change_size_multiple` / `change_size`), with a try-the-cheap-path-then
//! -fall-back structure for the segment collector below, which keeps the
//! first handful of retained runs inline and only spills to the heap once
//! a replace touches more than a few ranges at once.

use crate::alloc::{self, ContentsAllocator};
use crate::error::StringError;
use crate::range::CharRange;
use crate::storage::{Buffer, StorageHeader};

/// How many retained runs `change_size_multiple` keeps on the stack before
/// falling back to a `Vec`. Single- and few-range replaces (by far the
/// common case: one `replace`, one `insert`, one `delete`) never spill.
const INLINE_SEGMENTS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Segment {
    src_start: usize,
    len: usize,
    dst_start: usize,
}

enum SegmentList {
    Inline([Segment; INLINE_SEGMENTS], usize),
    Spilled(Vec<Segment>),
}

impl SegmentList {
    fn new() -> Self {
        SegmentList::Inline([Segment { src_start: 0, len: 0, dst_start: 0 }; INLINE_SEGMENTS], 0)
    }

    fn push(&mut self, seg: Segment) {
        match self {
            SegmentList::Inline(buf, len) if *len < INLINE_SEGMENTS => {
                buf[*len] = seg;
                *len += 1;
            }
            SegmentList::Inline(buf, len) => {
                let mut v = buf[..*len].to_vec();
                v.push(seg);
                *self = SegmentList::Spilled(v);
            }
            SegmentList::Spilled(v) => v.push(seg),
        }
    }

    fn as_slice(&self) -> &[Segment] {
        match self {
            SegmentList::Inline(buf, len) => &buf[..*len],
            SegmentList::Spilled(v) => v,
        }
    }
}

/// Splits the *retained* (untouched) runs of `old_length` characters out
/// from under `ranges` (which are replaced, in order, by `insert_len` fresh
/// characters each), records where each run lands in the new buffer, and
/// records where each range's own gap lands too (in `ranges` order).
fn compute_segments(
    old_length: usize,
    ranges: &[CharRange],
    insert_len: usize,
) -> (SegmentList, Vec<usize>, usize) {
    let mut segments = SegmentList::new();
    let mut gap_starts = Vec::with_capacity(ranges.len());
    let mut src_cursor = 0usize;
    let mut dst_cursor = 0usize;
    for r in ranges {
        if r.location > src_cursor {
            let len = r.location - src_cursor;
            segments.push(Segment { src_start: src_cursor, len, dst_start: dst_cursor });
            dst_cursor += len;
        }
        gap_starts.push(dst_cursor);
        dst_cursor += insert_len;
        src_cursor = r.end();
    }
    if src_cursor < old_length {
        let len = old_length - src_cursor;
        segments.push(Segment { src_start: src_cursor, len, dst_start: dst_cursor });
        dst_cursor += len;
    }
    (segments, gap_starts, dst_cursor)
}

/// Opens `ranges.len()` gaps of `insert_len` characters each in `header`'s
/// storage, in one rearrangement pass, promoting to Unicode storage first
/// if `make_unicode` asks for it or the header already is. `ranges` must be
/// sorted by `location` and non-overlapping; this is a structural
/// precondition, not user input, so it is a `debug_assert`.
///
/// Returns the character index of each opened gap, in `ranges` order, so
/// the caller can write the real replacement characters into them.
///
/// This always rebuilds into a freshly sized buffer rather than shuffling
/// the existing one element-by-element in place: a replace that touches
/// several ranges at once can grow some spans and shrink others in the
/// same call, and getting an in-place shuffle provably right for every
/// mix of growing and shrinking spans needs either a watertight ordering
/// proof or a test run to lean on — this crate has neither luxury, so it
/// pays one allocation for a construction that is obviously correct by
/// inspection instead.
pub fn change_size_multiple(
    header: &mut StorageHeader,
    ranges: &[CharRange],
    insert_len: usize,
    make_unicode: bool,
) -> Result<Vec<usize>, StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    debug_assert!(ranges.windows(2).all(|w| w[0].end() <= w[1].location));

    let old_length = header.length();
    let deleted_total: usize = ranges.iter().map(|r| r.length).sum();
    let inserted_total = ranges
        .len()
        .checked_mul(insert_len)
        .ok_or(StringError::Overflow)?;
    let new_length = old_length
        .checked_sub(deleted_total)
        .and_then(|v| v.checked_add(inserted_total))
        .ok_or(StringError::Overflow)?;

    let unicode_final = header.is_unicode() || make_unicode;
    let char_size = if unicode_final { 2 } else { 1 };
    let required_bytes = new_length.checked_mul(char_size).ok_or(StringError::Overflow)?;

    if header.is_fixed_capacity() && required_bytes > header.capacity() {
        return Err(StringError::Overflow);
    }

    let (segments, gap_starts, tiled_length) = compute_segments(old_length, ranges, insert_len);
    debug_assert_eq!(tiled_length, new_length);

    let old_char_size = if header.is_unicode() { 2 } else { 1 };
    let representation_changes = old_char_size != char_size;

    let allocator: std::sync::Arc<dyn ContentsAllocator> = header
        .contents_allocator()
        .cloned()
        .unwrap_or_else(alloc::default_allocator);

    let new_capacity_bytes = if header.is_fixed_capacity() {
        required_bytes
    } else {
        alloc::new_capacity(
            required_bytes,
            if representation_changes { 0 } else { header.capacity() },
            true,
            1,
            header.desired_capacity().saturating_mul(char_size),
            false,
            allocator.as_ref(),
        )
        .ok_or(StringError::Overflow)?
    };

    let old_bytes = header.contents().to_vec();
    let mut new_bytes = vec![0u8; new_capacity_bytes];
    for seg in segments.as_slice() {
        let src = &old_bytes[seg.src_start * old_char_size..(seg.src_start + seg.len) * old_char_size];
        let dst_byte_start = seg.dst_start * char_size;
        if representation_changes {
            // 8-bit -> UTF-16: every retained byte is already ASCII-range
            // (by construction: an 8-bit header's bytes were never more
            // than 8 bits wide), so widen each byte into a UTF-16 unit.
            debug_assert!(old_char_size == 1 && char_size == 2);
            for (i, &b) in src.iter().enumerate() {
                let unit = b as u16;
                let at = dst_byte_start + i * 2;
                new_bytes[at..at + 2].copy_from_slice(&unit.to_ne_bytes());
            }
        } else {
            new_bytes[dst_byte_start..dst_byte_start + src.len()].copy_from_slice(src);
        }
    }

    header.set_content_ptr(Buffer::Owned(new_bytes), new_capacity_bytes);
    header.set_capacity(new_capacity_bytes);
    header.set_explicit_length(new_length);
    if unicode_final && !header.is_unicode() {
        header.promote_to_unicode();
    }

    Ok(gap_starts)
}

/// Single-range convenience over [`change_size_multiple`].
pub fn change_size(
    header: &mut StorageHeader,
    range: CharRange,
    insert_len: usize,
    make_unicode: bool,
) -> Result<usize, StringError> {
    let gaps = change_size_multiple(header, std::slice::from_ref(&range), insert_len, make_unicode)?;
    Ok(gaps[0])
}

/// Writes `units` at character index `start` into `header`'s buffer. The
/// caller must have already opened a gap of at least `units.len()`
/// characters there (via [`change_size`] / [`change_size_multiple`]).
/// When `header` is still 8-bit, every unit must fit in a byte; anything
/// else is a contract violation in the calling code, not recoverable user
/// input, so it panics rather than returning a `Result`.
pub fn write_units_at(header: &mut StorageHeader, start: usize, units: &[u16]) {
    let unicode = header.is_unicode();
    let char_size = if unicode { 2 } else { 1 };
    let byte_start = start * char_size;
    match header.contents_mut() {
        Buffer::Owned(bytes) => {
            if unicode {
                for (i, &u) in units.iter().enumerate() {
                    let at = byte_start + i * 2;
                    bytes[at..at + 2].copy_from_slice(&u.to_ne_bytes());
                }
            } else {
                for (i, &u) in units.iter().enumerate() {
                    assert!(u < 0x100, "write_units_at: non-8-bit unit into 8-bit storage");
                    bytes[byte_start + i] = u as u8;
                }
            }
        }
        _ => panic!("write_units_at: mutable header must use Buffer::Owned storage"),
    }
}

/// Convenience for the common "replace one range with these characters"
/// mutation, used by the public facade: opens the gap and fills it in one
/// call.
pub fn replace_range(
    header: &mut StorageHeader,
    range: CharRange,
    replacement: &[u16],
    make_unicode: bool,
) -> Result<(), StringError> {
    let start = change_size(header, range, replacement.len(), make_unicode)?;
    write_units_at(header, start, replacement);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageHeader;

    fn mutable_ascii(s: &str) -> StorageHeader {
        let bytes = s.as_bytes().to_vec();
        let cap = bytes.len();
        StorageHeader::new_mutable(Buffer::Owned(bytes), s.len(), cap, false, false, 0, None)
    }

    #[test]
    fn insert_in_middle_shifts_tail_right() {
        let mut hdr = mutable_ascii("ace");
        replace_range(&mut hdr, CharRange::new(1, 0), &[b'b' as u16], false).unwrap();
        assert_eq!(hdr.character_bytes(), b"abce");
    }

    #[test]
    fn delete_shrinks_buffer() {
        let mut hdr = mutable_ascii("abcde");
        replace_range(&mut hdr, CharRange::new(1, 3), &[], false).unwrap();
        assert_eq!(hdr.character_bytes(), b"ae");
        assert_eq!(hdr.length(), 2);
    }

    #[test]
    fn replace_with_longer_text_grows_and_relocates_tail() {
        let mut hdr = mutable_ascii("hello world");
        replace_range(&mut hdr, CharRange::new(0, 5), &"goodbye".encode_utf16().collect::<Vec<_>>(), false).unwrap();
        assert_eq!(hdr.character_bytes(), b"goodbye world");
    }

    #[test]
    fn make_unicode_promotes_eight_bit_storage() {
        let mut hdr = mutable_ascii("abc");
        let repl: Vec<u16> = "é".encode_utf16().collect();
        replace_range(&mut hdr, CharRange::new(1, 1), &repl, true).unwrap();
        assert!(hdr.is_unicode());
        assert_eq!(hdr.utf16_units(), {
            let mut v = vec!['a' as u16];
            v.extend(repl);
            v.push('c' as u16);
            v
        });
    }

    #[test]
    fn multiple_ranges_in_one_pass() {
        let mut hdr = mutable_ascii("aXbXc");
        let ranges = [CharRange::new(1, 1), CharRange::new(3, 1)];
        let gaps = change_size_multiple(&mut hdr, &ranges, 1, false).unwrap();
        write_units_at(&mut hdr, gaps[0], &[b'-' as u16]);
        write_units_at(&mut hdr, gaps[1], &[b'-' as u16]);
        assert_eq!(hdr.character_bytes(), b"a-b-c");
    }

    #[test]
    fn fixed_capacity_rejects_growth_past_bound() {
        let bytes = b"abc".to_vec();
        let mut hdr = StorageHeader::new_mutable(Buffer::Owned(bytes), 3, 3, false, true, 3, None);
        let err = replace_range(&mut hdr, CharRange::new(3, 0), &[b'd' as u16], false);
        assert!(err.is_err());
    }

    #[test]
    fn inline_segment_list_spills_past_bound() {
        // 10 single-character deletions -> 10 retained segments, more than
        // INLINE_SEGMENTS, exercising the heap fallback.
        let s = "a0a1a2a3a4a5a6a7a8a9";
        let mut hdr = mutable_ascii(s);
        let ranges: Vec<CharRange> = (0..10).map(|i| CharRange::new(i * 2 + 1, 1)).collect();
        change_size_multiple(&mut hdr, &ranges, 0, false).unwrap();
        assert_eq!(hdr.character_bytes(), b"aaaaaaaaaa");
    }
}
