//! Storage header & representation dispatcher (spec §3, §4.1).
//!
//! All representation bits live behind the accessors on [`StorageHeader`];
//! no other module in this crate reads `flags` or `buffer` directly.

use crate::alloc::ContentsAllocator;
use bitflags::bitflags;
use std::sync::Arc;

/// Inline strings store their payload directly where the header would
/// otherwise hold a buffer pointer (spec §3 "payload immediately follows
/// header"; spec §9 "represent as a variant `Inline([u8; N])`"). 23 bytes
/// keeps `StorageHeader` at a modest, cache-line-friendly size while still
/// fitting short ASCII words and short UTF-16 runs without a heap
/// allocation.
pub const INLINE_CAPACITY: usize = 23;

bitflags! {
    /// The compact flag set from spec §3's `flags` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u16 {
        const MUTABLE                     = 1 << 0;
        const UNICODE                      = 1 << 1;
        const HAS_LENGTH_BYTE              = 1 << 2;
        const HAS_NULL_BYTE                = 1 << 3;
        const INLINE_CONTENTS              = 1 << 4;
        const IS_FIXED_CAPACITY            = 1 << 5;
        const IS_EXTERNAL_MUTABLE          = 1 << 6;
        const CAPACITY_PROVIDED_EXTERNALLY = 1 << 7;
        /// Interned, process-lifetime constant (spec §3 "constant pool").
        const CONSTANT                     = 1 << 8;
    }
}

/// The 2-bit storage sub-enum from spec §3 (external-mutable is not a
/// member of this enum: it is a set of flags layered on `HeapDefaultFree`,
/// since structurally it is just a mutable Unicode heap buffer whose
/// capacity bookkeeping defers to the client — see spec's data model
/// table, where `isExternalMutable` is its own boolean field, not part of
/// the representation sub-enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Inline,
    HeapDefaultFree,
    HeapNoFree,
    HeapCustomFree,
}

/// Collaborator for `HeapCustomFree` storage (spec §3 `contentsDeallocator`).
///
/// Unlike the original's raw-pointer custom-free (which could release a
/// foreign, non-Rust allocation), this crate's buffers are always
/// Rust-owned `Vec<u8>`s; the registered deallocator is invoked as a
/// post-free notification hook (e.g. to release a foreign allocation the
/// bytes were copied out of), not as the actual memory-freeing call, which
/// `Vec`'s own `Drop` already performs safely.
pub trait ContentsDeallocator: Send + Sync {
    fn deallocate(&self, freed_bytes: &[u8]);
}

pub struct CustomFreeBuffer {
    bytes: Vec<u8>,
    deallocator: Arc<dyn ContentsDeallocator>,
}

impl CustomFreeBuffer {
    pub fn new(bytes: Vec<u8>, deallocator: Arc<dyn ContentsDeallocator>) -> Self {
        CustomFreeBuffer { bytes, deallocator }
    }
}

impl Drop for CustomFreeBuffer {
    fn drop(&mut self) {
        self.deallocator.deallocate(&self.bytes);
    }
}

/// The bytes backing a string, independent of ownership/freeing policy
/// (spec §9: "represent as a variant... rather than pointer arithmetic
/// past the header").
pub enum Buffer {
    Inline { bytes: [u8; INLINE_CAPACITY], used: u8 },
    Owned(Vec<u8>),
    /// `HeapNoFree`: shared with the caller via `Arc`, so the object's own
    /// drop is just a refcount decrement rather than an unconditional free.
    Shared(Arc<[u8]>),
    CustomFreed(Arc<CustomFreeBuffer>),
}

impl Buffer {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Inline { bytes, used } => &bytes[..*used as usize],
            Buffer::Owned(v) => v.as_slice(),
            Buffer::Shared(a) => a,
            Buffer::CustomFreed(c) => &c.bytes,
        }
    }
}

/// The storage header and representation dispatcher (spec §3, §4.1).
pub struct StorageHeader {
    flags: HeaderFlags,
    representation: Representation,
    /// Character count, excluding any length byte or trailing NUL.
    length: usize,
    /// Bytes allocated (mutable storage only; meaningless otherwise).
    capacity: usize,
    /// Client-requested minimum, in characters (spec §3 `desiredCapacity`).
    desired_capacity: usize,
    contents_allocator: Option<Arc<dyn ContentsAllocator>>,
    buffer: Buffer,
}

impl StorageHeader {
    pub fn new_immutable(
        representation: Representation,
        bytes: Buffer,
        length: usize,
        unicode: bool,
        has_length_byte: bool,
        has_null_byte: bool,
    ) -> Self {
        let mut flags = HeaderFlags::empty();
        if unicode {
            flags |= HeaderFlags::UNICODE;
        }
        if has_length_byte {
            flags |= HeaderFlags::HAS_LENGTH_BYTE;
        }
        if has_null_byte {
            flags |= HeaderFlags::HAS_NULL_BYTE;
        }
        if matches!(representation, Representation::Inline) {
            flags |= HeaderFlags::INLINE_CONTENTS;
        }
        StorageHeader {
            flags,
            representation,
            length,
            capacity: 0,
            desired_capacity: 0,
            contents_allocator: None,
            buffer: bytes,
        }
    }

    pub fn new_mutable(
        bytes: Buffer,
        length: usize,
        capacity: usize,
        unicode: bool,
        fixed_capacity: bool,
        desired_capacity: usize,
        contents_allocator: Option<Arc<dyn ContentsAllocator>>,
    ) -> Self {
        let mut flags = HeaderFlags::MUTABLE;
        if unicode {
            flags |= HeaderFlags::UNICODE;
        }
        if fixed_capacity {
            flags |= HeaderFlags::IS_FIXED_CAPACITY;
        }
        StorageHeader {
            flags,
            representation: Representation::HeapDefaultFree,
            length,
            capacity,
            desired_capacity,
            contents_allocator,
            buffer: bytes,
        }
    }

    pub fn new_external_mutable(units: Vec<u16>, capacity_provided_externally: bool) -> Self {
        let length = units.len();
        let mut bytes = Vec::with_capacity(units.len() * 2);
        for u in &units {
            bytes.extend_from_slice(&u.to_ne_bytes());
        }
        let capacity = bytes.capacity();
        let mut flags = HeaderFlags::MUTABLE | HeaderFlags::UNICODE | HeaderFlags::IS_EXTERNAL_MUTABLE;
        if capacity_provided_externally {
            flags |= HeaderFlags::CAPACITY_PROVIDED_EXTERNALLY;
        }
        StorageHeader {
            flags,
            representation: Representation::HeapDefaultFree,
            length,
            capacity,
            desired_capacity: 0,
            contents_allocator: None,
            buffer: Buffer::Owned(bytes),
        }
    }

    // ---- accessors (spec §4.1): the only sanctioned way to read state ----

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_unicode(&self) -> bool {
        self.flags.contains(HeaderFlags::UNICODE)
    }

    pub fn is_mutable(&self) -> bool {
        self.flags.contains(HeaderFlags::MUTABLE)
    }

    pub fn is_fixed_capacity(&self) -> bool {
        self.flags.contains(HeaderFlags::IS_FIXED_CAPACITY)
    }

    pub fn is_external_mutable(&self) -> bool {
        self.flags.contains(HeaderFlags::IS_EXTERNAL_MUTABLE)
    }

    pub fn capacity_provided_externally(&self) -> bool {
        self.flags.contains(HeaderFlags::CAPACITY_PROVIDED_EXTERNALLY)
    }

    pub fn has_length_byte(&self) -> bool {
        self.flags.contains(HeaderFlags::HAS_LENGTH_BYTE)
    }

    pub fn has_null_byte(&self) -> bool {
        self.flags.contains(HeaderFlags::HAS_NULL_BYTE)
    }

    pub fn is_inline(&self) -> bool {
        self.flags.contains(HeaderFlags::INLINE_CONTENTS)
    }

    pub fn is_constant(&self) -> bool {
        self.flags.contains(HeaderFlags::CONSTANT)
    }

    pub fn mark_constant(&mut self) {
        self.flags |= HeaderFlags::CONSTANT;
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn desired_capacity(&self) -> usize {
        self.desired_capacity
    }

    pub fn contents_allocator(&self) -> Option<&Arc<dyn ContentsAllocator>> {
        self.contents_allocator.as_ref()
    }

    /// Raw backing bytes, including any length byte and trailing NUL, but
    /// *not* any unused allocated capacity: mutable storage routinely holds
    /// a `Buffer::Owned` sized ahead of its logical content by the growth
    /// policy, so this always recomputes the logical extent from `length`
    /// rather than trusting the backing `Vec`'s own length.
    pub fn contents(&self) -> &[u8] {
        let char_size = if self.is_unicode() { 2 } else { 1 };
        let prefix = if self.has_length_byte() { 1 } else { 0 };
        let suffix = if self.has_null_byte() { char_size } else { 0 };
        let logical_len = prefix + self.length * char_size + suffix;
        let all = self.buffer.as_slice();
        &all[..logical_len.min(all.len())]
    }

    /// Mutable access to the backing [`Buffer`] (resize engine only: every
    /// other module reaches storage bytes through the read-only accessors
    /// above).
    pub fn contents_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Raw backing bytes with a leading length byte skipped, if present
    /// (spec §4.1 `contents_skipping_length_byte`).
    pub fn contents_skipping_length_byte(&self) -> &[u8] {
        let all = self.contents();
        if self.has_length_byte() {
            &all[1.min(all.len())..]
        } else {
            all
        }
    }

    /// Character data only (no length byte, no trailing NUL): what callers
    /// should interpret as the string's actual contents.
    pub fn character_bytes(&self) -> &[u8] {
        let skip = if self.has_length_byte() { 1 } else { 0 };
        let all = self.contents();
        let null_width = if self.is_unicode() { 2 } else { 1 };
        let end = all.len() - if self.has_null_byte() { null_width } else { 0 };
        &all[skip.min(end)..end]
    }

    /// Reassembles the UTF-16 code units from the native-endian byte pairs
    /// this crate stores internally. Not zero-copy: unlike the original,
    /// which can hand back a raw `UniChar*` into the backing buffer, this
    /// crate keeps one byte representation for both 8-bit and Unicode
    /// storage (so the representation dispatcher doesn't need an enum
    /// branch per encoding width) and reassembles on demand.
    pub fn utf16_units(&self) -> Vec<u16> {
        debug_assert!(self.is_unicode());
        self.character_bytes()
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }

    /// Replaces the backing buffer wholesale (spec §4.1 `set_content_ptr`),
    /// used by the resize engine after reallocating.
    pub fn set_content_ptr(&mut self, buffer: Buffer, capacity: usize) {
        self.buffer = buffer;
        self.capacity = capacity;
    }

    /// Updates the recorded character length (spec §4.1
    /// `set_explicit_length`), syncing the redundant Pascal length byte
    /// when one is present and the new length still fits in a `u8`.
    pub fn set_explicit_length(&mut self, length: usize) {
        self.length = length;
        if self.has_length_byte() {
            if let Buffer::Owned(v) = &mut self.buffer {
                if length <= u8::MAX as usize && !v.is_empty() {
                    v[0] = length as u8;
                } else {
                    self.flags.remove(HeaderFlags::HAS_LENGTH_BYTE);
                }
            }
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn set_desired_capacity(&mut self, desired: usize) {
        self.desired_capacity = desired;
    }

    pub fn promote_to_unicode(&mut self) {
        self.flags |= HeaderFlags::UNICODE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_8bit_round_trip() {
        let mut bytes = [0u8; INLINE_CAPACITY];
        bytes[..5].copy_from_slice(b"hello");
        let hdr = StorageHeader::new_immutable(
            Representation::Inline,
            Buffer::Inline { bytes, used: 5 },
            5,
            false,
            false,
            false,
        );
        assert_eq!(hdr.length(), 5);
        assert!(!hdr.is_unicode());
        assert!(hdr.is_inline());
        assert_eq!(hdr.character_bytes(), b"hello");
    }

    #[test]
    fn pascal_length_byte_is_skipped() {
        let mut bytes = [0u8; INLINE_CAPACITY];
        bytes[0] = 3;
        bytes[1..4].copy_from_slice(b"abc");
        let hdr = StorageHeader::new_immutable(
            Representation::Inline,
            Buffer::Inline { bytes, used: 4 },
            3,
            false,
            true,
            false,
        );
        assert_eq!(hdr.contents_skipping_length_byte(), b"abc");
        assert_eq!(hdr.character_bytes(), b"abc");
    }

    #[test]
    fn mutable_flag_round_trips() {
        let hdr = StorageHeader::new_mutable(Buffer::Owned(Vec::new()), 0, 0, false, false, 0, None);
        assert!(hdr.is_mutable());
        assert!(!hdr.is_fixed_capacity());
    }

    #[test]
    fn external_mutable_is_always_unicode() {
        let hdr = StorageHeader::new_external_mutable(vec![0x41, 0x42], true);
        assert!(hdr.is_unicode());
        assert!(hdr.is_external_mutable());
        assert!(hdr.capacity_provided_externally());
        assert_eq!(hdr.length(), 2);
    }
}
