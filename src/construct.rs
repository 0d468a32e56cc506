//! Immutable constructor funnel (spec §4.3) and the constant-string
//! interning table (spec §3, §5).

use crate::encoding::{DefaultConverter, Encoding, EncodingConverter};
use crate::error::StringError;
use crate::storage::{Buffer, Representation, StorageHeader, INLINE_CAPACITY};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Options accepted by the single immutable-constructor funnel (spec §4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructOptions {
    pub try_reduce_unicode: bool,
    pub has_length_byte: bool,
    pub has_null_byte: bool,
}

/// Entry point spec §4.3 step 1 describes: short-circuits to the retained
/// empty singleton for zero-length input on the default allocator, then
/// falls through to [`construct_immutable`] for everything else.
pub fn construct_immutable_or_empty(
    bytes: &[u8],
    encoding: Encoding,
    opts: ConstructOptions,
    use_default_allocator: bool,
) -> Result<Arc<StorageHeader>, StringError> {
    if bytes.is_empty() && use_default_allocator {
        return Ok(empty_singleton());
    }
    construct_immutable(bytes, encoding, opts).map(Arc::new)
}

/// Builds an immutable [`StorageHeader`] from raw bytes in a caller-named
/// encoding, per spec §4.3's five numbered steps.
pub fn construct_immutable(
    bytes: &[u8],
    encoding: Encoding,
    opts: ConstructOptions,
) -> Result<StorageHeader, StringError> {
    // Step 1 is handled by `construct_immutable_or_empty`, which is what
    // public constructors should call; this function always builds a fresh
    // header, which callers with a zero-length default-allocator fast path
    // skip by going through the empty singleton instead.

    // Step 2: 8-bit storage is usable when the encoding already matches the
    // system 8-bit encoding, or when it's an ASCII superset and every byte
    // happens to be ASCII.
    if matches!(encoding, Encoding::Ascii | Encoding::Latin1) {
        return build_eight_bit(bytes, opts);
    }
    if encoding.is_superset_of_ascii() && bytes.iter().all(|&b| b < 0x80) {
        return build_eight_bit(bytes, opts);
    }

    // Step 3: decode to UTF-16 for anything else.
    let converter = DefaultConverter;
    let units = converter.decode_to_utf16(bytes, encoding)?;

    // Step 4: try_reduce_unicode demotion.
    if opts.try_reduce_unicode && units.iter().all(|&u| u < 0x80) {
        let ascii_bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
        return build_eight_bit(&ascii_bytes, opts);
    }

    // Step 5: build Unicode storage.
    build_unicode(&units, opts)
}

fn build_eight_bit(chars: &[u8], opts: ConstructOptions) -> Result<StorageHeader, StringError> {
    let has_length_byte = opts.has_length_byte && chars.len() <= u8::MAX as usize;
    let has_null_byte = opts.has_null_byte;
    let mut payload = Vec::with_capacity(chars.len() + 2);
    if has_length_byte {
        payload.push(chars.len() as u8);
    }
    payload.extend_from_slice(chars);
    if has_null_byte {
        payload.push(0);
    }

    if payload.len() <= INLINE_CAPACITY {
        let mut inline = [0u8; INLINE_CAPACITY];
        inline[..payload.len()].copy_from_slice(&payload);
        Ok(StorageHeader::new_immutable(
            Representation::Inline,
            Buffer::Inline { bytes: inline, used: payload.len() as u8 },
            chars.len(),
            false,
            has_length_byte,
            has_null_byte,
        ))
    } else {
        Ok(StorageHeader::new_immutable(
            Representation::HeapDefaultFree,
            Buffer::Owned(payload),
            chars.len(),
            false,
            has_length_byte,
            has_null_byte,
        ))
    }
}

fn build_unicode(units: &[u16], opts: ConstructOptions) -> Result<StorageHeader, StringError> {
    let mut payload = Vec::with_capacity(units.len() * 2 + 2);
    for u in units {
        payload.extend_from_slice(&u.to_ne_bytes());
    }
    let has_null_byte = opts.has_null_byte;
    if has_null_byte {
        payload.extend_from_slice(&0u16.to_ne_bytes());
    }

    if payload.len() <= INLINE_CAPACITY {
        let mut inline = [0u8; INLINE_CAPACITY];
        inline[..payload.len()].copy_from_slice(&payload);
        Ok(StorageHeader::new_immutable(
            Representation::Inline,
            Buffer::Inline { bytes: inline, used: payload.len() as u8 },
            units.len(),
            true,
            false,
            has_null_byte,
        ))
    } else {
        Ok(StorageHeader::new_immutable(
            Representation::HeapDefaultFree,
            Buffer::Owned(payload),
            units.len(),
            true,
            false,
            has_null_byte,
        ))
    }
}

/// Builds a no-copy immutable string over caller-owned bytes (spec §4.3's
/// `no_copy`/`contents_deallocator` path), sharing ownership via `Arc`
/// rather than taking a raw pointer (spec §9 guidance to avoid porting
/// pointer arithmetic verbatim).
pub fn construct_no_copy(
    bytes: Arc<[u8]>,
    length: usize,
    unicode: bool,
    has_null_byte: bool,
) -> StorageHeader {
    StorageHeader::new_immutable(
        Representation::HeapNoFree,
        Buffer::Shared(bytes),
        length,
        unicode,
        false,
        has_null_byte,
    )
}

// ---- empty singleton + constant pool (spec §3, §5) ----

static EMPTY_SINGLETON: Lazy<Arc<StorageHeader>> = Lazy::new(|| {
    let mut hdr = build_eight_bit(&[], ConstructOptions::default()).expect("empty string always constructs");
    hdr.mark_constant();
    Arc::new(hdr)
});

pub fn empty_singleton() -> Arc<StorageHeader> {
    EMPTY_SINGLETON.clone()
}

/// The process-wide C-string interning table (spec §3, §5): a single lock
/// guarding a `HashMap`, with "winner insertion" semantics — once a key
/// exists, later callers get the first-inserted object and their own
/// redundant candidate (if any) is simply dropped.
static CONSTANT_POOL: Lazy<Mutex<HashMap<&'static str, Arc<StorageHeader>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Interns a C-string literal, returning the process-lifetime shared
/// object. `build` is only invoked when `key` has not been seen before;
/// if two threads race, the loser's freshly built object is dropped and
/// both observe the winner's (spec §5: "the loser releases its redundant
/// object").
pub fn intern(key: &'static str, build: impl FnOnce() -> StorageHeader) -> Arc<StorageHeader> {
    let mut pool = CONSTANT_POOL.lock().unwrap();
    pool.entry(key)
        .or_insert_with(|| {
            let mut hdr = build();
            hdr.mark_constant();
            Arc::new(hdr)
        })
        .clone()
}
