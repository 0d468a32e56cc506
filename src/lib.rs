// -*- mode: rust; bidi-display-reordering: nil -*-

/*! # corestring - an allocator-aware, encoding-sensitive Unicode string engine.

This crate models a string type the way a systems string library actually
has to: as a small header describing *how* the character data is stored
(inline, on the heap, borrowed, externally-owned) plus the character data
itself, with every higher-level operation — comparison, search, grapheme
segmentation, case mapping, normalization, `printf`-style formatting —
built on top of that header rather than assuming a single `String`-shaped
representation.

## Layout

- [`storage`] — the header and its four representations (inline, two heap
  ownership modes, and a custom-deallocator hook), plus the byte-level
  accessors every other module reads through.
- [`construct`] — the immutable-string constructor funnel (bytes in a named
  encoding -> storage), the empty singleton, and the C-string constant pool.
- [`resize`] — the mutable-string resize engine every mutation (`insert`,
  `delete`, `replace`, ...) funnels through.
- [`compare`] / [`search`] — option-driven comparison and substring search,
  folding case/diacritics/width as requested.
- [`cluster`] — grapheme and composed-character segmentation, including the
  Hangul and extended-pictographic (emoji ZWJ sequence) special cases.
- [`hash`] — the representation-independent windowed hash.
- [`scan`] — leading-integer/leading-double scanning.
- [`format`] — the `printf`-style template engine, in both rendering and
  validation modes.
- [`transform`] — normalization (NFD/NFC/NFKD/NFKC), case mapping,
  capitalization, padding, and trimming.
- [`string`] — [`string::CoreString`], the public facade tying all of the
  above together into one type.
- [`encoding`], [`locale`], [`oracle`], [`object`], [`alloc`], [`bundle`],
  [`locking`] — the collaborator traits (and their default implementations)
  that the modules above depend on, each swappable by a caller who has a
  richer backing store (ICU, a foreign object runtime, a custom allocator).
- [`error`] — the `StringError` taxonomy shared by the whole crate.

## Usage Summary

```
use corestring::string::CoreString;
use corestring::encoding::Encoding;
use corestring::construct::ConstructOptions;

let s = CoreString::with_bytes(b"hello", Encoding::Utf8, ConstructOptions::default()).unwrap();
assert_eq!(s.length(), 5);
```
*/

pub mod error;
pub mod object;
pub mod alloc;
pub mod encoding;
pub mod oracle;
pub mod locale;
pub mod locking;
pub mod bundle;
pub mod storage;
pub mod construct;
pub mod range;
pub mod resize;
pub mod compare;
pub mod search;
pub mod cluster;
pub mod hash;
pub mod scan;
pub mod format;
pub mod transform;
pub mod string;

pub use error::StringError;
pub use range::CharRange;
pub use string::CoreString;
