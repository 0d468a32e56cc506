//! Public facade (spec §6): `CoreString`, a sum type over the two storage
//! variants construct.rs/resize.rs already model (`Arc<StorageHeader>` for
//! cheaply-shared immutable content, a bare owned `StorageHeader` for
//! exclusively-owned mutable content), wired up to every collaborator this
//! crate defines.

use crate::cluster::{self, ClusterType};
use crate::compare::{self, CompareOptions};
use crate::construct::{self, ConstructOptions};
use crate::encoding::{DefaultConverter, Encoding, EncodingConverter};
use crate::error::StringError;
use crate::format::{self, FormatArgument};
use crate::hash;
use crate::locale::{Collator, DefaultCollator, Locale};
use crate::oracle::{DefaultOracle, UnicodeOracle};
use crate::range::CharRange;
use crate::resize;
use crate::scan::{self, DoubleScan, IntegerScan};
use crate::storage::{Buffer, StorageHeader};
use crate::transform::{self, NormalizeForm};
use std::cmp::Ordering;
use std::sync::Arc;

/// A string value (spec §3's data model, spec §9's "model as a sum type over
/// storage variants behind an interface"). Immutable strings share storage
/// cheaply via `Arc`; mutable strings own theirs outright so `&mut self`
/// mutation never has to contend with another owner.
pub enum CoreString {
    Immutable(Arc<StorageHeader>),
    Mutable(StorageHeader),
}

impl CoreString {
    fn header(&self) -> &StorageHeader {
        match self {
            CoreString::Immutable(h) => h,
            CoreString::Mutable(h) => h,
        }
    }

    fn header_mut(&mut self) -> Result<&mut StorageHeader, StringError> {
        match self {
            CoreString::Mutable(h) => Ok(h),
            CoreString::Immutable(_) => Err(StringError::NotMutable),
        }
    }

    // ---- constructors (spec §6) ----

    /// Bytes in a caller-named encoding (spec §6 "bytes with encoding").
    pub fn with_bytes(bytes: &[u8], encoding: Encoding, opts: ConstructOptions) -> Result<Self, StringError> {
        construct::construct_immutable_or_empty(bytes, encoding, opts, true).map(CoreString::Immutable)
    }

    /// NUL-terminated ASCII bytes (spec §6 "from C string"): everything up
    /// to (not including) the first NUL byte.
    pub fn from_c_string(bytes: &[u8]) -> Result<Self, StringError> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Self::with_bytes(&bytes[..end], Encoding::Ascii, ConstructOptions::default())
    }

    /// A length-prefixed Pascal string: the first byte is the character
    /// count, followed by that many bytes of content (spec §6 "from Pascal
    /// string").
    pub fn from_pascal_string(bytes: &[u8]) -> Result<Self, StringError> {
        let len = *bytes.first().ok_or(StringError::NilArg("pascal string length byte"))? as usize;
        let content = bytes.get(1..1 + len).ok_or_else(|| StringError::bounds(0..len, bytes.len()))?;
        Self::with_bytes(content, Encoding::Ascii, ConstructOptions::default())
    }

    /// A UTF-16 character sequence (spec §6 "from characters"), routed
    /// through the UTF-8 constructor funnel since every UTF-16 sequence this
    /// crate accepts round-trips losslessly through `String::from_utf16`.
    pub fn with_characters(units: &[u16]) -> Result<Self, StringError> {
        let s = String::from_utf16(units).map_err(|_| StringError::DecodeFailure(Encoding::Utf16 { little_endian: true }))?;
        Self::with_bytes(s.as_bytes(), Encoding::Utf8, ConstructOptions::default())
    }

    /// A substring over `range` (spec §6 "substring").
    pub fn substring(&self, range: CharRange) -> Result<Self, StringError> {
        let units = self.utf16_units();
        if range.end() > units.len() {
            return Err(StringError::bounds(range.location..range.end(), units.len()));
        }
        Self::with_characters(&units[range.location..range.end()])
    }

    /// An independent copy: immutable storage is shared (cheap `Arc` clone),
    /// mutable storage is deep-copied since the original keeps exclusive
    /// ownership of its buffer.
    pub fn copy(&self) -> Self {
        match self {
            CoreString::Immutable(h) => CoreString::Immutable(h.clone()),
            CoreString::Mutable(_) => Self::mutable_copy(self),
        }
    }

    /// A fresh mutable string with room for at least `capacity` characters
    /// (spec §6 "mutable empty"). Plain heap-backed mutable storage, not
    /// external-mutable: the buffer is owned and grown by this crate, not
    /// borrowed from the caller.
    pub fn mutable_empty(capacity: usize) -> Self {
        let bytes = Vec::with_capacity(capacity * 2);
        let byte_capacity = bytes.capacity();
        CoreString::Mutable(StorageHeader::new_mutable(Buffer::Owned(bytes), 0, byte_capacity, true, false, capacity, None))
    }

    /// A mutable copy of `self`'s current content (spec §6 "mutable copy").
    /// Plain heap-backed mutable storage, not external-mutable.
    pub fn mutable_copy(&self) -> Self {
        let units = self.utf16_units();
        let length = units.len();
        let mut bytes = Vec::with_capacity(length * 2);
        for u in &units {
            bytes.extend_from_slice(&u.to_ne_bytes());
        }
        let byte_capacity = bytes.capacity();
        CoreString::Mutable(StorageHeader::new_mutable(Buffer::Owned(bytes), length, byte_capacity, true, false, 0, None))
    }

    /// Wraps caller-owned UTF-16 units as mutable storage without copying
    /// them into a second owned representation beyond the one `Vec` already
    /// is (spec §6 "external-mutable-no-copy").
    pub fn external_mutable_no_copy(units: Vec<u16>) -> Self {
        CoreString::Mutable(StorageHeader::new_external_mutable(units, false))
    }

    /// Renders `template` against `args` and wraps the result (spec §6
    /// "with-format").
    pub fn with_format(template: &[u16], args: &[FormatArgument], locale: Option<&Locale>) -> Result<Self, StringError> {
        let (units, _) = format::format_with_args(template, args, locale, false)?;
        Self::with_characters(&units)
    }

    /// As [`with_format`](Self::with_format), but first validates `template`
    /// against `expected` (spec §6 "with-validated-format").
    pub fn with_validated_format(
        expected: &[u16],
        template: &[u16],
        args: &[FormatArgument],
        locale: Option<&Locale>,
    ) -> Result<Self, StringError> {
        format::validate_format(expected, template)?;
        Self::with_format(template, args, locale)
    }

    pub fn create_from_external_representation(bytes: &[u8], encoding: Encoding) -> Result<Self, StringError> {
        Self::with_bytes(bytes, encoding, ConstructOptions::default())
    }

    /// Joins `pieces` with `separator` between each (spec §6
    /// "create-by-combining").
    pub fn create_by_combining(pieces: &[&CoreString], separator: &[u16]) -> Result<Self, StringError> {
        let mut out: Vec<u16> = Vec::new();
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(separator);
            }
            out.extend(piece.utf16_units());
        }
        Self::with_characters(&out)
    }

    // ---- accessors (spec §6) ----

    pub fn length(&self) -> usize {
        self.header().length()
    }

    pub fn is_unicode(&self) -> bool {
        self.header().is_unicode()
    }

    pub fn is_mutable(&self) -> bool {
        self.header().is_mutable()
    }

    /// Representation-independent UTF-16 view (8-bit storage widens
    /// through the identity `byte as u16` map).
    pub fn utf16_units(&self) -> Vec<u16> {
        let h = self.header();
        if h.is_unicode() {
            h.utf16_units()
        } else {
            h.character_bytes().iter().map(|&b| b as u16).collect()
        }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.utf16_units())
    }

    pub fn char_at(&self, index: usize) -> Option<u16> {
        self.utf16_units().get(index).copied()
    }

    pub fn characters_in_range(&self, range: CharRange) -> Result<Vec<u16>, StringError> {
        let units = self.utf16_units();
        if range.end() > units.len() {
            return Err(StringError::bounds(range.location..range.end(), units.len()));
        }
        Ok(units[range.location..range.end()].to_vec())
    }

    pub fn hash(&self) -> u64 {
        hash::hash_units(&self.utf16_units())
    }

    pub fn copy_to_c_string(&self) -> Result<Vec<u8>, StringError> {
        DefaultConverter.encode_from_utf16(&self.utf16_units(), Encoding::Ascii)
    }

    pub fn copy_to_pascal_string(&self) -> Result<Vec<u8>, StringError> {
        let mut bytes = self.copy_to_c_string()?;
        if bytes.len() > u8::MAX as usize {
            return Err(StringError::Overflow);
        }
        bytes.insert(0, bytes.len() as u8);
        Ok(bytes)
    }

    pub fn create_external_representation(&self, encoding: Encoding) -> Result<Vec<u8>, StringError> {
        DefaultConverter.encode_from_utf16(&self.utf16_units(), encoding)
    }

    // ---- mutations (spec §6) ----

    pub fn append(&mut self, units: &[u16]) -> Result<(), StringError> {
        let len = self.header().length();
        self.insert(len, units)
    }

    pub fn insert(&mut self, at: usize, units: &[u16]) -> Result<(), StringError> {
        let needs_unicode = units.iter().any(|&u| u >= 0x100);
        let header = self.header_mut()?;
        resize::replace_range(header, CharRange::new(at, 0), units, needs_unicode)
    }

    pub fn delete(&mut self, range: CharRange) -> Result<(), StringError> {
        let header = self.header_mut()?;
        resize::replace_range(header, range, &[], false)
    }

    pub fn replace(&mut self, range: CharRange, units: &[u16]) -> Result<(), StringError> {
        let needs_unicode = units.iter().any(|&u| u >= 0x100);
        let header = self.header_mut()?;
        resize::replace_range(header, range, units, needs_unicode)
    }

    pub fn replace_all(&mut self, units: &[u16]) -> Result<(), StringError> {
        let whole = CharRange::new(0, self.header().length());
        self.replace(whole, units)
    }

    /// Replaces every non-overlapping match of `target` with `replacement`,
    /// scanning left to right, and returns how many replacements were made
    /// (spec §6 "find-and-replace").
    pub fn find_and_replace(
        &mut self,
        target: &[u16],
        replacement: &[u16],
        options: CompareOptions,
        locale: Option<&Locale>,
        oracle: &dyn UnicodeOracle,
    ) -> Result<usize, StringError> {
        let lang = locale.map(Locale::special_case_language).unwrap_or(crate::locale::SpecialCaseLanguage::None);
        let mut count = 0usize;
        let mut cursor = 0usize;
        loop {
            let units = self.utf16_units();
            if cursor > units.len() {
                break;
            }
            let search_range = CharRange::new(cursor, units.len() - cursor);
            let Some(found) = crate::search::find_with_options(&units, search_range, target, options, lang, oracle) else {
                break;
            };
            self.replace(found, replacement)?;
            count += 1;
            cursor = found.location + replacement.len();
        }
        Ok(count)
    }

    pub fn pad(&mut self, to_length: usize, with: &[u16], starting_at_index_in_pad_string: usize) -> Result<(), StringError> {
        transform::pad(self.header_mut()?, to_length, with, starting_at_index_in_pad_string)
    }

    pub fn trim(&mut self, in_set: &dyn Fn(char) -> bool) -> Result<(), StringError> {
        transform::trim(self.header_mut()?, in_set)
    }

    pub fn trim_whitespace(&mut self, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
        transform::trim_whitespace(self.header_mut()?, oracle)
    }

    pub fn lowercase(&mut self, locale: &Locale, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
        transform::lowercase(self.header_mut()?, locale, oracle)
    }

    pub fn uppercase(&mut self, locale: &Locale, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
        transform::uppercase(self.header_mut()?, locale, oracle)
    }

    pub fn capitalize(&mut self, locale: &Locale, oracle: &dyn UnicodeOracle, title_case_every_word: bool) -> Result<(), StringError> {
        transform::capitalize(self.header_mut()?, locale, oracle, title_case_every_word)
    }

    pub fn normalize(&mut self, form: NormalizeForm, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
        transform::normalize(self.header_mut()?, form, oracle)
    }

    /// Folds the whole string per `options`/`locale` without mutating it
    /// (spec §6 "fold"), returning the folded character sequence.
    pub fn fold(&self, options: CompareOptions, locale: Option<&Locale>, oracle: &dyn UnicodeOracle) -> Vec<char> {
        let units = self.utf16_units();
        let lang = locale.map(Locale::special_case_language).unwrap_or(crate::locale::SpecialCaseLanguage::None);
        let mut out = Vec::new();
        let mut i = 0;
        while i < units.len() {
            let f = compare::fold_cluster_at(&units, i, options, lang, oracle);
            out.extend(f.chars);
            i += f.consumed.max(1);
        }
        out
    }

    /// Replaces this mutable string's entire backing buffer with
    /// caller-supplied characters (spec §6 "set-external-characters-no-copy").
    /// Rust ownership means this still copies the characters into the
    /// header's own buffer rather than aliasing the caller's allocation.
    pub fn set_external_characters_no_copy(&mut self, units: Vec<u16>) -> Result<(), StringError> {
        let needs_unicode = units.iter().any(|&u| u >= 0x100);
        let header = self.header_mut()?;
        let whole = CharRange::new(0, header.length());
        resize::replace_range(header, whole, &units, needs_unicode)
    }

    pub fn append_c_string(&mut self, bytes: &[u8]) -> Result<(), StringError> {
        let units: Vec<u16> = bytes.iter().map(|&b| b as u16).collect();
        self.append(&units)
    }

    pub fn append_format(&mut self, template: &[u16], args: &[FormatArgument], locale: Option<&Locale>) -> Result<(), StringError> {
        let (units, _) = format::format_with_args(template, args, locale, false)?;
        self.append(&units)
    }

    // ---- queries (spec §6) ----

    pub fn compare_with_options_and_locale(
        &self,
        other: &CoreString,
        options: CompareOptions,
        locale: Option<&Locale>,
        oracle: &dyn UnicodeOracle,
        collator: &dyn Collator,
    ) -> Ordering {
        compare::compare_with_options(&self.utf16_units(), &other.utf16_units(), options, locale, oracle, collator)
    }

    pub fn is_equal(&self, other: &CoreString) -> bool {
        self.utf16_units() == other.utf16_units()
    }

    pub fn find_with_options_and_locale(
        &self,
        needle: &[u16],
        range: CharRange,
        options: CompareOptions,
        locale: Option<&Locale>,
        oracle: &dyn UnicodeOracle,
    ) -> Option<CharRange> {
        let lang = locale.map(Locale::special_case_language).unwrap_or(crate::locale::SpecialCaseLanguage::None);
        crate::search::find_with_options(&self.utf16_units(), range, needle, options, lang, oracle)
    }

    /// Scans `range` for the first character `in_set` accepts (spec §6
    /// "find-character-from-set").
    pub fn find_character_from_set(&self, range: CharRange, in_set: &dyn Fn(char) -> bool) -> Option<usize> {
        let units = self.utf16_units();
        let end = range.end().min(units.len());
        let mut i = range.location.min(end);
        while i < end {
            let (c, used) = compare::decode_scalar_at(&units, i);
            if in_set(c) {
                return Some(i);
            }
            i += used.max(1);
        }
        None
    }

    pub fn has_prefix(&self, prefix: &[u16]) -> bool {
        let units = self.utf16_units();
        units.len() >= prefix.len() && &units[..prefix.len()] == prefix
    }

    pub fn has_suffix(&self, suffix: &[u16]) -> bool {
        let units = self.utf16_units();
        units.len() >= suffix.len() && &units[units.len() - suffix.len()..] == suffix
    }

    pub fn range_of_composed_characters_at(&self, idx: usize, oracle: &dyn UnicodeOracle) -> CharRange {
        cluster::range_of_character_cluster_at(&self.utf16_units(), idx, ClusterType::Composed, oracle)
    }

    pub fn range_of_character_cluster_at(&self, idx: usize, cluster_type: ClusterType, oracle: &dyn UnicodeOracle) -> CharRange {
        cluster::range_of_character_cluster_at(&self.utf16_units(), idx, cluster_type, oracle)
    }

    pub fn scan_integer(&self, start: usize) -> Option<IntegerScan> {
        scan::scan_integer(&self.utf16_units(), start)
    }

    pub fn scan_double(&self, start: usize) -> Option<DoubleScan> {
        scan::scan_double(&self.utf16_units(), start)
    }

    /// The line containing character `idx`, and that line's range including
    /// its terminator (spec §6 "get-line-bounds"). `\r\n` counts as one
    /// terminator.
    pub fn get_line_bounds(&self, idx: usize) -> (CharRange, CharRange) {
        let units = self.utf16_units();
        line_bounds_in(&units, idx)
    }

    /// This crate has no paragraph separator distinct from a line
    /// terminator, so paragraph bounds are the same computation as line
    /// bounds (spec §6 "get-paragraph-bounds").
    pub fn get_paragraph_bounds(&self, idx: usize) -> (CharRange, CharRange) {
        self.get_line_bounds(idx)
    }

    /// Splits on every non-overlapping occurrence of `separator` (spec §6
    /// "create-array-by-separating").
    pub fn create_array_by_separating(&self, separator: &[u16]) -> Result<Vec<CoreString>, StringError> {
        let units = self.utf16_units();
        if separator.is_empty() {
            return Ok(vec![Self::with_characters(&units)?]);
        }
        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;
        while i + separator.len() <= units.len() {
            if units[i..i + separator.len()] == *separator {
                pieces.push(Self::with_characters(&units[start..i])?);
                i += separator.len();
                start = i;
            } else {
                i += 1;
            }
        }
        pieces.push(Self::with_characters(&units[start..])?);
        Ok(pieces)
    }
}

fn is_line_terminator(units: &[u16], idx: usize) -> Option<usize> {
    match units.get(idx).copied() {
        Some(0x0D) if units.get(idx + 1).copied() == Some(0x0A) => Some(2),
        Some(0x0D) | Some(0x0A) | Some(0x0B) | Some(0x0C) | Some(0x85) | Some(0x2028) | Some(0x2029) => Some(1),
        _ => None,
    }
}

fn line_bounds_in(units: &[u16], idx: usize) -> (CharRange, CharRange) {
    let mut start = idx.min(units.len());
    while start > 0 && is_line_terminator(units, start - 1).is_none() {
        start -= 1;
    }
    let mut content_end = start;
    while content_end < units.len() && is_line_terminator(units, content_end).is_none() {
        content_end += 1;
    }
    let term_len = is_line_terminator(units, content_end).unwrap_or(0);
    let full_end = content_end + term_len;
    (CharRange::new(start, content_end - start), CharRange::new(start, full_end - start))
}

impl Default for CoreString {
    fn default() -> Self {
        CoreString::Immutable(construct::empty_singleton())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> CoreString {
        CoreString::with_bytes(text.as_bytes(), Encoding::Utf8, ConstructOptions::default()).unwrap()
    }

    #[test]
    fn construct_and_read_back_ascii() {
        let v = s("hello");
        assert_eq!(v.to_string_lossy(), "hello");
        assert!(!v.is_unicode());
        assert!(!v.is_mutable());
    }

    #[test]
    fn mutable_copy_then_append() {
        let mut v = s("hello").mutable_copy();
        assert!(v.is_mutable());
        assert!(!v.header().is_external_mutable());
        v.append(&"world".encode_utf16().collect::<Vec<_>>()).unwrap();
        assert_eq!(v.to_string_lossy(), "helloworld");
    }

    #[test]
    fn mutable_empty_and_external_mutable_no_copy_are_not_the_same_representation() {
        let plain = CoreString::mutable_empty(4);
        assert!(!plain.header().is_external_mutable());

        let external = CoreString::external_mutable_no_copy(vec![b'h' as u16, b'i' as u16]);
        assert!(external.header().is_external_mutable());
    }

    #[test]
    fn mutating_an_immutable_string_errors() {
        let mut v = s("hello");
        assert!(matches!(v.append(&[b'!' as u16]), Err(StringError::NotMutable)));
    }

    #[test]
    fn insert_and_delete_round_trip() {
        let mut v = CoreString::mutable_empty(8);
        v.append(&"ace".encode_utf16().collect::<Vec<_>>()).unwrap();
        v.insert(1, &[b'b' as u16]).unwrap();
        assert_eq!(v.to_string_lossy(), "abce");
        v.delete(CharRange::new(1, 1)).unwrap();
        assert_eq!(v.to_string_lossy(), "ace");
    }

    #[test]
    fn find_and_replace_counts_matches() {
        let mut v = s("one two one two").mutable_copy();
        let count = v
            .find_and_replace(
                &"one".encode_utf16().collect::<Vec<_>>(),
                &"1".encode_utf16().collect::<Vec<_>>(),
                CompareOptions::empty(),
                None,
                &DefaultOracle,
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(v.to_string_lossy(), "1 two 1 two");
    }

    #[test]
    fn has_prefix_and_suffix() {
        let v = s("hello world");
        assert!(v.has_prefix(&"hello".encode_utf16().collect::<Vec<_>>()));
        assert!(v.has_suffix(&"world".encode_utf16().collect::<Vec<_>>()));
        assert!(!v.has_prefix(&"world".encode_utf16().collect::<Vec<_>>()));
    }

    #[test]
    fn compare_case_insensitive() {
        let a = s("HELLO");
        let b = s("hello");
        let ord = a.compare_with_options_and_locale(&b, CompareOptions::CASE_INSENSITIVE, None, &DefaultOracle, &DefaultCollator);
        assert_eq!(ord, Ordering::Equal);
    }

    #[test]
    fn hash_matches_module_level_hash_units() {
        let v = s("hello");
        assert_eq!(v.hash(), hash::hash_units(&"hello".encode_utf16().collect::<Vec<_>>()));
    }

    #[test]
    fn with_format_builds_a_string() {
        let t: Vec<u16> = "%d apples".encode_utf16().collect();
        let args = [FormatArgument::Int(3)];
        let v = CoreString::with_format(&t, &args, None).unwrap();
        assert_eq!(v.to_string_lossy(), "3 apples");
    }

    #[test]
    fn create_array_by_separating_splits_on_separator() {
        let v = s("a,b,,c");
        let parts = v.create_array_by_separating(&[b',' as u16]).unwrap();
        let texts: Vec<String> = parts.iter().map(|p| p.to_string_lossy()).collect();
        assert_eq!(texts, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn create_by_combining_joins_with_separator() {
        let a = s("a");
        let b = s("b");
        let c = s("c");
        let joined = CoreString::create_by_combining(&[&a, &b, &c], &[b'-' as u16]).unwrap();
        assert_eq!(joined.to_string_lossy(), "a-b-c");
    }

    #[test]
    fn line_bounds_find_current_line_including_terminator() {
        let v = s("first\nsecond\nthird");
        let (content, full) = v.get_line_bounds(7); // inside "second"
        assert_eq!(content, CharRange::new(6, 6)); // "second"
        assert_eq!(full, CharRange::new(6, 7)); // "second\n"
    }

    #[test]
    fn range_of_character_cluster_delegates_to_cluster_module() {
        let v = s("e\u{0301}x");
        let r = v.range_of_character_cluster_at(0, ClusterType::Grapheme, &DefaultOracle);
        assert_eq!(r, CharRange::new(0, 2));
    }

    #[test]
    fn scan_integer_reads_leading_digits() {
        let v = s("42 is the answer");
        let r = v.scan_integer(0).unwrap();
        assert_eq!(r.value, 42);
    }

    #[test]
    fn default_is_the_empty_singleton() {
        let v = CoreString::default();
        assert_eq!(v.length(), 0);
        assert!(!v.is_mutable());
    }
}
