//! Normalize, case mapping, capitalize, pad, trim (SPEC_FULL.md §4.10).
//!
//! Every operation here rebuilds the whole string through
//! [`crate::resize::replace_range`] rather than rewriting bytes in place:
//! case mapping and composition can both change the character count (German
//! ß uppercases to "SS"; NFC can shrink a decomposed run to one character),
//! so there's no in-place variant that's actually correct in general.

use crate::compare::decode_scalar_at;
use crate::error::StringError;
use crate::locale::{Locale, SpecialCaseLanguage};
use crate::oracle::UnicodeOracle;
use crate::range::CharRange;
use crate::resize::replace_range;
use crate::storage::StorageHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeForm {
    D,
    C,
    Kd,
    Kc,
}

fn units_to_chars(units: &[u16]) -> Vec<char> {
    let mut out = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let (c, used) = decode_scalar_at(units, i);
        out.push(c);
        i += used.max(1);
    }
    out
}

fn chars_to_units(chars: &[char]) -> Vec<u16> {
    let mut out = Vec::with_capacity(chars.len());
    for &c in chars {
        let mut buf = [0u16; 2];
        out.extend_from_slice(c.encode_utf16(&mut buf));
    }
    out
}

fn needs_unicode(units: &[u16]) -> bool {
    units.iter().any(|&u| u >= 0x100)
}

fn replace_whole_string(header: &mut StorageHeader, new_units: Vec<u16>) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let whole = CharRange::new(0, header.length());
    replace_range(header, whole, &new_units, needs_unicode(&new_units))
}

fn decompose_to_chars(chars: &[char], oracle: &dyn UnicodeOracle) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    for &c in chars {
        match oracle.decompose_canonical(c) {
            Some(d) => {
                out.push(d.base);
                out.extend(d.marks);
            }
            None => out.push(c),
        }
    }
    out
}

/// Canonical ordering: stable-sorts each maximal run of non-starter
/// characters by combining class, same priority-sort primitive
/// `fold_cluster_at` uses.
fn canonical_order(chars: &mut [char], oracle: &dyn UnicodeOracle) {
    let mut i = 0;
    while i < chars.len() {
        if oracle.combining_class(chars[i]) == 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && oracle.combining_class(chars[i]) > 0 {
            i += 1;
        }
        chars[start..i].sort_by_key(|&c| oracle.combining_class(c));
    }
}

/// Recomposes maximal decomposable runs: a base character followed by
/// combining marks recomposes one mark at a time via the oracle's reverse
/// lookup, stopping at the first mark that doesn't combine (a "blocked"
/// sequence under the canonical combining class rule: a mark only combines
/// with the base if no intervening mark shares its combining class).
fn recompose(chars: &[char], oracle: &dyn UnicodeOracle) -> Vec<char> {
    let mut out: Vec<char> = Vec::with_capacity(chars.len());
    for &c in chars {
        if oracle.combining_class(c) > 0 {
            if let Some(last) = out.last().copied() {
                if let Some(composed) = oracle.compose_canonical(last, c) {
                    *out.last_mut().unwrap() = composed;
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// `normalize(form)` (SPEC_FULL.md §4.10): decompose, canonically reorder,
/// and (for the composed forms) recompose.
pub fn normalize(header: &mut StorageHeader, form: NormalizeForm, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let units = header.utf16_units();
    let mut chars = decompose_to_chars(&units_to_chars(&units), oracle);
    canonical_order(&mut chars, oracle);
    if matches!(form, NormalizeForm::C | NormalizeForm::Kc) {
        chars = recompose(&chars, oracle);
    }
    replace_whole_string(header, chars_to_units(&chars))
}

fn turkic_uppercase(c: char, turkic: bool) -> Option<Vec<char>> {
    if turkic && c == 'i' {
        Some(vec!['İ'])
    } else {
        None
    }
}

fn turkic_lowercase(c: char, turkic: bool) -> Option<Vec<char>> {
    if turkic && c == 'I' {
        Some(vec!['ı'])
    } else {
        None
    }
}

/// `uppercase` (SPEC_FULL.md §4.10): full-string locale-flagged case
/// mapping, not a byte-wise ASCII fold, sharing the same special-case
/// language detection as §4.5's folding primitive.
pub fn uppercase(header: &mut StorageHeader, locale: &Locale, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let turkic = matches!(locale.special_case_language(), SpecialCaseLanguage::Turkic);
    let units = header.utf16_units();
    let mut out = Vec::new();
    for c in units_to_chars(&units) {
        match turkic_uppercase(c, turkic) {
            Some(mapped) => out.extend(mapped),
            None => out.extend(oracle.to_uppercase(c)),
        }
    }
    replace_whole_string(header, chars_to_units(&out))
}

pub fn lowercase(header: &mut StorageHeader, locale: &Locale, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let turkic = matches!(locale.special_case_language(), SpecialCaseLanguage::Turkic);
    let units = header.utf16_units();
    let mut out = Vec::new();
    for c in units_to_chars(&units) {
        match turkic_lowercase(c, turkic) {
            Some(mapped) => out.extend(mapped),
            None => out.extend(oracle.to_lowercase(c)),
        }
    }
    replace_whole_string(header, chars_to_units(&out))
}

/// `capitalize` (SPEC_FULL.md §4.10): uppercases the first character of
/// each word. `title_case_every_word` lowercases the remainder of each word
/// too; otherwise only the leading character of each word is touched.
pub fn capitalize(
    header: &mut StorageHeader,
    locale: &Locale,
    oracle: &dyn UnicodeOracle,
    title_case_every_word: bool,
) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let turkic = matches!(locale.special_case_language(), SpecialCaseLanguage::Turkic);
    let units = header.utf16_units();
    let chars = units_to_chars(&units);
    let mut out = Vec::with_capacity(chars.len());
    let mut at_word_start = true;
    for c in chars {
        if !c.is_alphanumeric() {
            out.push(c);
            at_word_start = true;
            continue;
        }
        if at_word_start {
            match turkic_uppercase(c, turkic) {
                Some(mapped) => out.extend(mapped),
                None => out.extend(oracle.to_uppercase(c)),
            }
            at_word_start = false;
        } else if title_case_every_word {
            match turkic_lowercase(c, turkic) {
                Some(mapped) => out.extend(mapped),
                None => out.extend(oracle.to_lowercase(c)),
            }
        } else {
            out.push(c);
        }
    }
    replace_whole_string(header, chars_to_units(&out))
}

/// `pad(to_length, with_string, starting_at_index_in_pad_string)`
/// (SPEC_FULL.md §4.10): repeats `with` cyclically from `start_index`,
/// truncating or cycling to exactly `to_length` characters. A no-op
/// (truncate only) when `to_length` is already `<=` the current length.
pub fn pad(
    header: &mut StorageHeader,
    to_length: usize,
    with: &[u16],
    starting_at_index_in_pad_string: usize,
) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let units = header.utf16_units();
    if to_length <= units.len() {
        return replace_whole_string(header, units[..to_length].to_vec());
    }
    if with.is_empty() {
        return Err(StringError::NilArg("pad string"));
    }
    let mut out = units;
    let mut cursor = starting_at_index_in_pad_string % with.len();
    while out.len() < to_length {
        out.push(with[cursor]);
        cursor = (cursor + 1) % with.len();
    }
    replace_whole_string(header, out)
}

/// `trim(character_set)` (SPEC_FULL.md §4.10): removes a maximal prefix and
/// suffix whose characters are all members of `in_set`.
pub fn trim(header: &mut StorageHeader, in_set: &dyn Fn(char) -> bool) -> Result<(), StringError> {
    if !header.is_mutable() {
        return Err(StringError::NotMutable);
    }
    let units = header.utf16_units();
    let chars = units_to_chars(&units);
    let mut start = 0;
    while start < chars.len() && in_set(chars[start]) {
        start += 1;
    }
    let mut end = chars.len();
    while end > start && in_set(chars[end - 1]) {
        end -= 1;
    }
    replace_whole_string(header, chars_to_units(&chars[start..end]))
}

/// `trim_whitespace`: `trim` with the oracle's whitespace/newline bitmap.
pub fn trim_whitespace(header: &mut StorageHeader, oracle: &dyn UnicodeOracle) -> Result<(), StringError> {
    trim(header, &|c| oracle.is_whitespace_or_newline(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DefaultOracle;
    use crate::storage::StorageHeader;

    fn mutable(s: &str) -> StorageHeader {
        let units: Vec<u16> = s.encode_utf16().collect();
        StorageHeader::new_external_mutable(units, false)
    }

    fn text(header: &StorageHeader) -> String {
        String::from_utf16_lossy(&header.utf16_units())
    }

    #[test]
    fn normalize_d_decomposes_and_orders_marks() {
        let mut h = mutable("caf\u{00e9}");
        normalize(&mut h, NormalizeForm::D, &DefaultOracle).unwrap();
        assert_eq!(text(&h), "cafe\u{0301}");
    }

    #[test]
    fn normalize_c_round_trips_decomposed_input() {
        let mut h = mutable("cafe\u{0301}");
        normalize(&mut h, NormalizeForm::C, &DefaultOracle).unwrap();
        assert_eq!(text(&h), "caf\u{00e9}");
    }

    #[test]
    fn uppercase_grows_eszett_to_ss() {
        let mut h = mutable("stra\u{00df}e");
        uppercase(&mut h, &Locale::new("de_DE"), &DefaultOracle).unwrap();
        assert_eq!(text(&h), "STRASSE");
    }

    #[test]
    fn lowercase_plain_ascii() {
        let mut h = mutable("HELLO");
        lowercase(&mut h, &Locale::new("en_US"), &DefaultOracle).unwrap();
        assert_eq!(text(&h), "hello");
    }

    #[test]
    fn turkic_uppercase_dotless_i() {
        let mut h = mutable("iki");
        uppercase(&mut h, &Locale::new("tr_TR"), &DefaultOracle).unwrap();
        assert_eq!(text(&h), "İKİ");
    }

    #[test]
    fn capitalize_first_letter_of_each_word() {
        let mut h = mutable("hello there world");
        capitalize(&mut h, &Locale::new("en_US"), &DefaultOracle, false).unwrap();
        assert_eq!(text(&h), "Hello There World");
    }

    #[test]
    fn capitalize_title_case_lowercases_rest() {
        let mut h = mutable("HELLO THERE");
        capitalize(&mut h, &Locale::new("en_US"), &DefaultOracle, true).unwrap();
        assert_eq!(text(&h), "Hello There");
    }

    #[test]
    fn pad_cycles_pad_string_from_start_index() {
        let mut h = mutable("ab");
        let with: Vec<u16> = "xyz".encode_utf16().collect();
        pad(&mut h, 6, &with, 1).unwrap();
        // Pad string "xyz" starting at index 1 cycles: y, z, x, y.
        assert_eq!(text(&h), "abyzxy");
    }

    #[test]
    fn pad_to_shorter_length_truncates() {
        let mut h = mutable("abcdef");
        let with: Vec<u16> = "x".encode_utf16().collect();
        pad(&mut h, 3, &with, 0).unwrap();
        assert_eq!(text(&h), "abc");
    }

    #[test]
    fn trim_removes_matching_prefix_and_suffix() {
        let mut h = mutable("--hello--");
        trim(&mut h, &|c| c == '-').unwrap();
        assert_eq!(text(&h), "hello");
    }

    #[test]
    fn trim_whitespace_removes_surrounding_blanks() {
        let mut h = mutable("  hello world  ");
        trim_whitespace(&mut h, &DefaultOracle).unwrap();
        assert_eq!(text(&h), "hello world");
    }

    #[test]
    fn mutation_on_immutable_storage_errors() {
        use crate::storage::{Buffer, Representation, INLINE_CAPACITY};
        let mut bytes = [0u8; INLINE_CAPACITY];
        bytes[..3].copy_from_slice(b"abc");
        let mut h = StorageHeader::new_immutable(
            Representation::Inline,
            Buffer::Inline { bytes, used: 3 },
            3,
            false,
            false,
            false,
        );
        assert!(matches!(
            uppercase(&mut h, &Locale::current(), &DefaultOracle),
            Err(StringError::NotMutable)
        ));
    }
}
