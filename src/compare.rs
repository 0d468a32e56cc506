//! Comparison, search & folding core (spec §4.5).
//!
//! Everything here operates on UTF-16 code-unit slices so it is usable
//! unchanged from both 8-bit and Unicode storage (callers on the 8-bit side
//! widen first); this mirrors the representation-independence spec §4.5
//! and §4.7 both ask for.

use crate::locale::{Collator, Locale, SpecialCaseLanguage};
use crate::oracle::UnicodeOracle;
use bitflags::bitflags;
use std::cmp::Ordering;
use std::collections::VecDeque;

bitflags! {
    /// Option flags shared by comparison and search (spec §4.5's
    /// `compare_with_options` / `find_with_options`, which differ only in
    /// the anchoring bits `find` adds).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompareOptions: u32 {
        const CASE_INSENSITIVE          = 1 << 0;
        const DIACRITIC_INSENSITIVE     = 1 << 1;
        const WIDTH_INSENSITIVE         = 1 << 2;
        const NONLITERAL                = 1 << 3;
        const NUMERICALLY               = 1 << 4;
        const FORCE_ORDERING            = 1 << 5;
        const IGNORE_NON_ALPHANUMERIC   = 1 << 6;
        /// Search-only: match must start at the search range's start.
        const ANCHORED                  = 1 << 7;
        /// Search-only: scan from the end of the range backwards.
        const BACKWARDS                 = 1 << 8;
    }
}

/// A 128-entry ASCII case-fold table (spec §4.5: "`A`-`Z` map to `a`-`z`,
/// everything else to itself"; deliberately does not special-case NUL so it
/// never stops short on an embedded zero byte, per spec.md §9's resolved
/// Open Question).
const fn build_ascii_case_fold_table() -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = if i >= b'A' as usize && i <= b'Z' as usize { (i as u8) + 32 } else { i as u8 };
        i += 1;
    }
    table
}
pub const ASCII_CASE_FOLD: [u8; 128] = build_ascii_case_fold_table();

fn ascii_fold_unit(u: u16) -> u16 {
    if u < 128 { ASCII_CASE_FOLD[u as usize] as u16 } else { u }
}

/// Decodes one scalar value starting at `idx`, pairing surrogates.
/// Lone/invalid surrogates decode to U+FFFD and consume one unit, matching
/// `char::decode_utf16`'s own substitution behavior.
pub fn decode_scalar_at(units: &[u16], idx: usize) -> (char, usize) {
    if idx >= units.len() {
        return ('\u{0}', 0);
    }
    let u = units[idx];
    if (0xD800..=0xDBFF).contains(&u) {
        if let Some(&u2) = units.get(idx + 1) {
            if (0xDC00..=0xDFFF).contains(&u2) {
                let c = 0x10000u32 + (((u as u32) - 0xD800) << 10) + ((u2 as u32) - 0xDC00);
                return (char::from_u32(c).unwrap_or('\u{FFFD}'), 2);
            }
        }
        return ('\u{FFFD}', 1);
    }
    (char::from_u32(u as u32).unwrap_or('\u{FFFD}'), 1)
}

/// Maximum folded characters `fold_cluster_at` will emit for one cluster
/// before reporting `insufficient_buffer` (spec §4.5).
pub const FOLD_BUFFER_CAP: usize = 16;

pub struct FoldResult {
    pub chars: Vec<char>,
    /// UTF-16 units consumed from the source, including any trailing
    /// combining marks folded into this cluster.
    pub consumed: usize,
    pub insufficient_buffer: bool,
}

/// `fold_cluster_at` (spec §4.5): reads one starting scalar plus any
/// combining marks that follow it, applies the option-driven
/// transformations in the order the spec lists them, and returns the
/// folded output plus how many source units it consumed.
///
/// When `DIACRITIC_INSENSITIVE` is set, combining marks — both ones a
/// canonical decomposition produces and ones already present in the
/// source — are dropped from the output entirely rather than priority-sorted
/// and kept; this is what lets "café" fold equal to "cafe" + a combining
/// acute (an accented precomposed letter must compare equal to its
/// decomposed spelling once marks stop counting, not merely sort the same).
pub fn fold_cluster_at(
    units: &[u16],
    idx: usize,
    options: CompareOptions,
    lang: SpecialCaseLanguage,
    oracle: &dyn UnicodeOracle,
) -> FoldResult {
    if idx >= units.len() {
        return FoldResult { chars: Vec::new(), consumed: 0, insufficient_buffer: false };
    }

    let (mut base, consumed_base) = decode_scalar_at(units, idx);
    let mut consumed = consumed_base;

    if options.contains(CompareOptions::WIDTH_INSENSITIVE) {
        base = oracle.width_fold(base);
    }

    let mut marks: Vec<char> = Vec::new();
    if options.intersects(CompareOptions::DIACRITIC_INSENSITIVE | CompareOptions::NONLITERAL) {
        if let Some(decomp) = oracle.decompose_canonical(base) {
            base = decomp.base;
            marks.extend(decomp.marks);
        }
    }

    let turkic = matches!(lang, SpecialCaseLanguage::Turkic);
    let mut chars: Vec<char> = if options.contains(CompareOptions::CASE_INSENSITIVE) {
        oracle.case_fold(base, turkic)
    } else {
        vec![base]
    };

    let mut cursor = idx + consumed;
    while cursor < units.len() {
        let (c, used) = decode_scalar_at(units, cursor);
        if oracle.is_non_base(c) {
            marks.push(c);
            cursor += used;
            consumed += used;
        } else {
            break;
        }
    }

    if !options.contains(CompareOptions::DIACRITIC_INSENSITIVE) {
        marks.sort_by_key(|&m| oracle.combining_class(m));
        chars.extend(marks);
    }

    let insufficient_buffer = chars.len() > FOLD_BUFFER_CAP;
    if insufficient_buffer {
        chars.truncate(FOLD_BUFFER_CAP);
    }

    FoldResult { chars, consumed, insufficient_buffer }
}

fn scan_ascii_digits(units: &[u16], start: usize) -> (u64, usize) {
    let mut n: u64 = 0;
    let mut i = start;
    while i < units.len() && units[i] < 128 && (units[i] as u8).is_ascii_digit() {
        n = n.saturating_mul(10).saturating_add((units[i] as u8 - b'0') as u64);
        i += 1;
    }
    (n, i - start)
}

/// Full comparison (spec §4.5). Iterates two streams of folded characters
/// in lockstep rather than cluster-by-cluster: a single expanding fold
/// (German ß -> "ss") can make one source cluster map to more folded
/// characters than its counterpart on the other side, so each side keeps a
/// small pending queue refilled one cluster at a time from
/// [`fold_cluster_at`], and characters are compared off the front of each
/// queue until one queue empties.
pub fn compare_with_options(
    a: &[u16],
    b: &[u16],
    options: CompareOptions,
    locale: Option<&Locale>,
    oracle: &dyn UnicodeOracle,
    collator: &dyn Collator,
) -> Ordering {
    // Fast path: no folding and no locale at all, pure unit-for-unit order
    // (matches a contiguous-buffer memcmp/UTF-16 byte compare).
    if options.is_empty() && locale.is_none() {
        return a.cmp(b);
    }

    // Fast path: case-insensitive only, every unit already ASCII: a single
    // 128-byte table lookup per unit, no cluster machinery at all.
    if options == CompareOptions::CASE_INSENSITIVE
        && a.iter().all(|&u| u < 128)
        && b.iter().all(|&u| u < 128)
    {
        for (&x, &y) in a.iter().zip(b.iter()) {
            let ord = ascii_fold_unit(x).cmp(&ascii_fold_unit(y));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        return a.len().cmp(&b.len());
    }

    let lang = locale.map(Locale::special_case_language).unwrap_or(SpecialCaseLanguage::None);
    let ignore_set = options.contains(CompareOptions::IGNORE_NON_ALPHANUMERIC);
    let numeric = options.contains(CompareOptions::NUMERICALLY);
    let force_ordering = options.contains(CompareOptions::FORCE_ORDERING);

    let mut ia = 0usize;
    let mut ib = 0usize;
    let mut qa: VecDeque<char> = VecDeque::new();
    let mut qb: VecDeque<char> = VecDeque::new();
    let mut forced: Option<Ordering> = None;

    loop {
        if ignore_set {
            while qa.is_empty() && ia < a.len() {
                let (c, used) = decode_scalar_at(a, ia);
                if c.is_alphanumeric() {
                    break;
                }
                ia += used;
            }
            while qb.is_empty() && ib < b.len() {
                let (c, used) = decode_scalar_at(b, ib);
                if c.is_alphanumeric() {
                    break;
                }
                ib += used;
            }
        }

        if numeric && qa.is_empty() && qb.is_empty() && ia < a.len() && ib < b.len() {
            let (ca, _) = decode_scalar_at(a, ia);
            let (cb, _) = decode_scalar_at(b, ib);
            if ca.is_ascii_digit() && cb.is_ascii_digit() {
                let (na, len_a) = scan_ascii_digits(a, ia);
                let (nb, len_b) = scan_ascii_digits(b, ib);
                match na.cmp(&nb) {
                    Ordering::Equal => {
                        if force_ordering && forced.is_none() && len_a != len_b {
                            forced = Some(len_a.cmp(&len_b));
                        }
                        ia += len_a;
                        ib += len_b;
                        continue;
                    }
                    other => return other,
                }
            }
        }

        if qa.is_empty() && ia < a.len() {
            let f = fold_cluster_at(a, ia, options, lang, oracle);
            ia += f.consumed.max(1);
            qa.extend(f.chars);
        }
        if qb.is_empty() && ib < b.len() {
            let f = fold_cluster_at(b, ib, options, lang, oracle);
            ib += f.consumed.max(1);
            qb.extend(f.chars);
        }

        match (qa.pop_front(), qb.pop_front()) {
            (None, None) => return forced.unwrap_or(Ordering::Equal),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca == cb {
                    continue;
                }
                if let Some(loc) = locale {
                    return collator.compare(&a[ia..], &b[ib..], loc);
                }
                return ca.cmp(&cb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::DefaultCollator;
    use crate::oracle::DefaultOracle;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn cmp(a: &str, b: &str, opts: CompareOptions) -> Ordering {
        compare_with_options(&units(a), &units(b), opts, None, &DefaultOracle, &DefaultCollator)
    }

    #[test]
    fn cafe_with_combining_acute_is_diacritic_insensitive_equal() {
        let combining = "cafe\u{0301}";
        assert_eq!(cmp("café", combining, CompareOptions::DIACRITIC_INSENSITIVE), Ordering::Equal);
    }

    #[test]
    fn ae_ligature_is_not_ae_digraph_under_case_width_insensitive() {
        let opts = CompareOptions::CASE_INSENSITIVE | CompareOptions::WIDTH_INSENSITIVE;
        assert_ne!(cmp("Encyclopædia", "encyclopaedia", opts), Ordering::Equal);
    }

    #[test]
    fn strasse_folds_equal_to_esszett_spelling() {
        assert_eq!(cmp("STRASSE", "straße", CompareOptions::CASE_INSENSITIVE), Ordering::Equal);
    }

    #[test]
    fn numeric_option_orders_by_value_not_lexically() {
        assert_eq!(cmp("File 9.txt", "File 10.txt", CompareOptions::NUMERICALLY), Ordering::Less);
    }

    #[test]
    fn plain_equality_uses_fast_path() {
        assert_eq!(cmp("hello", "hello", CompareOptions::empty()), Ordering::Equal);
    }

    #[test]
    fn ignore_non_alphanumeric_skips_punctuation() {
        assert_eq!(cmp("a-b", "ab", CompareOptions::IGNORE_NON_ALPHANUMERIC), Ordering::Equal);
    }

    #[test]
    fn ascii_fast_path_table_is_identity_outside_upper_alpha() {
        assert_eq!(ASCII_CASE_FOLD[b'9' as usize], b'9');
        assert_eq!(ASCII_CASE_FOLD[b'A' as usize], b'a');
        assert_eq!(ASCII_CASE_FOLD[b'z' as usize], b'z');
    }
}
