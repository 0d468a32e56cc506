//! `find_with_options` (spec §4.5's find description): scans a range for
//! the first (or last) folding match, with a small cache of recently folded
//! clusters so repeated finds over the same text don't re-fold the same
//! source characters quadratically.

use crate::compare::{decode_scalar_at, fold_cluster_at, CompareOptions};
use crate::locale::SpecialCaseLanguage;
use crate::oracle::UnicodeOracle;
use crate::range::CharRange;
use once_cell::sync::Lazy;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// spec §9: keyed by a content hash of the whole string being folded plus
/// the index within it, so two different strings never collide on the same
/// key even when they share a length and a first code unit. The hash is
/// computed once per `find_with_options` call (not once per index), so
/// repeated lookups within a single scan stay O(1).
const FOLD_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FoldCacheKey {
    content_identity: u64,
    index: usize,
    options: u32,
    lang: u8,
}

struct FoldCacheEntry {
    chars: Vec<char>,
    consumed: usize,
}

static FOLD_CACHE: Lazy<Mutex<(Vec<FoldCacheKey>, HashMap<FoldCacheKey, FoldCacheEntry>)>> =
    Lazy::new(|| Mutex::new((Vec::new(), HashMap::new())));

/// Hashes the full unit slice so strings with equal length and first code
/// unit still produce distinct cache keys.
fn content_identity(units: &[u16]) -> u64 {
    let mut hasher = DefaultHasher::new();
    units.hash(&mut hasher);
    hasher.finish()
}

fn lang_discriminant(lang: SpecialCaseLanguage) -> u8 {
    match lang {
        SpecialCaseLanguage::None => 0,
        SpecialCaseLanguage::Turkic => 1,
        SpecialCaseLanguage::Lithuanian => 2,
        SpecialCaseLanguage::Greek => 3,
        SpecialCaseLanguage::Dutch => 4,
    }
}

fn cached_fold(
    units: &[u16],
    content_identity: u64,
    idx: usize,
    options: CompareOptions,
    lang: SpecialCaseLanguage,
    oracle: &dyn UnicodeOracle,
) -> (Vec<char>, usize) {
    let key = FoldCacheKey {
        content_identity,
        index: idx,
        options: options.bits(),
        lang: lang_discriminant(lang),
    };

    {
        let guard = FOLD_CACHE.lock().unwrap();
        if let Some(entry) = guard.1.get(&key) {
            return (entry.chars.clone(), entry.consumed);
        }
    }

    let result = fold_cluster_at(units, idx, options, lang, oracle);
    let chars = result.chars;
    let consumed = result.consumed;

    let mut guard = FOLD_CACHE.lock().unwrap();
    if guard.1.len() >= FOLD_CACHE_CAPACITY {
        if let Some(oldest) = guard.0.first().cloned() {
            guard.0.remove(0);
            guard.1.remove(&oldest);
        }
    }
    guard.0.push(key);
    guard.1.insert(key, FoldCacheEntry { chars: chars.clone(), consumed });

    (chars, consumed)
}

/// `find_with_options` (spec §4.5): searches `units[range]` for `needle`,
/// honoring `ANCHORED`/`BACKWARDS` (search-only bits) plus the same
/// case/diacritic/width/nonliteral/ignore-set options comparison uses.
/// Returns the matched character range in `units`, or `None`.
pub fn find_with_options(
    units: &[u16],
    range: CharRange,
    needle: &[u16],
    options: CompareOptions,
    lang: SpecialCaseLanguage,
    oracle: &dyn UnicodeOracle,
) -> Option<CharRange> {
    if needle.is_empty() {
        return None;
    }

    let anchored = options.contains(CompareOptions::ANCHORED);
    let backwards = options.contains(CompareOptions::BACKWARDS);
    let haystack_end = range.end().min(units.len());
    let haystack_start = range.location.min(haystack_end);
    let haystack_identity = content_identity(units);
    let needle_identity = content_identity(needle);

    let candidates: Box<dyn Iterator<Item = usize>> = if backwards {
        Box::new((haystack_start..haystack_end).rev())
    } else {
        Box::new(haystack_start..haystack_end)
    };

    for start in candidates {
        if anchored && !backwards && start != haystack_start {
            return None;
        }
        if let Some(matched_end) = matches_from(
            units,
            haystack_identity,
            start,
            haystack_end,
            needle,
            needle_identity,
            options,
            lang,
            oracle,
        ) {
            // Anchored-backwards: a match only counts if it abuts the end
            // of the range (trailing ignorable characters aside, which the
            // caller is expected to have already trimmed from `range`).
            if anchored && backwards && matched_end != haystack_end {
                continue;
            }
            return Some(CharRange::new(start, matched_end - start));
        }
        if anchored && !backwards {
            return None;
        }
    }
    None
}

/// Tries to match `needle` starting at `start` against `units[..limit]`,
/// folding both sides cluster-by-cluster via the shared cache. Returns the
/// end index in `units` on success.
fn matches_from(
    units: &[u16],
    haystack_identity: u64,
    start: usize,
    limit: usize,
    needle: &[u16],
    needle_identity: u64,
    options: CompareOptions,
    lang: SpecialCaseLanguage,
    oracle: &dyn UnicodeOracle,
) -> Option<usize> {
    let mut hay_idx = start;
    let mut needle_idx = 0usize;
    let mut hay_pending: Vec<char> = Vec::new();
    let mut needle_pending: Vec<char> = Vec::new();

    loop {
        if needle_pending.is_empty() {
            if needle_idx >= needle.len() {
                return Some(hay_idx);
            }
            let (chars, consumed) = cached_fold(needle, needle_identity, needle_idx, options, lang, oracle);
            needle_idx += consumed.max(1);
            needle_pending = chars;
            needle_pending.reverse();
        }
        if hay_pending.is_empty() {
            if hay_idx >= limit {
                return None;
            }
            let (chars, consumed) = cached_fold(units, haystack_identity, hay_idx, options, lang, oracle);
            hay_idx += consumed.max(1);
            hay_pending = chars;
            hay_pending.reverse();
        }

        let (Some(hc), Some(nc)) = (hay_pending.pop(), needle_pending.pop()) else {
            return None;
        };
        if hc != nc {
            return None;
        }
    }
}

/// Small helper retained for callers (and tests) that only need "does the
/// ignore set consider this character significant", mirroring the same
/// classifier `compare_with_options` uses for `IGNORE_NON_ALPHANUMERIC`.
pub fn is_alphanumeric_at(units: &[u16], idx: usize) -> bool {
    decode_scalar_at(units, idx).0.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DefaultOracle;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn finds_plain_substring() {
        let hay = units("hello world");
        let needle = units("world");
        let r = find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle,
            CompareOptions::empty(),
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .unwrap();
        assert_eq!(r, CharRange::new(6, 5));
    }

    #[test]
    fn case_insensitive_find() {
        let hay = units("Hello World");
        let needle = units("WORLD");
        let r = find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle,
            CompareOptions::CASE_INSENSITIVE,
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .unwrap();
        assert_eq!(r, CharRange::new(6, 5));
    }

    #[test]
    fn missing_needle_returns_none() {
        let hay = units("hello world");
        let needle = units("xyz");
        assert!(find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle,
            CompareOptions::empty(),
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .is_none());
    }

    #[test]
    fn anchored_requires_match_at_start() {
        let hay = units("hello world");
        let needle = units("world");
        assert!(find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle,
            CompareOptions::ANCHORED,
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .is_none());
        let needle2 = units("hello");
        assert!(find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle2,
            CompareOptions::ANCHORED,
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .is_some());
    }

    #[test]
    fn same_length_and_first_unit_needle_does_not_collide_with_haystack_fold() {
        let hay = units("hello");
        let needle = units("hullo");
        assert!(find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle,
            CompareOptions::CASE_INSENSITIVE,
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .is_none());
    }

    #[test]
    fn backwards_finds_last_occurrence() {
        let hay = units("abcabc");
        let needle = units("abc");
        let r = find_with_options(
            &hay,
            CharRange::new(0, hay.len()),
            &needle,
            CompareOptions::BACKWARDS,
            SpecialCaseLanguage::None,
            &DefaultOracle,
        )
        .unwrap();
        assert_eq!(r, CharRange::new(3, 3));
    }
}
