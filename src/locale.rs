//! Locale collaborator (spec §6) and the special-case language cache
//! (spec §5).

use once_cell::sync::Lazy;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub identifier: String,
    pub decimal_separator: char,
    pub grouping_separator: char,
}

impl Locale {
    pub fn new(identifier: impl Into<String>) -> Self {
        Locale { identifier: identifier.into(), decimal_separator: '.', grouping_separator: ',' }
    }

    pub fn current() -> Self {
        Locale::new("en_US")
    }

    /// Language tag used for the handful of locales with special casing
    /// rules (spec §4.5/§4.10): Turkic (tr/az), Lithuanian (lt), Greek (el),
    /// Dutch (nl).
    pub fn special_case_language(&self) -> SpecialCaseLanguage {
        let lang = self.identifier.split(['_', '-']).next().unwrap_or("");
        match lang {
            "tr" | "az" => SpecialCaseLanguage::Turkic,
            "lt" => SpecialCaseLanguage::Lithuanian,
            "el" => SpecialCaseLanguage::Greek,
            "nl" => SpecialCaseLanguage::Dutch,
            _ => SpecialCaseLanguage::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCaseLanguage {
    None,
    Turkic,
    Lithuanian,
    Greek,
    Dutch,
}

/// spec §5: "a dedicated lock; the cache is a single slot", keyed by the
/// last-seen locale identifier.
static SPECIAL_CASE_CACHE: Lazy<Mutex<Option<(String, SpecialCaseLanguage)>>> =
    Lazy::new(|| Mutex::new(None));

pub fn special_case_language_cached(locale: &Locale) -> SpecialCaseLanguage {
    let mut slot = SPECIAL_CASE_CACHE.lock().unwrap();
    if let Some((id, lang)) = slot.as_ref() {
        if id == &locale.identifier {
            return *lang;
        }
    }
    let lang = locale.special_case_language();
    *slot = Some((locale.identifier.clone(), lang));
    lang
}

/// Ordering produced by a collator, mirroring `std::cmp::Ordering` but kept
/// as its own type at the collaborator boundary per spec §6.
pub type CollationOrdering = std::cmp::Ordering;

/// Locale-aware collator over two substrings, consulted only on a folding
/// mismatch (spec §4.5). The default collator has no richer collation table
/// to consult and falls back to ordinal comparison of the residual ranges —
/// real deployments plug in an ICU-backed `Collator`.
pub trait Collator: Send + Sync {
    fn compare(&self, a: &[u16], b: &[u16], locale: &Locale) -> CollationOrdering;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCollator;

impl Collator for DefaultCollator {
    fn compare(&self, a: &[u16], b: &[u16], _locale: &Locale) -> CollationOrdering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_turkic() {
        let l = Locale::new("tr_TR");
        assert_eq!(l.special_case_language(), SpecialCaseLanguage::Turkic);
    }

    #[test]
    fn cache_returns_consistent_answer() {
        let l = Locale::new("nl_NL");
        assert_eq!(special_case_language_cached(&l), SpecialCaseLanguage::Dutch);
        assert_eq!(special_case_language_cached(&l), SpecialCaseLanguage::Dutch);
    }
}
