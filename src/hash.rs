//! Representation-independent hashing (spec §4.7).
//!
//! The same fold runs over a UTF-16 code-unit view regardless of storage
//! width, so 8-bit and Unicode strings carrying the same abstract character
//! sequence always hash the same: callers on the 8-bit side widen through
//! the identity `byte as u16` map (Latin-1/ASCII storage is already a
//! subset of UTF-16's code-point space, so widening never perturbs the
//! ASCII hash bits).

const SHORT_THRESHOLD: usize = 96;
const WINDOW: usize = 32;
const HALF_WINDOW: usize = 16;

/// Folds `h <- 257*h + c` over one code unit.
fn fold_unit(h: u64, c: u16) -> u64 {
    h.wrapping_mul(257).wrapping_add(c as u64)
}

/// spec §4.7: hashes a UTF-16 code-unit sequence. Widen 8-bit storage to
/// `u16` (`byte as u16`) before calling this.
pub fn hash_units(units: &[u16]) -> u64 {
    let len = units.len();
    let mut h: u64 = len as u64;

    if len <= SHORT_THRESHOLD {
        for &c in units {
            h = fold_unit(h, c);
        }
    } else {
        let mid = len / 2;
        let windows = [
            0..WINDOW,
            (mid - HALF_WINDOW)..(mid + HALF_WINDOW),
            (len - WINDOW)..len,
        ];
        for w in windows {
            for &c in &units[w] {
                h = fold_unit(h, c);
            }
        }
    }

    h.wrapping_add(h << ((len as u32) & 31))
}

/// Hashes an 8-bit byte string by widening each byte identically to UTF-16
/// before folding, so it agrees with [`hash_units`] on the equivalent
/// Unicode string.
pub fn hash_eight_bit(bytes: &[u8]) -> u64 {
    let widened: Vec<u16> = bytes.iter().map(|&b| b as u16).collect();
    hash_units(&widened)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_hashes_to_zero_length_fold() {
        let h = hash_units(&[]);
        assert_eq!(h, 0u64.wrapping_add(0));
    }

    #[test]
    fn eight_bit_and_unicode_agree_on_ascii() {
        let text = "hello, world";
        let bytes: Vec<u8> = text.bytes().collect();
        let units: Vec<u16> = text.encode_utf16().collect();
        assert_eq!(hash_eight_bit(&bytes), hash_units(&units));
    }

    #[test]
    fn short_strings_fold_every_unit() {
        let units: Vec<u16> = "abc".encode_utf16().collect();
        let mut h: u64 = 3;
        for &c in &units {
            h = fold_unit(h, c);
        }
        h = h.wrapping_add(h << (3 & 31));
        assert_eq!(hash_units(&units), h);
    }

    #[test]
    fn long_strings_only_fold_three_windows() {
        // 200 code units: the middle 168 units (outside all three windows)
        // must not affect the hash, so two strings differing only there
        // must still hash equal.
        let mut a: Vec<u16> = vec![0u16; 200];
        let mut b: Vec<u16> = vec![0u16; 200];
        for i in 0..32 {
            a[i] = i as u16;
            b[i] = i as u16;
        }
        let mid = 100;
        for i in (mid - 16)..(mid + 16) {
            a[i] = i as u16;
            b[i] = i as u16;
        }
        for i in (200 - 32)..200 {
            a[i] = i as u16;
            b[i] = i as u16;
        }
        // Differ only in the untouched middle region.
        a[60] = 111;
        b[60] = 222;
        assert_eq!(hash_units(&a), hash_units(&b));
    }

    #[test]
    fn differing_windows_produce_different_hashes() {
        let a: Vec<u16> = (0..200).map(|i| i as u16).collect();
        let mut b = a.clone();
        b[0] = 9999;
        assert_ne!(hash_units(&a), hash_units(&b));
    }
}
