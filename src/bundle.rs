//! Mapped strings-file registry collaborator (spec §5, §6).
//!
//! Grounded in
//! `original_source/CoreFoundation/PlugIn.subproj/CFBundle_Strings.c`'s
//! `_mappedStringsFiles` / `_CFBundleGetMappedStringsFile` /
//! `_CFBundleInstallMappedStringsData` trio: a process-wide, append-only
//! list of mapped localized-strings-table blobs, guarded by one lock. This
//! is the only slice of the bundle/localization subsystem in scope for this
//! crate (spec §1); string-table lookup, `.lproj` resolution, and the rest
//! of `CFBundle_Strings.c` are out of scope.

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

static MAPPED_STRINGS_FILES: Lazy<Mutex<Vec<Arc<[u8]>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Installs a mapped strings-file blob, returning its index. Entries are
/// never removed (spec §5: "installed append-only, never removed").
pub fn install_mapped_strings_data(data: Arc<[u8]>) -> usize {
    let mut files = MAPPED_STRINGS_FILES.lock().unwrap();
    files.push(data);
    files.len() - 1
}

/// Looks up a previously installed blob. Returns `None` (logged at info
/// level, per spec §7's "failed localized load") when the index is stale or
/// out of range, falling back to non-mapped I/O rather than panicking.
pub fn get_mapped_strings_file(index: usize) -> Option<Arc<[u8]>> {
    let files = MAPPED_STRINGS_FILES.lock().unwrap();
    match files.get(index) {
        Some(data) => Some(data.clone()),
        None => {
            log::info!("mapped strings file {index} unavailable, falling back to non-mapped I/O");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_lookup_round_trips() {
        let idx = install_mapped_strings_data(Arc::from(&b"hello"[..]));
        assert_eq!(get_mapped_strings_file(idx).as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn missing_index_falls_back_to_none() {
        assert!(get_mapped_strings_file(usize::MAX).is_none());
    }
}
