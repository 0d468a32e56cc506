//! Allocation & growth policy (spec §4.2).

use crate::error::handle_out_of_memory;
use std::sync::Arc;

/// Collaborator contract for a pluggable contents allocator (spec §6).
/// A mutable string's contents allocator can be distinct from the object's
/// own allocator; callers that need that indirection store an
/// `Arc<dyn ContentsAllocator>` only on the storage variants that need it
/// (spec §9's guidance), rather than carrying the field everywhere.
pub trait ContentsAllocator: Send + Sync {
    fn allocate(&self, size: usize) -> Option<Vec<u8>>;
    fn reallocate(&self, buf: Vec<u8>, new_size: usize) -> Option<Vec<u8>>;
    /// The allocator's preferred bucket size for a request, used to decide
    /// whether an existing capacity is "wastefully larger" than required.
    fn preferred_size_for(&self, size: usize) -> usize;
}

/// The platform default: a thin wrapper over `Vec<u8>` whose "good size" hook
/// rounds up to the allocator buckets a general-purpose libmalloc typically
/// uses (powers of two below 256 bytes, 16-byte steps above).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl ContentsAllocator for DefaultAllocator {
    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        let mut v = Vec::new();
        v.try_reserve_exact(size).ok()?;
        Some(v)
    }

    fn reallocate(&self, mut buf: Vec<u8>, new_size: usize) -> Option<Vec<u8>> {
        if new_size > buf.capacity() {
            buf.try_reserve_exact(new_size - buf.capacity()).ok()?;
        }
        Some(buf)
    }

    fn preferred_size_for(&self, size: usize) -> usize {
        if size <= 8 {
            8
        } else if size < 256 {
            size.next_power_of_two()
        } else {
            (size + 15) & !15
        }
    }
}

/// `new_capacity(required, current, want_extra, char_size) -> capacity`
/// (spec §4.2).
///
/// `desired_capacity` is the client-requested minimum, in characters;
/// `fixed` means the result must never exceed `desired_capacity * char_size`.
pub fn new_capacity(
    required: usize,
    current: usize,
    want_extra: bool,
    char_size: usize,
    desired_capacity: usize,
    fixed: bool,
    allocator: &dyn ContentsAllocator,
) -> Option<usize> {
    // Current capacity is adequate and not wastefully larger: keep it.
    if current >= required && current <= allocator.preferred_size_for(required) * 2 {
        return Some(current);
    }

    let grown = if want_extra {
        required
            .checked_mul(3)
            .and_then(|v| v.checked_add(1))
            .map(|v| v / 2)
    } else {
        Some(required)
    };

    let desired_bytes = desired_capacity.checked_mul(char_size);

    let mut candidate = grown?;
    if let Some(d) = desired_bytes {
        candidate = candidate.max(d);
    }
    candidate = candidate.max(required);

    if fixed {
        // Never grow past the client-supplied upper bound, and never let the
        // allocator's bucket rounding push us over it either.
        let cap = desired_bytes.unwrap_or(candidate);
        if required > cap {
            return None;
        }
        return Some(cap.max(required));
    }

    let preferred = allocator.preferred_size_for(candidate);
    let final_size = preferred.max(candidate);

    if final_size > isize::MAX as usize {
        return None;
    }

    Some(final_size)
}

/// Convenience used by callers that have no reasonable fallback: compute the
/// capacity or abort per spec §7's `OutOfMemory` contract.
pub fn new_capacity_or_abort(
    required: usize,
    current: usize,
    want_extra: bool,
    char_size: usize,
    desired_capacity: usize,
    fixed: bool,
    allocator: &dyn ContentsAllocator,
) -> usize {
    match new_capacity(
        required,
        current,
        want_extra,
        char_size,
        desired_capacity,
        fixed,
        allocator,
    ) {
        Some(c) => c,
        None => handle_out_of_memory(required),
    }
}

pub fn default_allocator() -> Arc<dyn ContentsAllocator> {
    Arc::new(DefaultAllocator)
}
