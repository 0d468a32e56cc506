//! Error taxonomy for the string engine (spec §7).

/// Everything that can go wrong calling into this crate's public API.
///
/// `OutOfMemory` is deliberately absent here: per spec §7 it is handled by
/// [`handle_out_of_memory`], which never returns.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StringError {
    #[error("index or range {0:?} extends past the string's length {1}")]
    Bounds(std::ops::Range<usize>, usize),

    #[error("mutating operation attempted on an immutable string")]
    NotMutable,

    #[error("required argument `{0}` was absent")]
    NilArg(&'static str),

    #[error("arithmetic on sizes or positions would exceed the index range")]
    Overflow,

    #[error("bytes could not be decoded as {0:?} without a loss byte")]
    DecodeFailure(crate::encoding::Encoding),

    #[error("format does not match expected: {0}")]
    FormatMismatch(String),
}

impl StringError {
    pub fn bounds(range: std::ops::Range<usize>, len: usize) -> Self {
        StringError::Bounds(range, len)
    }
}

/// Invoked from the one place that can observe a capacity request which will
/// not fit (spec §4.2's `new_capacity` returning `-1`). Logs and aborts; the
/// signature documents that it never returns, matching spec §7's contract
/// that `OutOfMemory` "does not return".
#[cold]
pub fn handle_out_of_memory(requested: usize) -> ! {
    log::error!("ERROR: out of memory allocating {requested} bytes for string storage");
    std::process::abort();
}

/// Helper used by the format engine: renders a failed format per spec §7's
/// user-visible log line, returning the sentinel the caller's API contract
/// wants (empty string).
pub fn log_format_failure(err: &StringError) -> String {
    log::error!("ERROR: Failed to format string: {err}");
    String::new()
}
