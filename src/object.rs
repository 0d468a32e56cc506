//! Object-runtime collaborator (spec §6).
//!
//! The original system assumes a base object with a type id, retain/release,
//! and a dispatcher that can forward calls to foreign subclasses. Defining
//! that runtime is an explicit non-goal (spec §1); this crate uses ordinary
//! Rust ownership (`Arc`) instead of hand-rolled retain/release. The one
//! piece of the object-runtime contract this crate still needs is the
//! dispatcher's forwarding behavior, captured here as a trait so that the
//! `check_and_*` bridge functions in [`crate::string`] have a real boundary
//! to forward across instead of assuming every receiver is a native string.

/// A foreign (non-native) string-like object that the engine's bridge
/// functions can forward to, mirroring the original dispatcher's behavior of
/// calling back into a subclass's own implementation rather than assuming
/// native storage.
pub trait ForeignString {
    fn foreign_length(&self) -> usize;
    fn foreign_char_at(&self, index: usize) -> Option<u16>;
}
