//! Locking shim collaborator (spec §5), grounded in
//! `original_source/CoreFoundation/Base.subproj/CFLocking.h`, which defines
//! `CFLock_t` as a platform-conditional pthread mutex or Win32 critical
//! section. A single `std::sync::Mutex` replaces that conditional
//! compilation, since Rust's std mutex is already portable across the
//! platforms this crate targets.
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct CoreLock(Mutex<()>);

impl CoreLock {
    pub fn new() -> Self {
        CoreLock(Mutex::new(()))
    }

    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.0.try_lock().ok()
    }
}
