use std::sync::atomic::{AtomicU64, Ordering};

use crate::{SyscallNr, WORDS};

/// Syscalls for which a multi-fetch has already been logged.
///
/// Shared by every context; `test_and_set` lets exactly one of several
/// concurrent callers win the first report for a syscall.
pub struct ReportedSet {
    bits: [AtomicU64; WORDS],
}

impl ReportedSet {
    pub fn new() -> Self {
        Self {
            bits: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Marks `nr` as reported and returns whether it already was.
    ///
    /// Identifiers outside the bitmap cannot be remembered and always
    /// return `false`.
    pub fn test_and_set(&self, nr: SyscallNr) -> bool {
        match nr.slot() {
            Some((word, mask)) => self.bits[word].fetch_or(mask, Ordering::AcqRel) & mask != 0,
            None => false,
        }
    }

    pub fn is_reported(&self, nr: SyscallNr) -> bool {
        match nr.slot() {
            Some((word, mask)) => self.bits[word].load(Ordering::Acquire) & mask != 0,
            None => false,
        }
    }
}

impl Default for ReportedSet {
    fn default() -> Self {
        Self::new()
    }
}
