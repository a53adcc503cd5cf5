use log::warn;

use crate::{SyscallNr, DEFAULT_IGNORED, WORDS};

/// Syscalls exempt from fetch checking. Built once, read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ExcludeSet {
    bits: [u64; WORDS],
}

impl ExcludeSet {
    pub fn empty() -> Self {
        Self { bits: [0; WORDS] }
    }

    pub fn contains(&self, nr: SyscallNr) -> bool {
        match nr.slot() {
            Some((word, mask)) => self.bits[word] & mask != 0,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }
}

impl Default for ExcludeSet {
    fn default() -> Self {
        DEFAULT_IGNORED.into_iter().collect()
    }
}

impl FromIterator<SyscallNr> for ExcludeSet {
    fn from_iter<T: IntoIterator<Item = SyscallNr>>(iter: T) -> Self {
        let mut set = Self::empty();

        for nr in iter {
            match nr.slot() {
                Some((word, mask)) => set.bits[word] |= mask,
                None => warn!("Cannot exclude syscall {}, it is outside the tracked range", nr),
            }
        }

        set
    }
}

impl std::fmt::Debug for ExcludeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members = (0..crate::MAX_SYSCALLS as u32)
            .map(SyscallNr)
            .filter(|nr| self.contains(*nr));

        f.debug_set().entries(members).finish()
    }
}
