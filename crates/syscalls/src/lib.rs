use std::fmt;
use std::fmt::Formatter;
use serde::{Deserialize, Serialize};

mod names;
mod exclude;
mod reported;

pub use names::{syscall_by_name, syscall_name};
pub use exclude::ExcludeSet;
pub use reported::ReportedSet;

/// Number of syscall identifiers the bitmaps can hold.
pub const MAX_SYSCALLS: usize = 512;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = MAX_SYSCALLS / WORD_BITS;

/// Syscalls ignored when no exclude list is configured: they legitimately
/// re-read user memory (`futex`), or are too hot to check (`write`, `execve`).
pub const DEFAULT_IGNORED: [SyscallNr; 3] = [
    SyscallNr(names::NR_WRITE),
    SyscallNr(names::NR_EXECVE),
    SyscallNr(names::NR_FUTEX),
];

#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(try_from = "SyscallSpec", into = "u32")]
pub struct SyscallNr(pub u32);

impl SyscallNr {
    /// Word index and bit mask of this identifier, `None` when it falls
    /// outside the bitmaps.
    pub(crate) fn slot(&self) -> Option<(usize, u64)> {
        let nr = self.0 as usize;
        if nr >= MAX_SYSCALLS {
            return None;
        }

        Some((nr / WORD_BITS, 1u64 << (nr % WORD_BITS)))
    }
}

impl From<u32> for SyscallNr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SyscallNr> for u32 {
    fn from(nr: SyscallNr) -> Self {
        nr.0
    }
}

impl fmt::Debug for SyscallNr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SyscallNr({})", self.0)
    }
}

impl fmt::Display for SyscallNr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match syscall_name(*self) {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Profiles may name syscalls either by number or by their x86_64 name.
#[derive(Deserialize)]
#[serde(untagged)]
enum SyscallSpec {
    Nr(u32),
    Name(String),
}

impl TryFrom<SyscallSpec> for SyscallNr {
    type Error = String;

    fn try_from(spec: SyscallSpec) -> Result<Self, Self::Error> {
        match spec {
            SyscallSpec::Nr(nr) => Ok(SyscallNr(nr)),
            SyscallSpec::Name(name) => syscall_by_name(&name)
                .ok_or_else(|| format!("unknown syscall name `{}`", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{SyscallNr, MAX_SYSCALLS};

    #[test]
    fn display_includes_the_name_when_known() {
        assert_eq!(SyscallNr(59).to_string(), "59 (execve)");
        assert_eq!(SyscallNr(499).to_string(), "499");
    }

    #[test]
    fn identifiers_past_the_bitmap_have_no_slot() {
        assert_eq!(SyscallNr(0).slot(), Some((0, 1)));
        assert_eq!(SyscallNr(65).slot(), Some((1, 2)));
        assert_eq!(SyscallNr(MAX_SYSCALLS as u32).slot(), None);
    }
}
