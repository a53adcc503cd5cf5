//! Per-context bookkeeping of bytes fetched from untrusted memory during a
//! syscall, and the checks that catch a second fetch seeing different bytes.

use std::fmt;
use std::fmt::Formatter;

use fetchguard_syscalls::SyscallNr;

mod error;
mod budget;
mod splice;
mod range;
mod merge;
mod overlap;
mod tracker;

pub use error::TrackingError;
pub use budget::Budget;
pub use splice::SpliceBuffer;
pub use range::ByteRange;
pub use merge::merge;
pub use overlap::{classify_and_resolve, Overlap, Resolution, Widening};
pub use tracker::{FetchOutcome, FetchTracker, ScanPolicy, TrackerLimits};

/// Opaque handle the host uses to name an execution context, usually a
/// thread or task id.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash)]
pub struct ContextId(pub u64);

impl From<u64> for ContextId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is fetching: the context and the syscall it is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSite {
    pub context: ContextId,
    pub syscall: SyscallNr,
}
