use log::warn;
use fetchguard_syscalls::SyscallNr;
use fetchguard_tracker::{ContextId, FetchTracker, TrackerLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Nothing fetched since the last clear.
    Empty,
    /// At least one range is tracked for the running syscall.
    Tracking,
}

/// Fetch state of one execution context.
///
/// Owned by the host, one per context, and handed to the engine by `&mut`
/// on every call. A context only runs one syscall at a time, so nothing here
/// is shared.
pub struct FetchContext {
    id: ContextId,
    syscall: Option<SyscallNr>,
    tracker: FetchTracker,
}

impl FetchContext {
    pub fn new(id: ContextId, limits: TrackerLimits) -> Self {
        Self {
            id,
            syscall: None,
            tracker: FetchTracker::new(limits),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Marks `nr` as the syscall now running in this context.
    ///
    /// Ranges left over from a syscall whose exit was never reported are
    /// dropped first so they cannot be mistaken for fetches of this one.
    pub fn enter_syscall(&mut self, nr: SyscallNr) {
        if !self.tracker.is_empty() {
            warn!(
                "Context {} entered syscall {} with {} stale ranges from syscall {:?}, dropping them",
                self.id, nr, self.tracker.len(), self.syscall
            );
            self.tracker.clear();
        }

        self.syscall = Some(nr);
    }

    pub fn current_syscall(&self) -> Option<SyscallNr> {
        self.syscall
    }

    pub fn state(&self) -> ContextState {
        if self.tracker.is_empty() {
            ContextState::Empty
        } else {
            ContextState::Tracking
        }
    }

    pub fn tracker(&self) -> &FetchTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut FetchTracker {
        &mut self.tracker
    }

    /// Drops all ranges and ends the current syscall.
    pub(crate) fn reset(&mut self) -> usize {
        self.syscall = None;
        self.tracker.clear()
    }
}
