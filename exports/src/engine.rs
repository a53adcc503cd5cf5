use std::sync;
use std::collections;

use log::{debug, error, trace, warn};
use fetchguard_address::{Address, Span};
use fetchguard_syscalls::{ExcludeSet, ReportedSet};
use fetchguard_tracker::{ContextId, FetchOutcome, FetchSite, Resolution, TrackerLimits, Widening};

use crate::context::FetchContext;
use crate::observer::FetchObserver;
use crate::profile::EngineProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The context is not inside a syscall.
    NoSyscall,
    /// The running syscall is on the exclude list.
    Excluded,
    /// Zero bytes were fetched.
    Empty,
    /// The fetched span wraps around the address space.
    Malformed,
}

/// What the engine did with one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Skipped(SkipReason),
    /// Nothing overlapping was tracked; the fetch is now the trusted copy.
    Recorded,
    /// The fetch overlapped earlier ones and agreed with them.
    Consistent,
    /// The fetch disagreed with earlier ones and the buffer now holds the
    /// first-seen bytes. `terminate` is set when the host should kill the context.
    Restored { terminate: bool },
    /// Tracking ran out of memory or budget; the fetch went through unchecked.
    Untracked,
}

impl Verdict {
    pub fn is_tampered(&self) -> bool {
        matches!(self, Verdict::Restored { .. })
    }
}

/// Checks every copy from user memory against what the same syscall copied
/// before.
///
/// One engine serves every context. Per-context state lives in the
/// [`FetchContext`] passed to each call.
pub struct Engine {
    excluded: ExcludeSet,
    reported: ReportedSet,
    kill_on_tamper: bool,
    limits: TrackerLimits,
    observers: sync::RwLock<collections::HashMap<String, Box<dyn FetchObserver>>>,
}

impl Engine {
    pub fn new(excluded: ExcludeSet, kill_on_tamper: bool, limits: TrackerLimits) -> Self {
        debug!(
            "Engine ready: {} syscalls excluded, kill on tamper {}, {:?}",
            excluded.len(), kill_on_tamper, limits
        );

        Self {
            excluded,
            reported: ReportedSet::new(),
            kill_on_tamper,
            limits,
            observers: sync::RwLock::new(collections::HashMap::new()),
        }
    }

    pub fn from_profile(profile: &EngineProfile) -> Self {
        Self::new(
            profile.ignored_syscalls.iter().copied().collect(),
            profile.kill_on_tamper,
            profile.tracker_limits(),
        )
    }

    /// Creates the state for a new execution context, sized by this engine's limits.
    pub fn new_context(&self, id: ContextId) -> FetchContext {
        FetchContext::new(id, self.limits)
    }

    pub fn excluded(&self) -> &ExcludeSet {
        &self.excluded
    }

    pub fn reported(&self) -> &ReportedSet {
        &self.reported
    }

    pub fn kill_on_tamper(&self) -> bool {
        self.kill_on_tamper
    }

    pub fn add_observer(&self, key: impl AsRef<str>, observer: Box<dyn FetchObserver>) {
        let mut observers = self.observers
            .write()
            .unwrap_or_else(sync::PoisonError::into_inner);

        debug!("Adding fetch observer: {}", key.as_ref());

        observers.insert(key.as_ref().to_string(), observer);
    }

    pub fn remove_observer(&self, key: impl AsRef<str>) -> bool {
        let mut observers = self.observers
            .write()
            .unwrap_or_else(sync::PoisonError::into_inner);

        debug!("Removing fetch observer: {}", key.as_ref());

        observers.remove(key.as_ref()).is_some()
    }

    /// Checks a copy of `to.len()` bytes from user address `from` that has
    /// already landed in `to`. May rewrite `to` with earlier-fetched bytes.
    ///
    /// Never fails: bookkeeping problems let the fetch through unchecked.
    pub fn on_fetch(&self, context: &mut FetchContext, to: &mut [u8], from: Address) -> Verdict {
        let syscall = match context.current_syscall() {
            Some(syscall) => syscall,
            None => {
                trace!("Fetch from {} in context {} outside of a syscall", from, context.id());
                return Verdict::Skipped(SkipReason::NoSyscall);
            },
        };

        if self.excluded.contains(syscall) {
            return Verdict::Skipped(SkipReason::Excluded);
        }

        if to.is_empty() {
            return Verdict::Skipped(SkipReason::Empty);
        }

        let span = match Span::from_len(from, to.len()) {
            Some(span) => span,
            None => {
                warn!(
                    "Fetch of {} bytes from {} wraps the address space in context {} syscall {}",
                    to.len(), from, context.id(), syscall
                );
                return Verdict::Skipped(SkipReason::Malformed);
            },
        };

        let site = FetchSite { context: context.id(), syscall };
        match context.tracker_mut().check_or_record(&site, to, span, &self.reported) {
            Ok(FetchOutcome::Ignored) => Verdict::Skipped(SkipReason::Empty),
            Ok(FetchOutcome::Recorded) => Verdict::Recorded,
            Ok(FetchOutcome::Resolved(resolution)) => self.settle(&site, span, resolution),
            Err(e) => {
                error!(
                    "Tracking skipped in context {} syscall {} over {}: {}",
                    site.context, site.syscall, span, e
                );
                self.notify(|o| o.on_tracking_failure(&site, &e));
                Verdict::Untracked
            },
        }
    }

    /// Releases everything tracked for `context` and ends its syscall. Safe
    /// to call more than once.
    pub fn clear(&self, context: &mut FetchContext) -> usize {
        let released = context.reset();
        if released > 0 {
            debug!("Released {} ranges for context {}", released, context.id());
        }

        released
    }

    fn settle(&self, site: &FetchSite, span: Span, resolution: Resolution) -> Verdict {
        if resolution.first_report {
            self.notify(|o| o.on_multi_fetch(site));
        }

        if let Widening::Failed(e) = &resolution.widening {
            self.notify(|o| o.on_tracking_failure(site, e));
        }

        if !resolution.tampered {
            return Verdict::Consistent;
        }

        self.notify(|o| o.on_tamper(site, span));

        if self.kill_on_tamper {
            error!("Requesting termination of context {}", site.context);
            self.notify(|o| o.on_terminate_request(site.context));
        }

        Verdict::Restored { terminate: self.kill_on_tamper }
    }

    fn notify(&self, f: impl Fn(&dyn FetchObserver)) {
        let observers = self.observers
            .read()
            .unwrap_or_else(sync::PoisonError::into_inner);

        for observer in observers.values() {
            f(observer.as_ref());
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::from_profile(&EngineProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use fetchguard_address::{Address, Span};
    use fetchguard_syscalls::{ExcludeSet, SyscallNr};
    use fetchguard_tracker::{ContextId, FetchSite, TrackerLimits, TrackingError};

    use crate::engine::{Engine, SkipReason, Verdict};
    use crate::observer::FetchObserver;

    #[derive(Default)]
    struct Tally {
        events: Mutex<Vec<String>>,
    }

    impl FetchObserver for Arc<Tally> {
        fn on_multi_fetch(&self, site: &FetchSite) {
            self.events.lock().unwrap().push(format!("multi {}", site.syscall.0));
        }

        fn on_tamper(&self, site: &FetchSite, _span: Span) {
            self.events.lock().unwrap().push(format!("tamper {}", site.context));
        }

        fn on_terminate_request(&self, context: ContextId) {
            self.events.lock().unwrap().push(format!("kill {}", context));
        }

        fn on_tracking_failure(&self, _site: &FetchSite, error: &TrackingError) {
            self.events.lock().unwrap().push(format!("failure {}", error.is_exhaustion()));
        }
    }

    fn engine(kill: bool, limits: TrackerLimits) -> (Engine, Arc<Tally>) {
        let engine = Engine::new(ExcludeSet::empty(), kill, limits);
        let tally = Arc::new(Tally::default());
        engine.add_observer("tally", Box::new(tally.clone()));

        (engine, tally)
    }

    #[test]
    fn fetches_outside_a_syscall_are_skipped() {
        let (engine, _) = engine(false, TrackerLimits::default());
        let mut context = engine.new_context(ContextId(1));

        let verdict = engine.on_fetch(&mut context, &mut [1, 2], Address::from(100usize));

        assert_eq!(verdict, Verdict::Skipped(SkipReason::NoSyscall));
    }

    #[test]
    fn wrapping_fetches_are_skipped() {
        let (engine, _) = engine(false, TrackerLimits::default());
        let mut context = engine.new_context(ContextId(1));
        context.enter_syscall(SyscallNr(7));

        let verdict = engine.on_fetch(&mut context, &mut [1, 2], Address::from(usize::MAX));

        assert_eq!(verdict, Verdict::Skipped(SkipReason::Malformed));
        assert!(context.tracker().is_empty());
    }

    #[test]
    fn tamper_with_kill_requests_termination() {
        let (engine, tally) = engine(true, TrackerLimits::default());
        let mut context = engine.new_context(ContextId(5));
        context.enter_syscall(SyscallNr(7));

        engine.on_fetch(&mut context, &mut [1, 2, 3, 4], Address::from(100usize));
        let verdict = engine.on_fetch(&mut context, &mut [1, 2, 9, 9], Address::from(100usize));

        assert_eq!(verdict, Verdict::Restored { terminate: true });
        assert_eq!(*tally.events.lock().unwrap(), vec!["multi 7", "tamper 5", "kill 5"]);
    }

    #[test]
    fn exhaustion_fails_open_and_is_reported() {
        let limits = TrackerLimits { tracked_bytes: Some(2), ..Default::default() };
        let (engine, tally) = engine(false, limits);
        let mut context = engine.new_context(ContextId(5));
        context.enter_syscall(SyscallNr(7));

        let mut to = [1, 2, 3, 4];
        let verdict = engine.on_fetch(&mut context, &mut to, Address::from(100usize));

        assert_eq!(verdict, Verdict::Untracked);
        assert_eq!(to, [1, 2, 3, 4]);
        assert_eq!(*tally.events.lock().unwrap(), vec!["failure true"]);
    }

    #[test]
    fn removed_observers_hear_nothing() {
        let (engine, tally) = engine(false, TrackerLimits::default());
        let mut context = engine.new_context(ContextId(5));
        context.enter_syscall(SyscallNr(7));

        assert!(engine.remove_observer("tally"));
        assert!(!engine.remove_observer("tally"));

        engine.on_fetch(&mut context, &mut [1], Address::from(100usize));
        engine.on_fetch(&mut context, &mut [2], Address::from(100usize));

        assert!(tally.events.lock().unwrap().is_empty());
    }
}
