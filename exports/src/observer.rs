use fetchguard_address::Span;
use fetchguard_tracker::{ContextId, FetchSite, TrackingError};

/// Receives what the engine decided about each fetch. Every method defaults
/// to doing nothing; the engine already logs all of these.
///
/// Calls happen on the fetching context's own thread, before `on_fetch`
/// returns, so implementations should not block.
pub trait FetchObserver: Send + Sync {
    /// A syscall re-read user memory it had already fetched. Only the first
    /// occurrence per syscall is reported.
    fn on_multi_fetch(&self, _site: &FetchSite) {}

    /// The bytes fetched from `span` had changed and were rewritten with the
    /// first-seen ones.
    fn on_tamper(&self, _site: &FetchSite, _span: Span) {}

    /// The engine wants `context` gone. Delivering that is up to the host.
    fn on_terminate_request(&self, _context: ContextId) {}

    /// Bookkeeping failed; the fetch went through unchecked or partly tracked.
    fn on_tracking_failure(&self, _site: &FetchSite, _error: &TrackingError) {}
}
