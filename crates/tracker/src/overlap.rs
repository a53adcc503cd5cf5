use log::{error, warn};
use fetchguard_address::Span;
use fetchguard_syscalls::ReportedSet;

use crate::{merge, Budget, ByteRange, FetchSite, TrackingError};

#[derive(Debug)]
pub enum Overlap {
    /// The fetch shares no byte with the tracked range.
    NoOverlap,
    /// The fetch overlapped and has been checked; stop looking at other ranges.
    Resolved(Resolution),
}

#[derive(Debug)]
pub struct Resolution {
    /// The fetch disagreed with a trusted snapshot and was rewritten.
    pub tampered: bool,
    /// First multi-fetch seen for this syscall since startup.
    pub first_report: bool,
    pub widening: Widening,
}

#[derive(Debug)]
pub enum Widening {
    /// The fetch was already fully covered.
    NotNeeded,
    Widened,
    /// Tracking could not grow; the fetch was still checked against what is tracked.
    Failed(TrackingError),
}

/// Checks a fetch of `span` (bytes in `to`) against one tracked range.
///
/// On overlap, bytes in the shared window that differ from the trusted
/// snapshot are put back in `to`, and `tracked` is widened to cover the fetch.
pub fn classify_and_resolve(
    to: &mut [u8],
    tracked: &mut ByteRange,
    span: Span,
    site: &FetchSite,
    reported: &ReportedSet,
    budget: &mut Budget,
) -> Overlap {
    let tampered = match verify_and_restore(to, span, tracked) {
        Some(tampered) => tampered,
        None => return Overlap::NoOverlap,
    };

    let first_report = note_multi_fetch(site, reported);

    let widening = if tracked.span().contains_span(&span) {
        Widening::NotNeeded
    } else {
        match merge(to, tracked, span, budget) {
            Ok(()) => Widening::Widened,
            Err(e) => Widening::Failed(e),
        }
    };

    if tampered {
        report_tamper(site, span);
    }

    Overlap::Resolved(Resolution { tampered, first_report, widening })
}

/// `None` when `span` does not overlap `tracked`, otherwise whether the
/// shared window had to be restored.
pub(crate) fn verify_and_restore(to: &mut [u8], span: Span, tracked: &ByteRange) -> Option<bool> {
    let window = span.intersection(&tracked.span())?;

    if tracked.agrees_with(span, to, &window) {
        return Some(false);
    }

    tracked.restore_into(span, to, &window);
    Some(true)
}

pub(crate) fn note_multi_fetch(site: &FetchSite, reported: &ReportedSet) -> bool {
    if reported.test_and_set(site.syscall) {
        return false;
    }

    warn!("Multi-fetch seen in context {} syscall {}", site.context, site.syscall);
    true
}

pub(crate) fn report_tamper(site: &FetchSite, span: Span) {
    error!(
        "Double fetch protected in context {} syscall {} over {}",
        site.context, site.syscall, span
    );
}
