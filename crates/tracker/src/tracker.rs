use std::collections::VecDeque;

use log::trace;
use serde::Deserialize;
use fetchguard_address::Span;
use fetchguard_syscalls::ReportedSet;

use crate::merge::coalesce;
use crate::overlap::{note_multi_fetch, report_tamper, verify_and_restore};
use crate::{classify_and_resolve, Budget, ByteRange, FetchSite, Overlap, Resolution, TrackingError, Widening};

/// How many tracked ranges a fetch is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPolicy {
    /// Stop at the first overlapping range. A fetch spanning two disjoint
    /// tracked ranges is only verified against one of them.
    #[default]
    FirstMatch,
    /// Verify against every overlapping range and fold them all into one.
    AllOverlapping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerLimits {
    /// Snapshot bytes one context may hold, unlimited when `None`.
    pub tracked_bytes: Option<usize>,
    pub policy: ScanPolicy,
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// Zero-length fetch, nothing to track.
    Ignored,
    /// First time this span was seen; a snapshot was taken.
    Recorded,
    Resolved(Resolution),
}

/// Ranges fetched so far by the syscall running in one context.
///
/// Owned by that context alone, so no locking happens here.
pub struct FetchTracker {
    ranges: VecDeque<ByteRange>,
    budget: Budget,
    policy: ScanPolicy,
}

impl FetchTracker {
    pub fn new(limits: TrackerLimits) -> Self {
        let budget = match limits.tracked_bytes {
            Some(limit) => Budget::with_limit(limit),
            None => Budget::unlimited(),
        };

        Self {
            ranges: VecDeque::new(),
            budget,
            policy: limits.policy,
        }
    }

    /// Verifies `to`, fetched from `span`, against what this syscall has
    /// fetched before, or records it if it overlaps nothing.
    ///
    /// An `Err` means the fetch could not be recorded; nothing was changed.
    pub fn check_or_record(
        &mut self,
        site: &FetchSite,
        to: &mut [u8],
        span: Span,
        reported: &ReportedSet,
    ) -> Result<FetchOutcome, TrackingError> {
        if to.len() != span.len() {
            return Err(TrackingError::LengthMismatch { buffer: to.len(), span });
        }
        if span.is_empty() {
            return Ok(FetchOutcome::Ignored);
        }

        let resolution = match self.policy {
            ScanPolicy::FirstMatch => self.resolve_first(site, to, span, reported),
            ScanPolicy::AllOverlapping => self.resolve_all(site, to, span, reported),
        };

        if let Some(resolution) = resolution {
            return Ok(FetchOutcome::Resolved(resolution));
        }

        self.record(to, span)?;
        Ok(FetchOutcome::Recorded)
    }

    /// Drops every tracked range. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let released = self.ranges.len();
        self.ranges.clear();
        self.budget.reset();

        released
    }

    pub fn ranges(&self) -> impl Iterator<Item = &ByteRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn tracked_bytes(&self) -> usize {
        self.ranges.iter().map(ByteRange::len).sum()
    }

    pub fn policy(&self) -> ScanPolicy {
        self.policy
    }

    fn resolve_first(
        &mut self,
        site: &FetchSite,
        to: &mut [u8],
        span: Span,
        reported: &ReportedSet,
    ) -> Option<Resolution> {
        for tracked in self.ranges.iter_mut() {
            if let Overlap::Resolved(resolution) =
                classify_and_resolve(to, tracked, span, site, reported, &mut self.budget)
            {
                return Some(resolution);
            }
        }

        None
    }

    fn resolve_all(
        &mut self,
        site: &FetchSite,
        to: &mut [u8],
        span: Span,
        reported: &ReportedSet,
    ) -> Option<Resolution> {
        let hits: Vec<usize> = self.ranges.iter()
            .enumerate()
            .filter(|(_, r)| r.span().intersection(&span).is_some())
            .map(|(i, _)| i)
            .collect();

        if hits.is_empty() {
            return None;
        }

        let mut tampered = false;
        for &i in hits.iter() {
            tampered |= verify_and_restore(to, span, &self.ranges[i]).unwrap_or(false);
        }

        let first_report = note_multi_fetch(site, reported);

        let covered = hits.len() == 1 && self.ranges[hits[0]].span().contains_span(&span);
        let widening = if covered {
            Widening::NotNeeded
        } else {
            match coalesce(to, span, &mut self.ranges, &hits, &mut self.budget) {
                Ok(()) => Widening::Widened,
                Err(e) => Widening::Failed(e),
            }
        };

        if tampered {
            report_tamper(site, span);
        }

        Some(Resolution { tampered, first_report, widening })
    }

    fn record(&mut self, to: &[u8], span: Span) -> Result<(), TrackingError> {
        self.budget.reserve(span.len())?;

        match ByteRange::snapshot(span, to) {
            Ok(range) => {
                trace!("Tracking {} ({} ranges)", span, self.ranges.len() + 1);
                self.ranges.push_front(range);
                Ok(())
            },
            Err(e) => {
                self.budget.release(span.len());
                Err(e)
            },
        }
    }
}

impl Default for FetchTracker {
    fn default() -> Self {
        Self::new(TrackerLimits::default())
    }
}
