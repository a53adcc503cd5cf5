use std::collections::VecDeque;

use log::{error, trace};
use fetchguard_address::Span;

use crate::{Budget, ByteRange, SpliceBuffer, TrackingError};

/// Widens `tracked` so it also covers `span`, whose bytes were fetched into `to`.
///
/// Offsets `tracked` already holds keep their trusted bytes; only offsets new
/// to the union take bytes from `to`. On failure `tracked` is left as it was.
pub fn merge(
    to: &[u8],
    tracked: &mut ByteRange,
    span: Span,
    budget: &mut Budget,
) -> Result<(), TrackingError> {
    if to.len() != span.len() {
        return Err(TrackingError::LengthMismatch { buffer: to.len(), span });
    }
    if tracked.span().intersection(&span).is_none() {
        return Err(TrackingError::Disjoint(tracked.span(), span));
    }

    let union = tracked.span().hull(&span);
    let widened = splice_with_budget(union, [&*tracked], tracked.len(), span, to, budget)
        .map_err(|e| {
            error!("Could not widen {} to {}: {}", tracked.span(), union, e);
            e
        })?;

    trace!("Widened {} to {}", tracked.span(), union);
    *tracked = widened;

    Ok(())
}

/// Replaces every range at `hits` with a single range spanning all of them
/// plus `span`. The ranges are left untouched on failure.
pub(crate) fn coalesce(
    to: &[u8],
    span: Span,
    ranges: &mut VecDeque<ByteRange>,
    hits: &[usize],
    budget: &mut Budget,
) -> Result<(), TrackingError> {
    let union = hits.iter()
        .fold(span, |union, &i| union.hull(&ranges[i].span()));
    let held = hits.iter()
        .map(|&i| ranges[i].len())
        .sum();

    let joined = splice_with_budget(union, hits.iter().map(|&i| &ranges[i]), held, span, to, budget)
        .map_err(|e| {
            error!("Could not coalesce {} ranges into {}: {}", hits.len(), union, e);
            e
        })?;

    let mut doomed = hits.to_vec();
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    for i in doomed {
        ranges.remove(i);
    }

    trace!("Coalesced {} ranges into {}", hits.len(), union);
    ranges.push_front(joined);

    Ok(())
}

// Trusted ranges are claimed before the fetch so their bytes win.
fn splice_with_budget<'a>(
    union: Span,
    trusted: impl IntoIterator<Item = &'a ByteRange>,
    held: usize,
    span: Span,
    fetched: &[u8],
    budget: &mut Budget,
) -> Result<ByteRange, TrackingError> {
    let growth = union.len().saturating_sub(held);
    budget.reserve(growth)?;

    let spliced = splice(union, trusted, span, fetched);
    if spliced.is_err() {
        budget.release(growth);
    }

    spliced
}

fn splice<'a>(
    union: Span,
    trusted: impl IntoIterator<Item = &'a ByteRange>,
    span: Span,
    fetched: &[u8],
) -> Result<ByteRange, TrackingError> {
    let mut buffer = SpliceBuffer::try_new(union)?;
    for range in trusted {
        buffer.claim(range.span(), range.bytes())?;
    }
    buffer.claim(span, fetched)?;

    buffer.finish()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use fetchguard_address::Span;

    use crate::merge::coalesce;
    use crate::{merge, Budget, ByteRange, TrackingError};

    fn span(start: usize, end: usize) -> Span {
        Span::new(start.into(), end.into()).unwrap()
    }

    #[test]
    fn merge_extends_to_the_right_keeping_trusted_bytes() {
        let mut tracked = ByteRange::snapshot(span(100, 104), &[1, 2, 3, 4]).unwrap();
        let mut budget = Budget::unlimited();

        merge(&[9, 9, 5, 6], &mut tracked, span(102, 106), &mut budget).unwrap();

        assert_eq!(tracked.span(), span(100, 106));
        assert_eq!(tracked.bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn merge_extends_to_the_left_and_right() {
        let mut tracked = ByteRange::snapshot(span(102, 104), &[3, 4]).unwrap();
        let mut budget = Budget::unlimited();

        merge(&[1, 2, 0, 0, 5, 6], &mut tracked, span(100, 106), &mut budget).unwrap();

        assert_eq!(tracked.bytes(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn merge_refuses_disjoint_spans() {
        let mut tracked = ByteRange::snapshot(span(100, 104), &[1, 2, 3, 4]).unwrap();
        let mut budget = Budget::unlimited();

        let result = merge(&[0, 0], &mut tracked, span(104, 106), &mut budget);

        assert!(matches!(result.unwrap_err(), TrackingError::Disjoint(..)));
    }

    #[test]
    fn merge_over_budget_leaves_the_range_alone() {
        let mut tracked = ByteRange::snapshot(span(100, 104), &[1, 2, 3, 4]).unwrap();
        let mut budget = Budget::with_limit(5);
        budget.reserve(4).unwrap();

        let result = merge(&[3, 4, 5, 6], &mut tracked, span(102, 106), &mut budget);

        assert!(result.unwrap_err().is_exhaustion());
        assert_eq!(tracked.span(), span(100, 104));
        assert_eq!(tracked.bytes(), &[1, 2, 3, 4]);
        assert_eq!(budget.used(), 4);
    }

    #[test]
    fn coalesce_joins_every_hit_into_one_front_range() {
        let mut ranges = VecDeque::new();
        ranges.push_back(ByteRange::snapshot(span(110, 112), &[7, 7]).unwrap());
        ranges.push_back(ByteRange::snapshot(span(100, 102), &[1, 2]).unwrap());
        ranges.push_back(ByteRange::snapshot(span(104, 106), &[5, 6]).unwrap());
        let mut budget = Budget::unlimited();

        coalesce(&[0, 0, 3, 4, 0, 0], span(100, 106), &mut ranges, &[1, 2], &mut budget).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].span(), span(100, 106));
        assert_eq!(ranges[0].bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(ranges[1].span(), span(110, 112));
    }
}
