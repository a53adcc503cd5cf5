use fetchguard_address::Span;

use crate::{ByteRange, TrackingError};

/// Buffer under construction for a span of untrusted memory.
///
/// Every offset can be written once: `claim` only fills offsets no earlier
/// claim has touched. Claiming trusted snapshots before fresh fetch bytes
/// therefore keeps the first-seen value for every offset.
pub struct SpliceBuffer {
    span: Span,
    bytes: Vec<u8>,
    // Sorted, disjoint and never touching each other.
    claimed: Vec<Span>,
}

impl SpliceBuffer {
    pub fn try_new(span: Span) -> Result<Self, TrackingError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(span.len())
            .map_err(|source| TrackingError::Allocation { requested: span.len(), source })?;
        bytes.resize(span.len(), 0);

        Ok(Self { span, bytes, claimed: Vec::new() })
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Copies the part of `source` that falls inside this buffer into every
    /// offset that is still unclaimed. Returns how many bytes were written.
    pub fn claim(&mut self, source_span: Span, source: &[u8]) -> Result<usize, TrackingError> {
        if source.len() != source_span.len() {
            return Err(TrackingError::LengthMismatch { buffer: source.len(), span: source_span });
        }

        let target = match self.span.intersection(&source_span) {
            Some(target) => target,
            None => return Ok(0),
        };

        let mut written = 0;
        for gap in self.unclaimed(&target) {
            let (dst, src) = match (self.span.window(&gap), source_span.window(&gap)) {
                (Some(dst), Some(src)) => (dst, src),
                _ => continue,
            };

            self.bytes[dst].copy_from_slice(&source[src]);
            written += gap.len();
        }

        self.mark_claimed(target);
        Ok(written)
    }

    pub fn is_complete(&self) -> bool {
        self.span.is_empty() || self.claimed.first() == Some(&self.span)
    }

    pub fn finish(self) -> Result<ByteRange, TrackingError> {
        if !self.is_complete() {
            return Err(TrackingError::Incomplete(self.span));
        }

        Ok(ByteRange::from_parts(self.span, self.bytes))
    }

    fn unclaimed(&self, target: &Span) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut cursor = target.start();

        for claimed in self.claimed.iter() {
            if claimed.end() <= cursor {
                continue;
            }
            if claimed.start() >= target.end() {
                break;
            }

            if let Some(gap) = Span::new(cursor, claimed.start()).filter(|g| !g.is_empty()) {
                gaps.push(gap);
            }
            cursor = cursor.max(claimed.end());
        }

        if let Some(gap) = Span::new(cursor, target.end()).filter(|g| !g.is_empty()) {
            gaps.push(gap);
        }

        gaps
    }

    fn mark_claimed(&mut self, span: Span) {
        let mut joined = span;

        self.claimed.retain(|c| {
            let adjacent = c.end() == joined.start() || c.start() == joined.end();
            if adjacent || c.intersection(&joined).is_some() {
                joined = joined.hull(c);
                return false;
            }

            true
        });

        self.claimed.push(joined);
        self.claimed.sort_by_key(|c| c.start());
    }
}

#[cfg(test)]
mod tests {
    use fetchguard_address::Span;

    use crate::{SpliceBuffer, TrackingError};

    fn span(start: usize, end: usize) -> Span {
        Span::new(start.into(), end.into()).unwrap()
    }

    #[test]
    fn earlier_claims_are_never_overwritten() {
        let mut buffer = SpliceBuffer::try_new(span(100, 106)).unwrap();

        assert_eq!(buffer.claim(span(100, 104), &[1, 2, 3, 4]).unwrap(), 4);
        assert_eq!(buffer.claim(span(102, 106), &[9, 9, 5, 6]).unwrap(), 2);

        let range = buffer.finish().unwrap();
        assert_eq!(range.bytes(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn a_later_claim_fills_gaps_between_earlier_ones() {
        let mut buffer = SpliceBuffer::try_new(span(0, 8)).unwrap();

        buffer.claim(span(0, 2), &[1, 1]).unwrap();
        buffer.claim(span(5, 7), &[2, 2]).unwrap();
        assert!(!buffer.is_complete());

        let written = buffer.claim(span(0, 8), &[7; 8]).unwrap();

        assert_eq!(written, 4);
        assert_eq!(buffer.finish().unwrap().bytes(), &[1, 1, 7, 7, 7, 2, 2, 7]);
    }

    #[test]
    fn claims_outside_the_buffer_are_clipped() {
        let mut buffer = SpliceBuffer::try_new(span(10, 12)).unwrap();

        assert_eq!(buffer.claim(span(8, 14), &[0, 1, 2, 3, 4, 5]).unwrap(), 2);
        assert_eq!(buffer.claim(span(20, 22), &[0, 0]).unwrap(), 0);
        assert_eq!(buffer.finish().unwrap().bytes(), &[2, 3]);
    }

    #[test]
    fn finishing_with_unclaimed_bytes_fails() {
        let mut buffer = SpliceBuffer::try_new(span(0, 4)).unwrap();
        buffer.claim(span(0, 2), &[1, 2]).unwrap();

        assert!(matches!(buffer.finish().unwrap_err(), TrackingError::Incomplete(_)));
    }

    #[test]
    fn mismatched_source_lengths_are_rejected() {
        let mut buffer = SpliceBuffer::try_new(span(0, 4)).unwrap();

        assert!(matches!(
            buffer.claim(span(0, 4), &[1, 2]).unwrap_err(),
            TrackingError::LengthMismatch { buffer: 2, .. }
        ));
    }
}
