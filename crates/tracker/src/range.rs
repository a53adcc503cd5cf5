use std::fmt;
use std::fmt::Formatter;

use fetchguard_address::Span;

use crate::{SpliceBuffer, TrackingError};

/// A span of untrusted memory together with the first bytes ever fetched
/// from it during the current syscall.
///
/// The bytes can only be replaced wholesale by a widened range built through
/// a [`SpliceBuffer`], which keeps already-captured offsets intact.
pub struct ByteRange {
    span: Span,
    data: Vec<u8>,
}

impl ByteRange {
    pub(crate) fn from_parts(span: Span, data: Vec<u8>) -> Self {
        debug_assert_eq!(span.len(), data.len());
        Self { span, data }
    }

    /// Captures `bytes`, as fetched from `span`, into a fresh range.
    pub fn snapshot(span: Span, bytes: &[u8]) -> Result<Self, TrackingError> {
        let mut buffer = SpliceBuffer::try_new(span)?;
        buffer.claim(span, bytes)?;
        buffer.finish()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Trusted bytes for `window`, if this range covers all of it.
    pub fn bytes_in(&self, window: &Span) -> Option<&[u8]> {
        self.span.window(window).map(|w| &self.data[w])
    }

    /// Whether `fetched`, read from `fetched_span`, agrees with the trusted
    /// bytes over `window`. A window outside either span is vacuously consistent.
    pub fn agrees_with(&self, fetched_span: Span, fetched: &[u8], window: &Span) -> bool {
        match (self.bytes_in(window), fetched_span.window(window)) {
            (Some(trusted), Some(w)) => fetched.get(w).map_or(true, |f| f == trusted),
            _ => true,
        }
    }

    /// Overwrites `window` of the fetched buffer with the trusted bytes.
    pub fn restore_into(&self, fetched_span: Span, fetched: &mut [u8], window: &Span) -> usize {
        let (trusted, w) = match (self.bytes_in(window), fetched_span.window(window)) {
            (Some(trusted), Some(w)) => (trusted, w),
            _ => return 0,
        };

        match fetched.get_mut(w) {
            Some(target) => {
                target.copy_from_slice(trusted);
                trusted.len()
            },
            None => 0,
        }
    }
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteRange")
            .field("span", &self.span)
            .field("data", &self.data)
            .finish()
    }
}
