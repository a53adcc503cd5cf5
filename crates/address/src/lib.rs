use std::ops;
use std::fmt;
use std::fmt::Formatter;

/// A location in the untrusted (user) address space.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash)]
pub struct Address {
    pub value: usize,
}

impl Address {
    /// Moves the address forward by `by` bytes, `None` if that wraps the address space.
    pub fn checked_add(&self, by: usize) -> Option<Address> {
        self.value.checked_add(by).map(Address::from)
    }

    /// Distance from `base` to this address, `None` if `base` lies above it.
    pub fn offset_from(&self, base: &Address) -> Option<Offset> {
        self.value.checked_sub(base.value).map(Offset::from)
    }

    pub fn as_usize(&self) -> usize {
        self.value
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self { value }
    }
}

impl ops::Add<&Offset> for &Address {
    type Output = Option<Address>;

    fn add(self, rhs: &Offset) -> Self::Output {
        self.checked_add(rhs.value)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy)]
pub struct Offset {
    pub value: usize,
}

impl Offset {
    pub fn move_by(&mut self, by: usize) {
        self.value += by;
    }

    pub fn as_usize(&self) -> usize {
        self.value
    }
}

impl From<usize> for Offset {
    fn from(value: usize) -> Self {
        Self { value }
    }
}

impl From<Offset> for usize {
    fn from(offset: Offset) -> Self {
        offset.value
    }
}

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Offset(+{:#x})", self.value)
    }
}

/// Half-open address span `[start, end)`.
///
/// Construction guarantees `start <= end`, so `len` never underflows.
#[derive(Eq, PartialEq, Clone, Copy, Hash)]
pub struct Span {
    start: Address,
    end: Address,
}

impl Span {
    pub fn new(start: Address, end: Address) -> Option<Self> {
        if end < start {
            return None;
        }

        Some(Self { start, end })
    }

    /// Span covering `len` bytes from `start`. `None` when the end would wrap.
    pub fn from_len(start: Address, len: usize) -> Option<Self> {
        let end = start.checked_add(len)?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end.value - self.start.value
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.start <= *address && *address < self.end
    }

    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The bytes both spans cover. Spans that merely touch at a boundary, or
    /// empty spans, have no intersection.
    pub fn intersection(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);

        if start >= end {
            return None;
        }

        Some(Span { start, end })
    }

    /// Smallest span covering both inputs.
    pub fn hull(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Index range of `inner` relative to the start of this span, usable to
    /// slice a buffer that holds this span's bytes.
    pub fn window(&self, inner: &Span) -> Option<ops::Range<usize>> {
        if !self.contains_span(inner) {
            return None;
        }

        let start: usize = inner.start.offset_from(&self.start)?.into();
        Some(start..start + inner.len())
    }
}

impl From<Span> for ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start.value..span.end.value
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Span({:#x}..{:#x})", self.start.value, self.end.value)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start.value, self.end.value)
    }
}
