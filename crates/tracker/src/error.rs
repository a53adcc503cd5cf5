use std::collections::TryReserveError;

use thiserror::Error;

use fetchguard_address::Span;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("could not allocate a {requested} byte snapshot: {source}")]
    Allocation {
        requested: usize,
        source: TryReserveError,
    },

    #[error("snapshot of {requested} bytes exceeds the remaining tracking budget of {available} bytes")]
    BudgetExceeded { requested: usize, available: usize },

    #[error("buffer holds {buffer} bytes but the fetch span {span} is {} bytes", .span.len())]
    LengthMismatch { buffer: usize, span: Span },

    #[error("spans {0} and {1} do not overlap")]
    Disjoint(Span, Span),

    #[error("snapshot of {0} still has unclaimed bytes")]
    Incomplete(Span),
}

impl TrackingError {
    /// Whether the failure came from running out of memory or budget, as
    /// opposed to bad input.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, TrackingError::Allocation { .. } | TrackingError::BudgetExceeded { .. })
    }
}
