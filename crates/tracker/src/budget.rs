use crate::TrackingError;

/// Caps how many snapshot bytes one context may hold at once. Running out
/// is handled the same way as a failed allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    limit: Option<usize>,
    used: usize,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self { limit: None, used: 0 }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit), used: 0 }
    }

    pub fn reserve(&mut self, bytes: usize) -> Result<(), TrackingError> {
        let available = self.available();
        if bytes > available {
            return Err(TrackingError::BudgetExceeded { requested: bytes, available });
        }

        self.used += bytes;
        Ok(())
    }

    pub fn release(&mut self, bytes: usize) {
        self.used = self.used.saturating_sub(bytes);
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn available(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.used),
            None => usize::MAX - self.used,
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::unlimited()
    }
}
