//! Size policy enforcement.

/// Maximum length of one command or data line, including CRLF.
///
/// RFC 5321 §4.5.3.1.6 allows 512 octets for command lines and 1000 for
/// text lines; one ceiling covers both since exceeding either is fatal
/// for the offending line only.
pub const MAX_LINE_LENGTH: usize = 1000;

/// Running byte counter against a configured ceiling.
///
/// Reset per DATA transaction, not per connection.
#[derive(Debug, Clone)]
pub struct SizeGuard {
    ceiling: usize,
    total: usize,
}

impl SizeGuard {
    /// Creates a guard with the given byte ceiling.
    #[must_use]
    pub const fn new(ceiling: usize) -> Self {
        Self { ceiling, total: 0 }
    }

    /// Records `bytes` more consumed bytes.
    ///
    /// Returns `false` once the ceiling has been crossed.
    pub const fn record(&mut self, bytes: usize) -> bool {
        self.total = self.total.saturating_add(bytes);
        self.total <= self.ceiling
    }

    /// Total bytes recorded so far.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// True once the running total has crossed the ceiling.
    #[must_use]
    pub const fn is_exceeded(&self) -> bool {
        self.total > self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_ceiling() {
        let mut guard = SizeGuard::new(100);
        assert!(guard.record(40));
        assert!(guard.record(60));
        assert_eq!(guard.total(), 100);
        assert!(!guard.is_exceeded());
    }

    #[test]
    fn test_first_crossing_byte_signals() {
        let mut guard = SizeGuard::new(100);
        assert!(guard.record(100));
        assert!(!guard.record(1));
        assert!(guard.is_exceeded());
    }

    #[test]
    fn test_saturates() {
        let mut guard = SizeGuard::new(10);
        assert!(!guard.record(usize::MAX));
        assert!(!guard.record(usize::MAX));
        assert!(guard.is_exceeded());
    }
}
