//! Per-run outcome counters.

use std::fmt;

/// What a mirror run did with the resources it came across.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorSummary {
    /// Resources written to disk.
    pub saved: usize,
    /// Resources deliberately left out: duplicates and HTML sub-responses.
    pub skipped: usize,
    /// Resources that failed to fetch, decode or write.
    pub failed: usize,
}

impl fmt::Display for MirrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} saved, {} skipped, {} failed",
            self.saved, self.skipped, self.failed
        )
    }
}
