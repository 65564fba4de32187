//! Record of resources already mirrored during a run.

use std::{collections::HashSet, sync::Mutex};

/// Set of resolved URLs that have been claimed for mirroring.
///
/// Lives for one mirror run. The check-and-mark in [`DedupLedger::should_fetch`]
/// happens under a single lock, so concurrent callers can never both claim
/// the same URL.
#[derive(Debug, Default)]
pub struct DedupLedger {
    urls: Mutex<HashSet<String>>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url`. Returns `false` if it was already claimed.
    pub fn should_fetch(&self, url: &str) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string())
    }

    /// Marks `url` as mirrored without asking.
    pub fn mark(&self, url: &str) {
        self.should_fetch(url);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_second_claim_is_refused() {
        let ledger = DedupLedger::new();
        assert!(ledger.should_fetch("https://example.com/a.png"));
        assert!(!ledger.should_fetch("https://example.com/a.png"));
        assert!(ledger.should_fetch("https://example.com/b.png"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_mark_then_check() {
        let ledger = DedupLedger::new();
        assert!(ledger.is_empty());
        ledger.mark("https://example.com/");
        assert!(ledger.contains("https://example.com/"));
        assert!(!ledger.should_fetch("https://example.com/"));
    }

    #[test]
    fn test_concurrent_claims_grant_once() {
        let ledger = Arc::new(DedupLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.should_fetch("https://example.com/shared.js"))
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 1);
    }
}
