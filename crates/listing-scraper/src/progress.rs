//! Run-time observation: the outcome log, cancellation, and page observers.
//!
//! The orchestrator never pushes progress anywhere. It appends each
//! [`PageOutcome`] to an [`OutcomeLog`] as soon as the page is done, and
//! front-ends poll the log (for a "page i of N" display, say). Observers are
//! the one hook that runs inline, at page-outcome time, with read-only access
//! to the page.

use crate::page::ListingPage;
use crate::types::{PageOutcome, ScrapeResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Append-only, shareable view of the outcomes of the current run.
///
/// Clones share the same log. Backed by a `tokio::sync::watch` channel so
/// readers can either poll [`OutcomeLog::len`] or await changes through
/// [`OutcomeLog::subscribe`].
#[derive(Clone)]
pub struct OutcomeLog {
    tx: Arc<watch::Sender<Vec<PageOutcome>>>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    /// Number of pages logged so far.
    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// The most recent outcome.
    pub fn latest(&self) -> Option<PageOutcome> {
        self.tx.borrow().last().cloned()
    }

    /// Copy of every outcome so far.
    pub fn snapshot(&self) -> Vec<PageOutcome> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<PageOutcome>> {
        self.tx.subscribe()
    }

    pub(crate) fn clear(&self) {
        self.tx.send_modify(|outcomes| outcomes.clear());
    }

    pub(crate) fn append(&self, outcome: PageOutcome) {
        self.tx.send_modify(|outcomes| outcomes.push(outcome));
    }

    /// Fill in pagination details on the last outcome.
    pub(crate) fn update_last(&self, f: impl FnOnce(&mut PageOutcome)) {
        self.tx.send_modify(|outcomes| {
            if let Some(last) = outcomes.last_mut() {
                f(last);
            }
        });
    }
}

impl Default for OutcomeLog {
    fn default() -> Self {
        Self::new()
    }
}

/// External stop request, checked between pages.
///
/// Cancelling never interrupts a page mid-extraction; the run stops the next
/// time it would look for the "next" control.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Diagnostic hook invoked once per page, after extraction and before
/// pagination moves on.
///
/// The page is shared, so only its read-only methods (URL, HTML,
/// screenshot) are reachable. The outcome passed here has not yet been
/// updated with pagination details (`advanced`, `stop_reason`).
#[async_trait]
pub trait PageObserver: Send {
    async fn on_page_outcome(&mut self, page: &dyn ListingPage, outcome: &PageOutcome);

    /// Called once with the finished result.
    async fn on_finish(&mut self, _result: &ScrapeResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(page_index: u32) -> PageOutcome {
        PageOutcome {
            page_index,
            records_extracted: 0,
            entry_failures: vec![],
            page_failure: None,
            stop_reason: None,
            advanced: false,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_log_is_shared_between_clones() {
        let log = OutcomeLog::new();
        let reader = log.clone();
        assert!(reader.is_empty());

        log.append(outcome(1));
        log.append(outcome(2));
        log.update_last(|o| o.advanced = true);

        assert_eq!(reader.len(), 2);
        let latest = reader.latest().unwrap();
        assert_eq!(latest.page_index, 2);
        assert!(latest.advanced);

        log.clear();
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_appends() {
        let log = OutcomeLog::new();
        let mut rx = log.subscribe();
        log.append(outcome(1));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn test_cancel_handle_shared() {
        let cancel = CancelHandle::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());
        cancel.cancel();
        assert!(other.is_cancelled());
    }
}
