//! Entry discovery and bounded polling for nodes.

use crate::page::{ListingPage, NodeHandle};
use crate::types::PageFailure;
use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `selector` until it matches at least one node or `timeout` passes.
///
/// Always queries at least once, so a zero timeout is a single lookup.
/// Returns an empty vector when nothing appeared in time.
pub async fn wait_for_any(
    page: &mut dyn ListingPage,
    scope: Option<NodeHandle>,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<NodeHandle>> {
    let deadline = Instant::now() + timeout;
    loop {
        let found = page.query_all(scope, selector).await?;
        let now = Instant::now();
        if !found.is_empty() || now >= deadline {
            return Ok(found);
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Entry nodes found on one page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedEntries {
    /// Entry nodes in document order.
    pub entries: Vec<NodeHandle>,
    /// Set when the page produced no entries.
    pub condition: Option<PageFailure>,
}

/// Finds the repeated container nodes of a listing page.
#[derive(Debug, Clone)]
pub struct EntryLocator {
    selector: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl EntryLocator {
    pub fn new(selector: impl Into<String>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            selector: selector.into(),
            timeout,
            poll_interval,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Locate entries, waiting for them to render.
    ///
    /// An empty page is not an error: it comes back as
    /// [`PageFailure::NoEntriesFound`], and a failing query as
    /// [`PageFailure::EntryLookupFailed`].
    pub async fn locate(&self, page: &mut dyn ListingPage) -> LocatedEntries {
        match wait_for_any(page, None, &self.selector, self.timeout, self.poll_interval).await {
            Ok(entries) if entries.is_empty() => {
                tracing::warn!(
                    selector = %self.selector,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "no entries found"
                );
                LocatedEntries {
                    entries,
                    condition: Some(PageFailure::NoEntriesFound),
                }
            }
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "entries located");
                LocatedEntries {
                    entries,
                    condition: None,
                }
            }
            Err(e) => {
                tracing::warn!("entry lookup failed: {e:#}");
                LocatedEntries {
                    entries: Vec::new(),
                    condition: Some(PageFailure::EntryLookupFailed {
                        detail: format!("{e:#}"),
                    }),
                }
            }
        }
    }
}
