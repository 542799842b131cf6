//! Page abstraction the scraping loop runs against.
//!
//! Defines the `ListingPage` trait that abstracts over where the page comes
//! from: a live Chromium tab via chromiumoxide, or saved HTML snapshots
//! parsed with `scraper`. The loop only ever asks a page to find nodes, read
//! them, click one, and wait for the result to settle.

pub mod chromium;
pub mod snapshot;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Opaque handle to a node on the current page.
///
/// Handles carry the page generation they were issued in. Activating a node
/// starts a new generation, after which older handles are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    generation: u64,
    slot: usize,
}

/// A page the loop can query and paginate.
///
/// `&mut self` methods may change page state or the handle table. The
/// `&self` methods are read-only, which is all observers get to use.
#[async_trait]
pub trait ListingPage: Send + Sync {
    /// All nodes matching `selector`, in document order. With a `scope`, only
    /// descendants of that node are considered.
    async fn query_all(
        &mut self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> Result<Vec<NodeHandle>>;

    /// Rendered text of a node.
    async fn text(&mut self, node: NodeHandle) -> Result<String>;

    /// Value of an attribute, `None` when the attribute is absent.
    async fn attribute(&mut self, node: NodeHandle, name: &str) -> Result<Option<String>>;

    /// Whether the node can be activated (not disabled, not hidden).
    async fn is_interactable(&mut self, node: NodeHandle) -> Result<bool>;

    /// Click the node. Invalidates every handle issued so far.
    async fn activate(&mut self, node: NodeHandle) -> Result<()>;

    /// Wait until the page has settled after an activation.
    async fn wait_settled(&mut self, timeout: Duration) -> Result<()>;

    /// The URL currently shown.
    async fn current_url(&self) -> Result<String>;

    /// Full page HTML.
    async fn html(&self) -> Result<String>;

    /// PNG screenshot of the page, where the backend can take one.
    async fn screenshot(&self) -> Result<Vec<u8>> {
        bail!("screenshots are not supported by this page")
    }
}

/// Generation-checked storage for backend node references.
pub(crate) struct HandleTable<T> {
    generation: u64,
    nodes: Vec<T>,
}

impl<T> HandleTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            generation: 0,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, node: T) -> NodeHandle {
        self.nodes.push(node);
        NodeHandle {
            generation: self.generation,
            slot: self.nodes.len() - 1,
        }
    }

    pub(crate) fn get(&self, handle: NodeHandle) -> Result<&T> {
        if handle.generation != self.generation {
            bail!(
                "stale node handle (generation {} of {})",
                handle.generation,
                self.generation
            );
        }
        match self.nodes.get(handle.slot) {
            Some(node) => Ok(node),
            None => bail!("unknown node handle {}", handle.slot),
        }
    }

    /// Drop every node and start a new generation.
    pub(crate) fn invalidate(&mut self) {
        self.generation += 1;
        self.nodes.clear();
    }
}
