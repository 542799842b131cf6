//! Listing pages backed by saved HTML documents.
//!
//! Each snapshot is one page of the listing. Activating any node moves to the
//! next snapshot once the page settles; activating past the last snapshot
//! makes the settle wait fail, the way a dead "next" link would.
//!
//! `scraper` types are `!Send`, so documents are kept as strings and parsed
//! inside synchronous helpers. Nodes are remembered as the path that found
//! them (scope, selector, ordinal) and re-resolved on every access.

use super::{HandleTable, ListingPage, NodeHandle};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One saved page.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone)]
struct NodePath {
    scope: Option<NodeHandle>,
    selector: String,
    nth: usize,
}

/// A [`ListingPage`] over an ordered list of HTML snapshots.
pub struct SnapshotPage {
    snapshots: Vec<Snapshot>,
    current: usize,
    pending: Option<usize>,
    nodes: HandleTable<NodePath>,
}

impl SnapshotPage {
    /// Build from in-memory documents. URLs are synthesized as
    /// `snapshot://<n>`.
    pub fn from_html<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        let snapshots = pages
            .into_iter()
            .enumerate()
            .map(|(i, html)| Snapshot {
                url: format!("snapshot://{}", i + 1),
                html: html.into(),
            })
            .collect();
        Self::new(snapshots)
    }

    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots,
            current: 0,
            pending: None,
            nodes: HandleTable::new(),
        }
    }

    /// Load snapshots from files, in the order given.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            bail!("no HTML snapshots given");
        }
        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
            snapshots.push(Snapshot {
                url: format!("file://{}", path.display()),
                html,
            });
        }
        Ok(Self::new(snapshots))
    }

    /// Load every `.html`/`.htm` file in a directory, sorted by file name
    /// with digit runs compared as numbers (`page-2` before `page-10`).
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list snapshot dir: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
        Self::from_paths(&paths)
    }

    /// Number of snapshots loaded.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Zero-based index of the snapshot being shown.
    pub fn current_index(&self) -> usize {
        self.current
    }

    fn snapshot(&self) -> Result<&Snapshot> {
        self.snapshots
            .get(self.current)
            .ok_or_else(|| anyhow!("no snapshot loaded"))
    }

    fn resolve<'a>(&self, doc: &'a Html, handle: NodeHandle) -> Result<ElementRef<'a>> {
        let path = self.nodes.get(handle)?;
        let selector = parse_selector(&path.selector)?;
        let found = match path.scope {
            None => doc.select(&selector).nth(path.nth),
            Some(parent) => descendants(self.resolve(doc, parent)?, &selector).nth(path.nth),
        };
        found.ok_or_else(|| anyhow!("node {:?} #{} is gone", path.selector, path.nth))
    }

    fn with_element<R>(&self, node: NodeHandle, f: impl FnOnce(ElementRef<'_>) -> R) -> Result<R> {
        let doc = Html::parse_document(&self.snapshot()?.html);
        let element = self.resolve(&doc, node)?;
        Ok(f(element))
    }

    fn query_sync(&mut self, scope: Option<NodeHandle>, selector: &str) -> Result<Vec<NodeHandle>> {
        let count = {
            let doc = Html::parse_document(&self.snapshot()?.html);
            let sel = parse_selector(selector)?;
            match scope {
                None => doc.select(&sel).count(),
                Some(parent) => descendants(self.resolve(&doc, parent)?, &sel).count(),
            }
        };
        Ok((0..count)
            .map(|nth| {
                self.nodes.insert(NodePath {
                    scope,
                    selector: selector.to_string(),
                    nth,
                })
            })
            .collect())
    }
}

/// Order strings with runs of ASCII digits compared by value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let is_digit = |c: char| c.is_ascii_digit();
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if is_digit(x) && is_digit(y) => {
                let (num_a, rest_a) = a.split_at(a.find(|c| !is_digit(c)).unwrap_or(a.len()));
                let (num_b, rest_b) = b.split_at(b.find(|c| !is_digit(c)).unwrap_or(b.len()));
                let (val_a, val_b) = (num_a.trim_start_matches('0'), num_b.trim_start_matches('0'));
                let ord = val_a
                    .len()
                    .cmp(&val_b.len())
                    .then_with(|| val_a.cmp(val_b))
                    .then_with(|| num_a.len().cmp(&num_b.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a = &a[x.len_utf8()..];
                b = &b[y.len_utf8()..];
            }
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e}"))
}

/// Matches strictly below `scope`; the scope element itself never matches.
fn descendants<'a, 'b>(
    scope: ElementRef<'a>,
    selector: &'b Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'b
where
    'a: 'b,
{
    let id = scope.id();
    scope.select(selector).filter(move |el| el.id() != id)
}

/// Whitespace-collapsed text, approximating what a browser renders.
fn rendered_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl ListingPage for SnapshotPage {
    async fn query_all(
        &mut self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> Result<Vec<NodeHandle>> {
        self.query_sync(scope, selector)
    }

    async fn text(&mut self, node: NodeHandle) -> Result<String> {
        self.with_element(node, rendered_text)
    }

    async fn attribute(&mut self, node: NodeHandle, name: &str) -> Result<Option<String>> {
        self.with_element(node, |el| el.value().attr(name).map(String::from))
    }

    async fn is_interactable(&mut self, node: NodeHandle) -> Result<bool> {
        self.with_element(node, |el| {
            let attrs = el.value();
            attrs.attr("disabled").is_none()
                && attrs.attr("hidden").is_none()
                && attrs.attr("aria-disabled") != Some("true")
        })
    }

    async fn activate(&mut self, node: NodeHandle) -> Result<()> {
        self.with_element(node, |_| ())?;
        self.pending = Some(self.current + 1);
        self.nodes.invalidate();
        Ok(())
    }

    async fn wait_settled(&mut self, timeout: Duration) -> Result<()> {
        let Some(next) = self.pending.take() else {
            return Ok(());
        };
        if next >= self.snapshots.len() {
            bail!(
                "page did not settle within {}ms: no snapshot after page {}",
                timeout.as_millis(),
                self.current + 1
            );
        }
        self.current = next;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.snapshot()?.url.clone())
    }

    async fn html(&self) -> Result<String> {
        Ok(self.snapshot()?.html.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <ul>
          <li class="entry"><span class="name">  ACME
              TRANSPORT </span><a href="mailto:a@x.com">mail</a></li>
          <li class="entry"><span class="other">no name here</span></li>
        </ul>
        <span class="name">OUTSIDE</span>
        <button class="next" disabled>Next</button>
    "#;

    #[tokio::test]
    async fn test_query_in_document_order() {
        let mut page = SnapshotPage::from_html([PAGE]);
        let entries = page.query_all(None, "li.entry").await.unwrap();
        assert_eq!(entries.len(), 2);

        let name = page.query_all(Some(entries[0]), ".name").await.unwrap();
        assert_eq!(page.text(name[0]).await.unwrap(), "ACME TRANSPORT");
    }

    #[tokio::test]
    async fn test_scoped_query_never_leaks() {
        let mut page = SnapshotPage::from_html([PAGE]);
        let entries = page.query_all(None, "li.entry").await.unwrap();
        // The second entry has no .name; the one after the list must not match.
        let name = page.query_all(Some(entries[1]), ".name").await.unwrap();
        assert!(name.is_empty());
        // Selectors that reach for an ancestor still only return descendants.
        let scoped = page.query_all(Some(entries[1]), "ul .name").await.unwrap();
        assert!(scoped.is_empty());
        // The entry itself is not its own descendant.
        let own = page.query_all(Some(entries[0]), "li").await.unwrap();
        assert!(own.is_empty());
    }

    #[tokio::test]
    async fn test_attributes_and_interactable() {
        let mut page = SnapshotPage::from_html([PAGE]);
        let link = page.query_all(None, "a").await.unwrap();
        assert_eq!(
            page.attribute(link[0], "href").await.unwrap().as_deref(),
            Some("mailto:a@x.com")
        );
        assert_eq!(page.attribute(link[0], "title").await.unwrap(), None);

        let next = page.query_all(None, "button.next").await.unwrap();
        assert!(!page.is_interactable(next[0]).await.unwrap());
        assert!(page.is_interactable(link[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_advances_and_invalidates() {
        let mut page = SnapshotPage::from_html(["<a class='n'>1</a>", "<a class='n'>2</a>"]);
        let next = page.query_all(None, "a.n").await.unwrap();
        page.activate(next[0]).await.unwrap();
        assert!(page.text(next[0]).await.is_err());

        page.wait_settled(Duration::from_millis(10)).await.unwrap();
        assert_eq!(page.current_index(), 1);
        assert_eq!(page.current_url().await.unwrap(), "snapshot://2");

        let next = page.query_all(None, "a.n").await.unwrap();
        page.activate(next[0]).await.unwrap();
        let err = page.wait_settled(Duration::from_millis(10)).await.unwrap_err();
        assert!(err.to_string().contains("did not settle"));
    }

    #[tokio::test]
    async fn test_from_dir_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-2.html"), "<p>two</p>").unwrap();
        std::fs::write(dir.path().join("page-1.html"), "<p>one</p>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let mut page = SnapshotPage::from_dir(dir.path()).unwrap();
        assert_eq!(page.len(), 2);
        let p = page.query_all(None, "p").await.unwrap();
        assert_eq!(page.text(p[0]).await.unwrap(), "one");
    }

    #[tokio::test]
    async fn test_from_dir_orders_page_numbers_by_value() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=11 {
            std::fs::write(dir.path().join(format!("page-{n}.html")), format!("<p>{n}</p>")).unwrap();
        }

        let mut page = SnapshotPage::from_dir(dir.path()).unwrap();
        let mut seen = Vec::new();
        for i in 0..page.len() {
            page.current = i;
            page.nodes.invalidate();
            let p = page.query_all(None, "p").await.unwrap();
            seen.push(page.text(p[0]).await.unwrap());
        }
        let expected: Vec<String> = (1..=11).map(|n| n.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("page-2.html", "page-10.html"), Ordering::Less);
        assert_eq!(natural_cmp("page-10.html", "page-9.html"), Ordering::Greater);
        assert_eq!(natural_cmp("page-007", "page-7"), Ordering::Greater);
        assert_eq!(natural_cmp("a1b2", "a1b2"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("b1", "a2"), Ordering::Greater);
    }

    #[test]
    fn test_from_paths_empty_fails() {
        assert!(SnapshotPage::from_paths(&[]).is_err());
    }
}
