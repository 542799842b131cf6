//! Page observers used by the CLI: a JSONL outcome log and debug dumps.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use listing_scraper::{ListingPage, PageObserver, PageOutcome, ScrapeResult, Termination};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome log line written once per page.
#[derive(Debug, Serialize)]
struct PageLine<'a> {
    event: &'static str,
    timestamp: String,
    url: Option<String>,
    #[serde(flatten)]
    outcome: &'a PageOutcome,
}

/// Outcome log line written when the run ends.
#[derive(Debug, Serialize)]
struct FinishedLine<'a> {
    event: &'static str,
    timestamp: String,
    run_id: &'a str,
    pages_attempted: u32,
    pages_completed: u32,
    records: usize,
    termination: &'a Termination,
    elapsed_ms: u64,
}

/// Append-only JSONL log of page outcomes.
pub struct OutcomeLogWriter {
    file: File,
    path: PathBuf,
}

impl OutcomeLogWriter {
    /// Open or create the log file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open outcome log: {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, line: &impl Serialize) -> Result<()> {
        let json = serde_json::to_string(line)?;
        writeln!(self.file, "{json}")?;
        self.file.flush()?;
        Ok(())
    }
}

#[async_trait]
impl PageObserver for OutcomeLogWriter {
    async fn on_page_outcome(&mut self, page: &dyn ListingPage, outcome: &PageOutcome) {
        let url = page.current_url().await.ok();
        let line = PageLine {
            event: "page",
            timestamp: Utc::now().to_rfc3339(),
            url,
            outcome,
        };
        if let Err(e) = self.write(&line) {
            tracing::warn!(path = %self.path.display(), "outcome log write failed: {e:#}");
        }
    }

    async fn on_finish(&mut self, result: &ScrapeResult) {
        let line = FinishedLine {
            event: "finished",
            timestamp: Utc::now().to_rfc3339(),
            run_id: &result.run_id,
            pages_attempted: result.pages_attempted,
            pages_completed: result.pages_completed,
            records: result.records.len(),
            termination: &result.termination,
            elapsed_ms: result.elapsed_ms,
        };
        if let Err(e) = self.write(&line) {
            tracing::warn!(path = %self.path.display(), "outcome log write failed: {e:#}");
        }
    }
}

/// Saves each page's HTML, and a screenshot where the page can take one.
pub struct DebugDumper {
    dir: PathBuf,
}

impl DebugDumper {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create debug directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    async fn dump(&self, page: &dyn ListingPage, page_index: u32) -> Result<()> {
        let html = page.html().await?;
        let html_path = self.dir.join(format!("page-{page_index:03}.html"));
        std::fs::write(&html_path, html)
            .with_context(|| format!("failed to write {}", html_path.display()))?;

        match page.screenshot().await {
            Ok(png) => {
                let png_path = self.dir.join(format!("page-{page_index:03}.png"));
                std::fs::write(&png_path, png)
                    .with_context(|| format!("failed to write {}", png_path.display()))?;
            }
            Err(e) => tracing::debug!(page = page_index, "no screenshot: {e:#}"),
        }
        Ok(())
    }
}

#[async_trait]
impl PageObserver for DebugDumper {
    async fn on_page_outcome(&mut self, page: &dyn ListingPage, outcome: &PageOutcome) {
        if let Err(e) = self.dump(page, outcome.page_index).await {
            tracing::warn!(page = outcome.page_index, "debug dump failed: {e:#}");
        }
    }
}
