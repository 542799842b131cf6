//! The part of `scrape` and `replay` that runs once a page is open.

use crate::cli::output;
use crate::config::JobConfig;
use crate::export::{export_records, export_stem, ExportFormat, Exported};
use crate::observers::{DebugDumper, OutcomeLogWriter};
use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use listing_scraper::{CancelHandle, ListingPage, OutcomeLog, ScrapeOrchestrator, ScrapeResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

const PROGRESS_POLL: Duration = Duration::from_millis(200);

/// Options shared by every command that runs a scrape.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Job file (JSON). Defaults to $LISTING_SCRAPER_JOB, ./listing-job.json,
    /// ~/.listing-scraper/job.json, then the built-in preset.
    #[arg(long)]
    pub job: Option<PathBuf>,

    /// Number of pages to scrape (overrides the job's page_budget)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: Option<u32>,

    /// Directory for exported files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Export format
    #[arg(long, value_enum, default_value_t = ExportFormat::Both)]
    pub format: ExportFormat,

    /// Append per-page outcomes to this JSONL file
    #[arg(long)]
    pub outcome_log: Option<PathBuf>,

    /// Save each page's HTML (and a screenshot, if available) here
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,
}

/// A finished run and the files it produced.
pub struct RunReport {
    /// Where the job came from.
    pub source: String,
    pub result: ScrapeResult,
    pub exported: Vec<PathBuf>,
    /// Files that could not be written.
    pub export_errors: Vec<String>,
}

/// Scrape `page` with `job`, then export. The page is left open.
///
/// Export failures are reported in the returned [`RunReport`] so the
/// scraped result is never lost to them.
pub async fn execute(
    page: &mut dyn ListingPage,
    job: &JobConfig,
    args: &RunArgs,
    source: String,
) -> Result<RunReport> {
    let mut config = job.scrape.clone();
    if let Some(pages) = args.pages {
        config.page_budget = pages;
    }
    let budget = config.page_budget;

    let mut orchestrator = ScrapeOrchestrator::new(job.schema.clone(), config)?;
    if let Some(path) = &args.outcome_log {
        orchestrator.add_observer(Box::new(OutcomeLogWriter::open(path)?));
    }
    if let Some(dir) = &args.debug_dir {
        orchestrator.add_observer(Box::new(DebugDumper::new(dir)?));
    }

    let cancel = CancelHandle::new();
    let interrupt = spawn_interrupt_watch(cancel.clone());
    let bar = progress_bar(budget)?;
    let ticker = spawn_progress_ticker(bar.clone(), orchestrator.outcome_log());

    let result = orchestrator.run(page, Some(&cancel)).await;

    interrupt.abort();
    ticker.abort();
    bar.finish_and_clear();

    let exported = if result.records.is_empty() {
        tracing::warn!("no records scraped, nothing to export");
        Exported::default()
    } else {
        export_records(
            &args.out_dir,
            &export_stem(chrono::Local::now()),
            args.format,
            &job.schema,
            &result.records,
        )
    };

    Ok(RunReport {
        source,
        result,
        exported: exported.written,
        export_errors: exported.errors,
    })
}

/// Ctrl-C stops the run once the current page is done.
fn spawn_interrupt_watch(cancel: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current page");
            cancel.cancel();
        }
    })
}

fn progress_bar(budget: u32) -> Result<ProgressBar> {
    if output::is_json() {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(u64::from(budget));
    bar.set_style(ProgressStyle::with_template(
        "{spinner} page {pos}/{len} [{bar:30}] {msg}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

/// Mirror the outcome log onto the progress bar.
fn spawn_progress_ticker(bar: ProgressBar, log: OutcomeLog) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let outcomes = log.snapshot();
            let records: usize = outcomes.iter().map(|o| o.records_extracted).sum();
            bar.set_position(outcomes.len() as u64);
            bar.set_message(format!("{records} records"));
            tokio::time::sleep(PROGRESS_POLL).await;
        }
    })
}
