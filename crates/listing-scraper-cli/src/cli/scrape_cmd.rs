//! `listing-scraper scrape <url>`: scrape a live listing in Chromium.

use crate::cli::output;
use crate::cli::run::{execute, RunArgs, RunReport};
use crate::config::{load_job, JobConfig};
use anyhow::{bail, Context, Result};
use listing_scraper::locator::wait_for_any;
use listing_scraper::{ChromiumPage, ChromiumRenderer, LaunchOptions};
use std::path::PathBuf;

/// Browser-only options of `scrape`.
#[derive(Debug, Clone, Default)]
pub struct BrowserArgs {
    pub headful: bool,
    pub chromium: Option<PathBuf>,
    /// Overrides the job's login wait, in seconds.
    pub login_wait: Option<u64>,
    /// Overrides the job's ready selector.
    pub ready_selector: Option<String>,
}

/// Run the scrape command.
pub async fn run(url: Option<&str>, args: &RunArgs, browser: &BrowserArgs) -> Result<()> {
    let (mut job, source) = load_job(args.job.as_deref())?;
    apply_browser_overrides(&mut job, browser);

    let url = resolve_url(url, &job)?;
    tracing::info!(%url, job = %source, "starting scrape");

    let options = LaunchOptions {
        executable: browser.chromium.clone(),
        headless: !browser.headful,
        navigation_timeout: job.navigation_timeout(),
        settle_delay: job.settle_delay(),
    };
    let renderer = ChromiumRenderer::launch(options).await?;

    let outcome = scrape_in(&renderer, &url, &job, args, source.to_string()).await;
    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("browser shutdown failed: {e:#}");
    }

    output::print_report(&outcome?);
    Ok(())
}

fn apply_browser_overrides(job: &mut JobConfig, browser: &BrowserArgs) {
    if let Some(secs) = browser.login_wait {
        job.login_wait_ms = secs.saturating_mul(1000);
    }
    if let Some(selector) = &browser.ready_selector {
        job.ready_selector = Some(selector.clone());
    }
}

/// Pick the start URL: command line first, then the job file.
pub fn resolve_url(arg: Option<&str>, job: &JobConfig) -> Result<String> {
    let Some(raw) = arg.or(job.url.as_deref()) else {
        bail!("no URL given: pass one on the command line or set \"url\" in the job file");
    };
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid URL: {raw}"))?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed.to_string()),
        other => bail!("unsupported URL scheme {other:?} in {raw}"),
    }
}

async fn scrape_in(
    renderer: &ChromiumRenderer,
    url: &str,
    job: &JobConfig,
    args: &RunArgs,
    source: String,
) -> Result<RunReport> {
    let mut page = renderer.open_page(url).await?;
    let outcome = prepare_and_run(&mut page, job, args, source).await;
    if let Err(e) = page.close().await {
        tracing::warn!("page close failed: {e:#}");
    }
    outcome
}

async fn prepare_and_run(
    page: &mut ChromiumPage,
    job: &JobConfig,
    args: &RunArgs,
    source: String,
) -> Result<RunReport> {
    let login_wait = job.login_wait();
    if !login_wait.is_zero() {
        if !output::is_json() {
            eprintln!(
                "Waiting {}s for the page to load (log in now if required)...",
                login_wait.as_secs()
            );
        }
        tokio::time::sleep(login_wait).await;
    }

    if let Some(selector) = &job.ready_selector {
        let found = wait_for_any(
            page,
            None,
            selector,
            job.scrape.entry_timeout(),
            job.scrape.poll_interval(),
        )
        .await
        .with_context(|| format!("ready selector {selector:?} failed"))?;
        if found.is_empty() {
            tracing::warn!(%selector, "ready selector never matched, scraping anyway");
        }
    }

    execute(page, job, args, source).await
}
