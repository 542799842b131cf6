//! `listing-scraper replay <files|dir>`: run a job over saved HTML pages.

use crate::cli::output;
use crate::cli::run::{execute, RunArgs};
use crate::config::load_job;
use anyhow::Result;
use listing_scraper::SnapshotPage;
use std::path::PathBuf;

/// Run the replay command.
///
/// A single directory argument loads every `.html`/`.htm` file in it, in
/// name order; otherwise the files are used in the order given. Without
/// `--pages`, every saved page is in budget.
pub async fn run(inputs: &[PathBuf], args: &RunArgs) -> Result<()> {
    let (job, source) = load_job(args.job.as_deref())?;
    let mut page = open_snapshots(inputs)?;
    tracing::info!(pages = page.len(), job = %source, "replaying snapshots");

    let mut args = args.clone();
    if args.pages.is_none() {
        args.pages = Some(u32::try_from(page.len()).unwrap_or(u32::MAX));
    }

    let report = execute(&mut page, &job, &args, source.to_string()).await?;
    output::print_report(&report);
    Ok(())
}

pub fn open_snapshots(inputs: &[PathBuf]) -> Result<SnapshotPage> {
    match inputs {
        [dir] if dir.is_dir() => SnapshotPage::from_dir(dir),
        files => SnapshotPage::from_paths(files),
    }
}
