//! `listing-scraper init`: write the built-in job as a starting point.

use crate::cli::output;
use crate::config::{CARRIER_DIRECTORY_PRESET, LOCAL_JOB_FILE};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Write the preset job file to `path` (default `./listing-job.json`).
pub fn run(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(LOCAL_JOB_FILE));
    write_preset(&path, force)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({ "written": path.display().to_string() }));
    } else {
        println!("Wrote {}", path.display());
        println!("  Edit the selectors and schema, then run `listing-scraper scrape <url>`.");
    }
    Ok(())
}

pub fn write_preset(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, CARRIER_DIRECTORY_PRESET)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
