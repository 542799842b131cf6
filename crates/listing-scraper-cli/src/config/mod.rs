//! Job file loading and resolution.
//!
//! A job file is the JSON form of one scrape: target URL, selectors,
//! schema, and timeouts. Every timeout has a default, so the smallest useful
//! job names the two selectors and a schema.

use anyhow::{Context, Result};
use listing_scraper::{ScrapeConfig, Schema};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a job file.
pub const JOB_PATH_ENV: &str = "LISTING_SCRAPER_JOB";

/// Job file looked up in the working directory.
pub const LOCAL_JOB_FILE: &str = "listing-job.json";

/// The carrier-directory job that ships with the binary.
pub const CARRIER_DIRECTORY_PRESET: &str = include_str!("../../presets/carrier_directory.json");

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

/// One scrape job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Start URL. Can be given on the command line instead.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub scrape: ScrapeConfig,
    pub schema: Schema,
    /// Pause after the first page opens, for logging in by hand.
    #[serde(default)]
    pub login_wait_ms: u64,
    /// Wait for this selector before the first extraction.
    #[serde(default)]
    pub ready_selector: Option<String>,
    /// Pause after clicking "next" before checking that the page settled.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

impl JobConfig {
    /// Parse and validate a job from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let job: JobConfig = serde_json::from_str(text).context("invalid job file")?;
        job.scrape.validate()?;
        Ok(job)
    }

    /// Load a job file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job file: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// The built-in carrier-directory job.
    pub fn preset() -> Result<Self> {
        Self::from_json(CARRIER_DIRECTORY_PRESET)
    }

    pub fn login_wait(&self) -> Duration {
        Duration::from_millis(self.login_wait_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// Where a loaded job came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    File(PathBuf),
    Preset,
}

impl std::fmt::Display for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobSource::File(path) => write!(f, "{}", path.display()),
            JobSource::Preset => write!(f, "built-in carrier-directory preset"),
        }
    }
}

/// Resolve the job file path: explicit flag, then `LISTING_SCRAPER_JOB`,
/// then `./listing-job.json`, then `~/.listing-scraper/job.json`.
pub fn resolve_job_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(JOB_PATH_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_job = PathBuf::from(LOCAL_JOB_FILE);
    if cwd_job.exists() {
        return Some(cwd_job);
    }

    let home_job = default_job_path()?;
    home_job.exists().then_some(home_job)
}

/// `~/.listing-scraper/job.json`.
pub fn default_job_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".listing-scraper").join("job.json"))
}

/// Load the resolved job, or the preset when no job file exists.
pub fn load_job(explicit: Option<&Path>) -> Result<(JobConfig, JobSource)> {
    match resolve_job_path(explicit) {
        Some(path) => {
            let job = JobConfig::load(&path)?;
            tracing::debug!(path = %path.display(), "job loaded");
            Ok((job, JobSource::File(path)))
        }
        None => {
            tracing::debug!("no job file found, using preset");
            Ok((JobConfig::preset()?, JobSource::Preset))
        }
    }
}
