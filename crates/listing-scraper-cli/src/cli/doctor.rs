//! Environment readiness check.

use crate::cli::output;
use crate::config::{resolve_job_path, JobConfig, JOB_PATH_ENV};
use anyhow::Result;
use listing_scraper::page::chromium::{find_chromium, CHROMIUM_PATH_ENV};

/// Check Chromium availability and which job file would be used.
pub fn run() -> Result<()> {
    let chromium = find_chromium();
    let job_path = resolve_job_path(None);
    let job = match &job_path {
        Some(path) => JobConfig::load(path).map(|_| ()),
        None => JobConfig::preset().map(|_| ()),
    };
    let ready = chromium.is_some() && job.is_ok();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "job": job_path.as_ref().map(|p| p.display().to_string()),
            "job_error": job.as_ref().err().map(|e| format!("{e:#}")),
            "ready": ready,
        }));
        return Ok(());
    }

    println!("listing-scraper doctor");
    println!("======================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set {CHROMIUM_PATH_ENV}."
        ),
    }

    match (&job_path, &job) {
        (Some(path), Ok(())) => println!("[OK] Job file: {}", path.display()),
        (Some(path), Err(e)) => println!("[!!] Job file {} is invalid: {e:#}", path.display()),
        (None, Ok(())) => println!(
            "[OK] No job file ({JOB_PATH_ENV}, ./listing-job.json, ~/.listing-scraper/job.json); using the built-in preset"
        ),
        (None, Err(e)) => println!("[!!] Built-in preset is invalid: {e:#}"),
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
