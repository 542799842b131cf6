//! Terminal output: global flags, JSON printing, and run summaries.

use crate::cli::run::RunReport;
use listing_scraper::{PageStatus, ScrapeResult};
use serde::Serialize;

const JSON_ENV: &str = "LISTING_SCRAPER_JSON";

/// Set by `--json`: print machine-readable output only.
pub fn set_json(enabled: bool) {
    if enabled {
        std::env::set_var(JSON_ENV, "1");
    }
}

pub fn is_json() -> bool {
    std::env::var(JSON_ENV).is_ok()
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    source: String,
    exported: Vec<String>,
    export_errors: &'a [String],
    #[serde(flatten)]
    result: &'a ScrapeResult,
}

/// Print the outcome of a run, as a summary or as JSON.
pub fn print_report(report: &RunReport) {
    if is_json() {
        print_json(&JsonReport {
            source: report.source.clone(),
            exported: report
                .exported
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            export_errors: &report.export_errors,
            result: &report.result,
        });
        return;
    }

    let result = &report.result;
    println!();
    println!("Scrape finished ({})", report.source);
    println!("  Run:       {}", result.run_id);
    println!(
        "  Pages:     {} completed, {} attempted",
        result.pages_completed, result.pages_attempted
    );
    println!("  Records:   {}", result.records.len());
    println!("  Dropped:   {} entries", result.entry_failure_count());
    match result.stop_reason() {
        None => println!("  Ended:     page budget reached"),
        Some(reason) => println!("  Ended:     stopped early ({reason})"),
    }
    println!("  Elapsed:   {}ms", result.elapsed_ms);

    let troubled: Vec<_> = result
        .outcomes
        .iter()
        .filter(|o| o.status() != PageStatus::Succeeded)
        .collect();
    if !troubled.is_empty() {
        println!();
        for outcome in troubled {
            let mut notes = Vec::new();
            if let Some(failure) = &outcome.page_failure {
                notes.push(failure.to_string());
            }
            if !outcome.entry_failures.is_empty() {
                notes.push(format!("{} entries dropped", outcome.entry_failures.len()));
            }
            if let Some(reason) = &outcome.stop_reason {
                notes.push(format!("stopped: {reason}"));
            }
            println!("  [!!] page {}: {}", outcome.page_index, notes.join(", "));
        }
    }

    println!();
    if result.records.is_empty() {
        println!("No data was scraped. Check the selectors against the page and try again.");
    } else {
        if report.exported.is_empty() && report.export_errors.is_empty() {
            println!("Nothing exported.");
        }
        for path in &report.exported {
            println!("  Wrote {}", path.display());
        }
        for error in &report.export_errors {
            println!("  [!!] export failed: {error}");
        }
    }
}
