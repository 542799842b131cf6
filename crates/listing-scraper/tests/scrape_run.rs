//! End-to-end runs of the scraping loop over HTML snapshots.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use listing_scraper::*;

// ─────────────────────── helpers ───────────────────────

/// A listing page with one `div.e` per name and an optional next button.
fn listing(names: &[&str], next: Next) -> String {
    let mut html = String::from("<html><body><section>");
    for name in names {
        html.push_str(&format!(
            "<div class='e'><b class='name'>{name}</b><a href='mailto:{name}@Example.com'>mail</a></div>"
        ));
    }
    html.push_str("</section>");
    match next {
        Next::Enabled => html.push_str("<button class='next'>Next</button>"),
        Next::Disabled => html.push_str("<button class='next' disabled>Next</button>"),
        Next::Absent => {}
    }
    html.push_str("</body></html>");
    html
}

#[derive(Clone, Copy)]
enum Next {
    Enabled,
    Disabled,
    Absent,
}

fn name_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::text("Name", "b.name"),
        FieldSpec::attribute("Email", "a[href^='mailto:']", "href")
            .strip_prefix("mailto:")
            .lowercase()
            .or_substitute("N/A"),
    ])
    .unwrap()
}

fn config(budget: u32) -> ScrapeConfig {
    ScrapeConfig::new("div.e", "button.next")
        .with_page_budget(budget)
        .without_waits()
}

async fn run(pages: Vec<String>, budget: u32) -> (ScrapeResult, SnapshotPage) {
    let mut page = SnapshotPage::from_html(pages);
    let mut orchestrator = ScrapeOrchestrator::new(name_schema(), config(budget)).unwrap();
    let result = orchestrator.run(&mut page, None).await;
    (result, page)
}

fn names(result: &ScrapeResult) -> Vec<&str> {
    result
        .records
        .iter()
        .map(|r| r.get("Name").unwrap())
        .collect()
}

/// Records page indices and URLs as observers see them.
#[derive(Clone, Default)]
struct Seen {
    pages: Arc<Mutex<Vec<(u32, String)>>>,
    finished: Arc<Mutex<Option<u32>>>,
    cancel_after: Option<(u32, CancelHandle)>,
}

#[async_trait]
impl PageObserver for Seen {
    async fn on_page_outcome(&mut self, page: &dyn ListingPage, outcome: &PageOutcome) {
        let url = page.current_url().await.unwrap();
        self.pages.lock().unwrap().push((outcome.page_index, url));
        if let Some((after, cancel)) = &self.cancel_after {
            if outcome.page_index == *after {
                cancel.cancel();
            }
        }
    }

    async fn on_finish(&mut self, result: &ScrapeResult) {
        *self.finished.lock().unwrap() = Some(result.pages_completed);
    }
}

// ─────────────────────── budget ───────────────────────

#[tokio::test]
async fn test_budget_exhaustion_reads_every_page() {
    let pages = vec![
        listing(&["a", "b"], Next::Enabled),
        listing(&["c"], Next::Enabled),
        listing(&["d", "e"], Next::Enabled),
        listing(&["never"], Next::Absent),
    ];
    let (result, page) = run(pages, 3).await;

    assert_eq!(names(&result), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(result.termination, Termination::Exhausted);
    assert_eq!(result.pages_completed, 3);
    assert_eq!(result.pages_attempted, 3);
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(page.current_index(), 2);

    let advanced: Vec<bool> = result.outcomes.iter().map(|o| o.advanced).collect();
    assert_eq!(advanced, vec![true, true, false]);
    assert!(result.outcomes.iter().all(|o| o.stop_reason.is_none()));
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.status() == PageStatus::Succeeded));
}

#[tokio::test]
async fn test_last_page_without_control_exhausts_budget() {
    let pages = vec![
        listing(&["a"], Next::Enabled),
        listing(&["b"], Next::Enabled),
        listing(&["c"], Next::Absent),
    ];
    let (result, _) = run(pages, 3).await;

    assert_eq!(result.termination, Termination::Exhausted);
    assert_eq!(result.pages_completed, 3);
    assert_eq!(result.pages_attempted, 3);
    assert_eq!(names(&result), vec!["a", "b", "c"]);
    assert!(result.outcomes.iter().all(|o| o.stop_reason.is_none()));
}

#[tokio::test]
async fn test_replay_dir_keeps_numeric_page_order() {
    let dir = tempfile::tempdir().unwrap();
    for n in 1..=10 {
        let next = if n < 10 { Next::Enabled } else { Next::Absent };
        let name = n.to_string();
        std::fs::write(
            dir.path().join(format!("page-{n}.html")),
            listing(&[name.as_str()], next),
        )
        .unwrap();
    }

    let mut page = SnapshotPage::from_dir(dir.path()).unwrap();
    let mut orchestrator = ScrapeOrchestrator::new(name_schema(), config(10)).unwrap();
    let result = orchestrator.run(&mut page, None).await;

    let expected: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
    assert_eq!(names(&result), expected);
    assert_eq!(result.termination, Termination::Exhausted);
    assert_eq!(result.pages_completed, 10);
}

#[tokio::test]
async fn test_records_follow_page_then_document_order() {
    let pages = vec![
        listing(&["z", "y"], Next::Enabled),
        listing(&["x", "w"], Next::Absent),
    ];
    let (result, _) = run(pages, 2).await;
    assert_eq!(names(&result), vec!["z", "y", "x", "w"]);
    assert_eq!(result.records[0].get("Email"), Some("z@example.com"));
}

// ─────────────────────── early stops ───────────────────────

#[tokio::test]
async fn test_missing_control_stops_early_and_keeps_records() {
    let pages = vec![
        listing(&["a", "b"], Next::Enabled),
        listing(&["c"], Next::Absent),
    ];
    let (result, _) = run(pages, 5).await;

    assert_eq!(names(&result), vec!["a", "b", "c"]);
    assert_eq!(
        result.termination,
        Termination::Stopped {
            reason: StopReason::NoMoreControl
        }
    );
    assert_eq!(result.pages_completed, 2);
    assert_eq!(result.pages_attempted, 3);
    assert!(result.pages_completed < result.pages_attempted);
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[1].stop_reason, Some(StopReason::NoMoreControl));
    assert!(!result.outcomes[1].advanced);
    assert_eq!(result.outcomes[1].status(), PageStatus::PartiallyFailed);
}

#[tokio::test]
async fn test_disabled_control_counts_as_missing() {
    let pages = vec![
        listing(&["a"], Next::Disabled),
        listing(&["unreachable"], Next::Absent),
    ];
    let (result, page) = run(pages, 4).await;

    assert_eq!(names(&result), vec!["a"]);
    assert_eq!(result.stop_reason(), Some(&StopReason::NoMoreControl));
    assert_eq!(page.current_index(), 0);
}

#[tokio::test]
async fn test_navigation_failure_stops_run() {
    // Page 2 offers a next button, but there is no page 3 to settle on.
    let pages = vec![
        listing(&["a"], Next::Enabled),
        listing(&["b"], Next::Enabled),
    ];
    let (result, _) = run(pages, 5).await;

    assert_eq!(names(&result), vec!["a", "b"]);
    assert!(matches!(
        result.stop_reason(),
        Some(StopReason::NavigationTimeout { .. })
    ));
    assert_eq!(result.pages_completed, 2);
    assert_eq!(result.pages_attempted, 3);
}

#[tokio::test]
async fn test_consecutive_empty_pages_halt() {
    let pages = vec![
        listing(&[], Next::Enabled),
        listing(&[], Next::Enabled),
        listing(&["late"], Next::Enabled),
    ];
    let (result, page) = run(pages, 5).await;

    assert!(result.records.is_empty());
    assert_eq!(
        result.stop_reason(),
        Some(&StopReason::EmptyPages { consecutive: 2 })
    );
    assert_eq!(result.pages_completed, 2);
    assert_eq!(result.pages_attempted, 2);
    assert_eq!(page.current_index(), 1);
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.page_failure == Some(PageFailure::NoEntriesFound)));
    assert_eq!(result.outcomes[0].status(), PageStatus::Aborted);
}

#[tokio::test]
async fn test_single_empty_page_does_not_halt() {
    let pages = vec![
        listing(&[], Next::Enabled),
        listing(&["b"], Next::Enabled),
        listing(&[], Next::Enabled),
    ];
    let (result, _) = run(pages, 3).await;

    assert_eq!(names(&result), vec!["b"]);
    assert!(result.termination.is_exhausted());
    assert_eq!(result.pages_completed, 3);
}

// ─────────────────────── entry failures ───────────────────────

#[tokio::test]
async fn test_dropped_entries_are_counted_per_page() {
    let schema = Schema::new(vec![
        FieldSpec::text("Name", "b.name"),
        FieldSpec::text("Phone", "span.phone"),
    ])
    .unwrap();
    let pages = vec![
        "<div class='e'><b class='name'>a</b><span class='phone'>1</span></div>\
         <div class='e'><b class='name'>b</b></div>\
         <button class='next'>Next</button>"
            .to_string(),
        "<div class='e'><b class='name'>c</b></div>".to_string(),
    ];
    let mut page = SnapshotPage::from_html(pages);
    let mut orchestrator = ScrapeOrchestrator::new(schema, config(2)).unwrap();
    let result = orchestrator.run(&mut page, None).await;

    assert_eq!(result.records.len(), 1);
    assert_eq!(result.entry_failure_count(), 2);
    assert_eq!(result.outcomes[0].entry_failures[0].entry_index, 1);
    assert_eq!(
        result.outcomes[1].entry_failures[0].reason,
        EntryFailureReason::FieldMissing {
            field: "Phone".to_string()
        }
    );
    assert!(result.termination.is_exhausted());
}

// ─────────────────────── cancellation ───────────────────────

#[tokio::test]
async fn test_cancel_before_run_finishes_current_page() {
    let pages = vec![
        listing(&["a"], Next::Enabled),
        listing(&["b"], Next::Enabled),
    ];
    let mut page = SnapshotPage::from_html(pages);
    let mut orchestrator = ScrapeOrchestrator::new(name_schema(), config(2)).unwrap();
    let cancel = CancelHandle::new();
    cancel.cancel();
    let result = orchestrator.run(&mut page, Some(&cancel)).await;

    assert_eq!(names(&result), vec!["a"]);
    assert_eq!(result.stop_reason(), Some(&StopReason::Cancelled));
    assert_eq!(result.pages_completed, 1);
    assert_eq!(result.pages_attempted, 1);
    assert_eq!(page.current_index(), 0);
}

#[tokio::test]
async fn test_cancel_mid_run_from_observer() {
    let pages = vec![
        listing(&["a"], Next::Enabled),
        listing(&["b"], Next::Enabled),
        listing(&["c"], Next::Enabled),
    ];
    let cancel = CancelHandle::new();
    let seen = Seen {
        cancel_after: Some((2, cancel.clone())),
        ..Seen::default()
    };
    let mut page = SnapshotPage::from_html(pages);
    let mut orchestrator = ScrapeOrchestrator::new(name_schema(), config(3))
        .unwrap()
        .with_observer(seen.clone());
    let result = orchestrator.run(&mut page, Some(&cancel)).await;

    assert_eq!(names(&result), vec!["a", "b"]);
    assert_eq!(result.outcomes[1].stop_reason, Some(StopReason::Cancelled));
}

// ─────────────────────── observation ───────────────────────

#[tokio::test]
async fn test_observer_sees_each_page_before_advancing() {
    let pages = vec![
        listing(&["a"], Next::Enabled),
        listing(&["b"], Next::Absent),
    ];
    let seen = Seen::default();
    let mut page = SnapshotPage::from_html(pages);
    let mut orchestrator = ScrapeOrchestrator::new(name_schema(), config(2))
        .unwrap()
        .with_observer(seen.clone());
    orchestrator.run(&mut page, None).await;

    assert_eq!(
        *seen.pages.lock().unwrap(),
        vec![
            (1, "snapshot://1".to_string()),
            (2, "snapshot://2".to_string())
        ]
    );
    assert_eq!(*seen.finished.lock().unwrap(), Some(2));
}

#[tokio::test]
async fn test_outcome_log_matches_result_and_resets() {
    let mut orchestrator = ScrapeOrchestrator::new(name_schema(), config(3)).unwrap();
    let log = orchestrator.outcome_log();

    let mut first = SnapshotPage::from_html(vec![
        listing(&["a"], Next::Enabled),
        listing(&["b"], Next::Enabled),
        listing(&["c"], Next::Absent),
    ]);
    let result = orchestrator.run(&mut first, None).await;
    assert_eq!(log.len(), 3);
    assert_eq!(log.snapshot(), result.outcomes);

    let mut second = SnapshotPage::from_html(vec![listing(&["d"], Next::Absent)]);
    let result = orchestrator.run(&mut second, None).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log.latest().unwrap().stop_reason, Some(StopReason::NoMoreControl));
    assert_eq!(result.outcomes.len(), 1);
}

#[tokio::test]
async fn test_result_serializes_with_termination() {
    let (result, _) = run(vec![listing(&["a"], Next::Absent)], 2).await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["termination"]["state"], "stopped");
    assert_eq!(json["termination"]["reason"]["kind"], "no_more_control");
    assert_eq!(json["records"][0]["Name"], "a");
    assert_eq!(json["pages_completed"], 1);
}

// ─────────────────────── configuration ───────────────────────

#[test]
fn test_invalid_configuration_rejected_up_front() {
    assert_eq!(
        Schema::new(vec![FieldSpec::text("A", "b"), FieldSpec::text("A", "i")]),
        Err(ConfigError::DuplicateField("A".to_string()))
    );
    assert!(matches!(
        ScrapeOrchestrator::new(name_schema(), config(0)),
        Err(ConfigError::ZeroBudget)
    ));
    assert!(matches!(
        ScrapeOrchestrator::new(name_schema(), ScrapeConfig::new("div.e", "")),
        Err(ConfigError::InvalidSelector { .. })
    ));
}

#[test]
fn test_schema_from_json() {
    let schema: Schema = serde_json::from_str(
        r#"[
            {"name": "Type", "locator": "p.kind"},
            {"name": "Email", "locator": "a", "accessor": {"attribute": "href"},
             "transform": [{"strip_prefix": "mailto:"}, "lowercase"],
             "on_missing": {"substitute": "N/A"}}
        ]"#,
    )
    .unwrap();
    assert_eq!(schema.column_names(), vec!["Type", "Email"]);

    let duplicate = serde_json::from_str::<Schema>(
        r#"[{"name": "A", "locator": "b"}, {"name": "A", "locator": "i"}]"#,
    );
    assert!(duplicate.is_err());
}
