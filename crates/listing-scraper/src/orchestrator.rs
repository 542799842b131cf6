//! The scraping loop.
//!
//! [`ScrapeOrchestrator`] drives the pagination state machine over a borrowed
//! page: extract, record the outcome, advance, repeat until the budget is
//! spent or pagination stops. Failures are folded into the result; a run
//! always returns a [`ScrapeResult`], whatever the page does.

use crate::config::ScrapeConfig;
use crate::error::ConfigResult;
use crate::extractor::{FieldExtractor, RecordExtractor};
use crate::locator::EntryLocator;
use crate::page::ListingPage;
use crate::pagination::{PaginationController, PaginationEvent, PaginationState};
use crate::progress::{CancelHandle, OutcomeLog, PageObserver};
use crate::schema::Schema;
use crate::types::{PageOutcome, ScrapeResult, StopReason, Termination};
use std::time::Instant;

pub struct ScrapeOrchestrator {
    schema: Schema,
    config: ScrapeConfig,
    extractor: RecordExtractor,
    controller: PaginationController,
    observers: Vec<Box<dyn PageObserver>>,
    log: OutcomeLog,
}

impl ScrapeOrchestrator {
    /// Build an orchestrator after validating the configuration.
    pub fn new(schema: Schema, config: ScrapeConfig) -> ConfigResult<Self> {
        config.validate()?;

        let extractor = RecordExtractor::new(
            EntryLocator::new(
                config.entry_selector.clone(),
                config.entry_timeout(),
                config.poll_interval(),
            ),
            FieldExtractor::new(config.field_timeout(), config.poll_interval()),
        );
        let controller = PaginationController::new(
            config.page_budget,
            config.next_selector.clone(),
            config.control_timeout(),
            config.settle_timeout(),
            config.poll_interval(),
        );

        Ok(Self {
            schema,
            config,
            extractor,
            controller,
            observers: Vec::new(),
            log: OutcomeLog::new(),
        })
    }

    /// Add an observer, called once per extracted page.
    pub fn with_observer(mut self, observer: impl PageObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn PageObserver>) {
        self.observers.push(observer);
    }

    /// A handle on the outcome log. It is cleared when a run starts.
    pub fn outcome_log(&self) -> OutcomeLog {
        self.log.clone()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Scrape `page` until the budget is spent or pagination stops.
    ///
    /// The page must already show the first listing page. It is only
    /// borrowed: closing it is the caller's job. `cancel` is checked each
    /// time the run is about to leave a page.
    pub async fn run(
        &mut self,
        page: &mut dyn ListingPage,
        cancel: Option<&CancelHandle>,
    ) -> ScrapeResult {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        self.log.clear();

        tracing::info!(
            run_id = %run_id,
            budget = self.config.page_budget,
            entry_selector = %self.config.entry_selector,
            "scrape started"
        );

        let mut records = Vec::new();
        let mut pages_completed = 0u32;
        let mut consecutive_empty = 0u32;
        let mut state = self.controller.start();

        let termination = loop {
            state = match state {
                PaginationState::Ready { .. } => {
                    self.step(state, PaginationEvent::ExtractRequested)
                }
                PaginationState::Extracting { page_index } => {
                    let page_started = Instant::now();
                    let extraction = self.extractor.extract_page(page, &self.schema).await;
                    pages_completed += 1;

                    if extraction.page_failure.is_some() {
                        consecutive_empty += 1;
                    } else {
                        consecutive_empty = 0;
                    }

                    let outcome = PageOutcome {
                        page_index,
                        records_extracted: extraction.records.len(),
                        entry_failures: extraction.entry_failures,
                        page_failure: extraction.page_failure,
                        stop_reason: None,
                        advanced: false,
                        elapsed_ms: page_started.elapsed().as_millis() as u64,
                    };
                    tracing::info!(
                        page = page_index,
                        records = outcome.records_extracted,
                        dropped = outcome.entry_failures.len(),
                        status = ?outcome.status(),
                        "page extracted"
                    );
                    records.extend(extraction.records);

                    for observer in self.observers.iter_mut() {
                        observer.on_page_outcome(&*page, &outcome).await;
                    }
                    self.log.append(outcome);

                    self.step(state, PaginationEvent::ExtractionFinished)
                }
                PaginationState::Advancing { .. } => {
                    let event = if cancel.is_some_and(CancelHandle::is_cancelled) {
                        PaginationEvent::Halt(StopReason::Cancelled)
                    } else if consecutive_empty >= self.config.max_consecutive_empty {
                        PaginationEvent::Halt(StopReason::EmptyPages {
                            consecutive: consecutive_empty,
                        })
                    } else {
                        self.controller.advance(page).await
                    };

                    let next = self.step(state, event);
                    match &next {
                        PaginationState::Ready { page_index } => {
                            tracing::debug!(page = page_index, "advanced");
                            self.log.update_last(|o| o.advanced = true);
                        }
                        PaginationState::Stopped { reason, .. } => {
                            let reason = reason.clone();
                            self.log.update_last(|o| o.stop_reason = Some(reason));
                        }
                        _ => {}
                    }
                    next
                }
                PaginationState::Exhausted { .. } => break Termination::Exhausted,
                PaginationState::Stopped { reason, .. } => break Termination::Stopped { reason },
            };
        };

        let failed_advance = match &termination {
            Termination::Stopped { reason } => reason.is_failed_advance(),
            Termination::Exhausted => false,
        };
        let result = ScrapeResult {
            run_id,
            records,
            outcomes: self.log.snapshot(),
            pages_attempted: pages_completed + u32::from(failed_advance),
            pages_completed,
            termination,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        match result.stop_reason() {
            None => tracing::info!(
                run_id = %result.run_id,
                pages = result.pages_completed,
                records = result.records.len(),
                elapsed_ms = result.elapsed_ms,
                "scrape finished: page budget exhausted"
            ),
            Some(reason) => tracing::warn!(
                run_id = %result.run_id,
                pages = result.pages_completed,
                records = result.records.len(),
                elapsed_ms = result.elapsed_ms,
                %reason,
                "scrape stopped early"
            ),
        }

        for observer in self.observers.iter_mut() {
            observer.on_finish(&result).await;
        }
        result
    }

    /// Apply a transition. A rejected one stops the run rather than panicking.
    fn step(&self, state: PaginationState, event: PaginationEvent) -> PaginationState {
        let page_index = state.page_index();
        match self.controller.on(state, event) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!("{e}");
                PaginationState::Stopped {
                    page_index,
                    reason: StopReason::InvalidTransition {
                        detail: e.to_string(),
                    },
                }
            }
        }
    }
}
