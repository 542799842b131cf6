//! Pagination state machine.
//!
//! ```text
//! Ready ──extract──▶ Extracting ──done──▶ Advancing ──advanced──▶ Ready (next page)
//!                         │                   │
//!                         └─ budget spent ─▶ Exhausted
//!                                             └─ no control / nav failure / halt ─▶ Stopped
//! ```
//!
//! The state is a plain value. [`PaginationController::on`] is a pure
//! transition function; [`PaginationController::advance`] does the browser
//! work of the `Advancing` state and reports it as an event.

use crate::error::TransitionError;
use crate::locator::wait_for_any;
use crate::page::ListingPage;
use crate::types::StopReason;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationState {
    /// Page is settled and can be extracted.
    Ready { page_index: u32 },
    /// Records are being pulled from the page.
    Extracting { page_index: u32 },
    /// Looking for and activating the "next" control.
    Advancing { page_index: u32 },
    /// The page budget is used up.
    Exhausted { pages: u32 },
    /// Pagination ended early on `page_index`.
    Stopped { page_index: u32, reason: StopReason },
}

impl PaginationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Stopped { .. })
    }

    /// The page this state refers to. For `Exhausted`, the last page.
    pub fn page_index(&self) -> u32 {
        match self {
            Self::Ready { page_index }
            | Self::Extracting { page_index }
            | Self::Advancing { page_index }
            | Self::Stopped { page_index, .. } => *page_index,
            Self::Exhausted { pages } => *pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationEvent {
    ExtractRequested,
    ExtractionFinished,
    /// The next control was activated and the new page settled.
    Advanced,
    /// The next control is absent or cannot be activated.
    ControlMissing,
    /// Activation or the settle wait failed.
    NavigationFailed(String),
    /// Stop before touching the control (cancellation, empty pages).
    Halt(StopReason),
}

/// Settings for the "next page" step.
#[derive(Debug, Clone)]
pub struct PaginationController {
    budget: u32,
    next_selector: String,
    control_timeout: Duration,
    settle_timeout: Duration,
    poll_interval: Duration,
}

impl PaginationController {
    pub fn new(
        budget: u32,
        next_selector: impl Into<String>,
        control_timeout: Duration,
        settle_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            budget,
            next_selector: next_selector.into(),
            control_timeout,
            settle_timeout,
            poll_interval,
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// The initial state: page 1, ready.
    pub fn start(&self) -> PaginationState {
        PaginationState::Ready { page_index: 1 }
    }

    /// Apply `event` to `state`.
    pub fn on(
        &self,
        state: PaginationState,
        event: PaginationEvent,
    ) -> Result<PaginationState, TransitionError> {
        use PaginationEvent as E;
        use PaginationState as S;

        match (state, event) {
            (S::Ready { page_index }, E::ExtractRequested) => Ok(S::Extracting { page_index }),
            (S::Extracting { page_index }, E::ExtractionFinished) => {
                if page_index >= self.budget {
                    Ok(S::Exhausted { pages: page_index })
                } else {
                    Ok(S::Advancing { page_index })
                }
            }
            (S::Advancing { page_index }, E::Advanced) => Ok(S::Ready {
                page_index: page_index + 1,
            }),
            (S::Advancing { page_index }, E::ControlMissing) => Ok(S::Stopped {
                page_index,
                reason: StopReason::NoMoreControl,
            }),
            (S::Advancing { page_index }, E::NavigationFailed(detail)) => Ok(S::Stopped {
                page_index,
                reason: StopReason::NavigationTimeout { detail },
            }),
            (S::Advancing { page_index }, E::Halt(reason)) => {
                Ok(S::Stopped { page_index, reason })
            }
            (state, event) => Err(TransitionError { state, event }),
        }
    }

    /// Do the work of the `Advancing` state.
    ///
    /// A disabled or hidden control counts as absent: that is how most
    /// listings mark their last page.
    pub async fn advance(&self, page: &mut dyn ListingPage) -> PaginationEvent {
        let controls = match wait_for_any(
            page,
            None,
            &self.next_selector,
            self.control_timeout,
            self.poll_interval,
        )
        .await
        {
            Ok(controls) => controls,
            Err(e) => {
                tracing::warn!("next control lookup failed: {e:#}");
                return PaginationEvent::ControlMissing;
            }
        };

        let Some(control) = controls.into_iter().next() else {
            tracing::info!(selector = %self.next_selector, "no next control");
            return PaginationEvent::ControlMissing;
        };

        match page.is_interactable(control).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("next control is disabled");
                return PaginationEvent::ControlMissing;
            }
            Err(e) => {
                tracing::warn!("next control check failed: {e:#}");
                return PaginationEvent::ControlMissing;
            }
        }

        if let Err(e) = page.activate(control).await {
            return PaginationEvent::NavigationFailed(format!("{e:#}"));
        }
        match page.wait_settled(self.settle_timeout).await {
            Ok(()) => PaginationEvent::Advanced,
            Err(e) => PaginationEvent::NavigationFailed(format!("{e:#}")),
        }
    }
}
