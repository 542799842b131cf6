//! Error types for configuration and state-machine misuse.
//!
//! Nothing in this module is produced by a run in progress: configuration
//! errors are raised at construction time, and transition errors are turned
//! into a stop reason by the orchestrator.

use crate::pagination::{PaginationEvent, PaginationState};

/// Rejected schema or scrape configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Schema has no fields")]
    EmptySchema,

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Field #{0} has a blank name")]
    BlankFieldName(usize),

    #[error("Field {field:?} has a blank {what}")]
    BlankValue { field: String, what: &'static str },

    #[error("Invalid selector for {context}: {selector:?} ({reason})")]
    InvalidSelector {
        context: String,
        selector: String,
        reason: String,
    },

    #[error("Page budget must be at least 1")]
    ZeroBudget,

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// An event that the current pagination state cannot accept.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid pagination transition: {event:?} while {state:?}")]
pub struct TransitionError {
    pub state: PaginationState,
    pub event: PaginationEvent,
}

/// Convenience result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Check that `selector` parses as a CSS selector.
pub(crate) fn validate_selector(context: &str, selector: &str) -> ConfigResult<()> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            context: context.to_string(),
            selector: selector.to_string(),
            reason: e.to_string(),
        })
}
