//! Run configuration: selectors, page budget, and timeouts.

use crate::error::{validate_selector, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait for the first entry node to render.
pub const DEFAULT_ENTRY_TIMEOUT_MS: u64 = 30_000;
/// How long to keep looking for one field inside an entry.
pub const DEFAULT_FIELD_TIMEOUT_MS: u64 = 200;
/// How long to look for the "next" control.
pub const DEFAULT_CONTROL_TIMEOUT_MS: u64 = 2_000;
/// How long a page may take to settle after "next" is activated.
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Empty pages in a row before the run gives up.
pub const DEFAULT_MAX_CONSECUTIVE_EMPTY: u32 = 2;

fn default_page_budget() -> u32 {
    1
}
fn default_entry_timeout_ms() -> u64 {
    DEFAULT_ENTRY_TIMEOUT_MS
}
fn default_field_timeout_ms() -> u64 {
    DEFAULT_FIELD_TIMEOUT_MS
}
fn default_control_timeout_ms() -> u64 {
    DEFAULT_CONTROL_TIMEOUT_MS
}
fn default_settle_timeout_ms() -> u64 {
    DEFAULT_SETTLE_TIMEOUT_MS
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_max_consecutive_empty() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_EMPTY
}

/// Everything the scraping loop needs besides the schema and the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Selector for the repeated entry containers.
    pub entry_selector: String,
    /// Selector for the "next page" control.
    pub next_selector: String,
    #[serde(default = "default_page_budget")]
    pub page_budget: u32,
    #[serde(default = "default_entry_timeout_ms")]
    pub entry_timeout_ms: u64,
    #[serde(default = "default_field_timeout_ms")]
    pub field_timeout_ms: u64,
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_consecutive_empty")]
    pub max_consecutive_empty: u32,
}

impl ScrapeConfig {
    pub fn new(entry_selector: impl Into<String>, next_selector: impl Into<String>) -> Self {
        Self {
            entry_selector: entry_selector.into(),
            next_selector: next_selector.into(),
            page_budget: default_page_budget(),
            entry_timeout_ms: DEFAULT_ENTRY_TIMEOUT_MS,
            field_timeout_ms: DEFAULT_FIELD_TIMEOUT_MS,
            control_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            settle_timeout_ms: DEFAULT_SETTLE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_consecutive_empty: DEFAULT_MAX_CONSECUTIVE_EMPTY,
        }
    }

    pub fn with_page_budget(mut self, pages: u32) -> Self {
        self.page_budget = pages;
        self
    }

    /// Set every wait to zero: each lookup happens exactly once. Meant for
    /// static pages where nothing renders late.
    pub fn without_waits(mut self) -> Self {
        self.entry_timeout_ms = 0;
        self.field_timeout_ms = 0;
        self.control_timeout_ms = 0;
        self.settle_timeout_ms = 0;
        self
    }

    pub fn with_max_consecutive_empty(mut self, pages: u32) -> Self {
        self.max_consecutive_empty = pages;
        self
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        validate_selector("entry selector", &self.entry_selector)?;
        validate_selector("next selector", &self.next_selector)?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_consecutive_empty == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "max_consecutive_empty",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }

    pub fn field_timeout(&self) -> Duration {
        Duration::from_millis(self.field_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
