//! Records, per-page outcomes, and the result of a run.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One extracted entry: field name to value, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    values: Vec<(String, String)>,
}

impl Record {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, name: &str, value: String) {
        self.values.push((name.to_string(), value));
    }

    /// Look up a value by field name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values in schema order, e.g. for a CSV row.
    pub fn values(&self) -> Vec<&str> {
        self.values.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Why a single entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryFailureReason {
    /// A `fail_entry` field had no match inside the entry.
    FieldMissing { field: String },
    /// The driver failed while reading a located field.
    FieldUnreadable { field: String, detail: String },
}

impl fmt::Display for EntryFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldMissing { field } => write!(f, "field missing: {field}"),
            Self::FieldUnreadable { field, detail } => {
                write!(f, "field unreadable: {field} ({detail})")
            }
        }
    }
}

/// A dropped entry and its position on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    /// Zero-based index of the entry in document order.
    pub entry_index: usize,
    pub reason: EntryFailureReason,
}

/// Page-level condition raised while locating entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageFailure {
    /// No entry node appeared before the timeout.
    NoEntriesFound,
    /// The entry query itself failed.
    EntryLookupFailed { detail: String },
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEntriesFound => write!(f, "no entries found"),
            Self::EntryLookupFailed { detail } => write!(f, "entry lookup failed: {detail}"),
        }
    }
}

/// Why pagination stopped before the budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// The "next" control is absent, disabled, or not interactable.
    NoMoreControl,
    /// Activating the control or waiting for the page to settle failed.
    NavigationTimeout { detail: String },
    /// Too many pages in a row produced no entries.
    EmptyPages { consecutive: u32 },
    /// The caller cancelled the run.
    Cancelled,
    /// The state machine rejected a transition.
    InvalidTransition { detail: String },
}

impl StopReason {
    /// Whether this stop means the run failed to reach a further page.
    pub fn is_failed_advance(&self) -> bool {
        matches!(self, Self::NoMoreControl | Self::NavigationTimeout { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMoreControl => write!(f, "no more control"),
            Self::NavigationTimeout { detail } => write!(f, "navigation timeout: {detail}"),
            Self::EmptyPages { consecutive } => {
                write!(f, "{consecutive} consecutive empty pages")
            }
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidTransition { detail } => write!(f, "{detail}"),
        }
    }
}

/// Summary status of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Succeeded,
    PartiallyFailed,
    Aborted,
}

/// What happened on one page. Appended once per extracted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// One-based page number within the run.
    pub page_index: u32,
    pub records_extracted: usize,
    pub entry_failures: Vec<EntryFailure>,
    /// Extraction-level condition (no entries, lookup failure).
    pub page_failure: Option<PageFailure>,
    /// Set on the page where pagination stopped early.
    pub stop_reason: Option<StopReason>,
    /// Whether the run moved on to the next page from here.
    pub advanced: bool,
    pub elapsed_ms: u64,
}

impl PageOutcome {
    pub fn status(&self) -> PageStatus {
        if self.page_failure.is_some() {
            PageStatus::Aborted
        } else if !self.entry_failures.is_empty() || self.stop_reason.is_some() {
            PageStatus::PartiallyFailed
        } else {
            PageStatus::Succeeded
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Termination {
    /// The page budget was used up.
    Exhausted,
    /// Pagination stopped early.
    Stopped { reason: StopReason },
}

impl Termination {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// The terminal artifact of one run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub run_id: String,
    pub records: Vec<Record>,
    pub outcomes: Vec<PageOutcome>,
    /// Pages the run tried to process, including one it failed to reach.
    pub pages_attempted: u32,
    /// Pages whose extraction finished.
    pub pages_completed: u32,
    pub termination: Termination,
    pub elapsed_ms: u64,
}

impl ScrapeResult {
    /// Total dropped entries across all pages.
    pub fn entry_failure_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.entry_failures.len()).sum()
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        match &self.termination {
            Termination::Exhausted => None,
            Termination::Stopped { reason } => Some(reason),
        }
    }
}
