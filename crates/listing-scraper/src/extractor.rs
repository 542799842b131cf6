//! Field and record extraction.
//!
//! [`FieldExtractor`] reads one field of one entry and applies the field's
//! missing-match policy. [`RecordExtractor`] runs it across every entry on a
//! page, keeping entry failures isolated: a dropped entry is logged and the
//! next one is processed as usual.

use crate::locator::{wait_for_any, EntryLocator};
use crate::page::{ListingPage, NodeHandle};
use crate::schema::{Accessor, FieldSpec, OnMissing, Schema};
use crate::types::{EntryFailure, EntryFailureReason, PageFailure, Record};
use std::time::Duration;

/// A successfully produced field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Read from the page and transformed.
    Found(String),
    /// The locator matched nothing and the policy supplied a sentinel.
    Substituted(String),
}

impl FieldValue {
    pub fn into_string(self) -> String {
        match self {
            FieldValue::Found(v) | FieldValue::Substituted(v) => v,
        }
    }
}

/// Reads single fields, scoped to one entry node.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    timeout: Duration,
    poll_interval: Duration,
}

impl FieldExtractor {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Extract `spec` from `entry`.
    ///
    /// Only descendants of `entry` are searched. A missing node (or missing
    /// attribute) is resolved through `spec.on_missing`; a driver error while
    /// reading fails the entry whatever the policy.
    pub async fn extract(
        &self,
        page: &mut dyn ListingPage,
        entry: NodeHandle,
        spec: &FieldSpec,
    ) -> Result<FieldValue, EntryFailureReason> {
        let unreadable = |e: anyhow::Error| EntryFailureReason::FieldUnreadable {
            field: spec.name.clone(),
            detail: format!("{e:#}"),
        };

        let node = wait_for_any(
            page,
            Some(entry),
            &spec.locator,
            self.timeout,
            self.poll_interval,
        )
        .await
        .map_err(unreadable)?
        .into_iter()
        .next();

        let raw = match node {
            None => None,
            Some(node) => match &spec.accessor {
                Accessor::Text => Some(page.text(node).await.map_err(unreadable)?),
                Accessor::Attribute(name) => page.attribute(node, name).await.map_err(unreadable)?,
            },
        };

        match (raw, &spec.on_missing) {
            (Some(raw), _) => Ok(FieldValue::Found(spec.apply_transform(raw))),
            (None, OnMissing::Substitute(sentinel)) => Ok(FieldValue::Substituted(sentinel.clone())),
            (None, OnMissing::FailEntry) => Err(EntryFailureReason::FieldMissing {
                field: spec.name.clone(),
            }),
        }
    }
}

/// Everything pulled from one page state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub records: Vec<Record>,
    pub entry_failures: Vec<EntryFailure>,
    pub page_failure: Option<PageFailure>,
    /// Entry nodes found, including the dropped ones.
    pub entries_found: usize,
}

/// Turns one page state into records.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    locator: EntryLocator,
    fields: FieldExtractor,
}

impl RecordExtractor {
    pub fn new(locator: EntryLocator, fields: FieldExtractor) -> Self {
        Self { locator, fields }
    }

    /// Extract every entry on the current page, in document order.
    pub async fn extract_page(&self, page: &mut dyn ListingPage, schema: &Schema) -> PageExtraction {
        let located = self.locator.locate(page).await;
        let mut extraction = PageExtraction {
            records: Vec::with_capacity(located.entries.len()),
            entry_failures: Vec::new(),
            page_failure: located.condition,
            entries_found: located.entries.len(),
        };

        for (entry_index, entry) in located.entries.into_iter().enumerate() {
            match self.extract_entry(page, entry, schema).await {
                Ok(record) => extraction.records.push(record),
                Err(reason) => {
                    tracing::debug!(entry_index, %reason, "entry dropped");
                    extraction.entry_failures.push(EntryFailure {
                        entry_index,
                        reason,
                    });
                }
            }
        }

        extraction
    }

    /// Extract one entry. Stops at the first field that fails the entry.
    pub async fn extract_entry(
        &self,
        page: &mut dyn ListingPage,
        entry: NodeHandle,
        schema: &Schema,
    ) -> Result<Record, EntryFailureReason> {
        let mut record = Record::with_capacity(schema.len());
        for spec in schema.fields() {
            let value = self.fields.extract(page, entry, spec).await?;
            record.push(&spec.name, value.into_string());
        }
        Ok(record)
    }
}
