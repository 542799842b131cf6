//! listing-scraper: pull structured records out of paginated listing pages.

pub mod config;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod orchestrator;
pub mod page;
pub mod pagination;
pub mod progress;
pub mod schema;
pub mod types;

pub use config::ScrapeConfig;
pub use error::{ConfigError, ConfigResult, TransitionError};
pub use extractor::{FieldExtractor, FieldValue, PageExtraction, RecordExtractor};
pub use locator::{EntryLocator, LocatedEntries};
pub use orchestrator::ScrapeOrchestrator;
pub use page::chromium::{ChromiumPage, ChromiumRenderer, LaunchOptions};
pub use page::snapshot::{Snapshot, SnapshotPage};
pub use page::{ListingPage, NodeHandle};
pub use pagination::{PaginationController, PaginationEvent, PaginationState};
pub use progress::{CancelHandle, OutcomeLog, PageObserver};
pub use schema::{Accessor, FieldSpec, OnMissing, Schema, TextOp};
pub use types::*;
