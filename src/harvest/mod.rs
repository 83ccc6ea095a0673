//! Index pagination, per-listing navigation and extraction, and the failure
//! ledger that lets a later run replay what went wrong.

pub mod extractor;
pub mod ledger;
pub mod navigator;
pub mod paginator;
pub mod retry;
pub mod sink;
pub mod timing;

pub use extractor::extract;
pub use ledger::{FailureLedger, LedgerLayout};
pub use paginator::{scrape_index, ScrapeSummary};
pub use retry::{retry, RetrySummary};
pub use sink::OutputSink;
pub use timing::Pacer;

use crate::scrapers::traits::BrowserError;
use thiserror::Error;

/// Errors that escape a single listing
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Handled per entry by the orchestrators; never aborts a run
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// The output file can no longer be written; the run stops
    #[error("failed to write output: {0}")]
    Sink(#[source] std::io::Error),

    /// A ledger that exists could not be read or consumed; the replay stops
    #[error("failed to read or consume failure ledger: {0}")]
    Ledger(#[source] std::io::Error),
}
