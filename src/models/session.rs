use crate::harvest::FailureLedger;
use crate::scrapers::traits::ContextId;
use std::collections::HashSet;

/// Scraping state for one authenticated browser session.
///
/// Owned by whichever run created it; the browser itself is passed
/// alongside, never stored here.
#[derive(Debug)]
pub struct Session {
    index_context: ContextId,
    ledger: FailureLedger,
    processed: HashSet<String>,
}

impl Session {
    pub fn new(index_context: ContextId, ledger: FailureLedger) -> Self {
        Self {
            index_context,
            ledger,
            processed: HashSet::new(),
        }
    }

    /// Context believed to hold the paginated search index
    pub fn index_context(&self) -> &ContextId {
        &self.index_context
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn record_failure(&mut self, url: &str) {
        self.ledger.record_failure(url);
    }

    pub fn has_failed(&self, url: &str) -> bool {
        self.ledger.has_failed(url)
    }

    pub fn mark_processed(&mut self, url: &str) {
        self.processed.insert(url.to_string());
    }

    pub fn was_processed(&self, url: &str) -> bool {
        self.processed.contains(url)
    }

    /// Already failed or already scraped during this run
    pub fn is_settled(&self, url: &str) -> bool {
        self.has_failed(url) || self.was_processed(url)
    }
}
