use crate::harvest::navigator::{print_through, return_to, NavOutcome};
use crate::harvest::paginator::{scrape_printable, EntryResult};
use crate::harvest::{HarvestError, OutputSink, Pacer};
use crate::models::Session;
use crate::scrapers::traits::BrowserSession;
use crate::scrapers::types::{SiteRules, UrlKind};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Totals for one replay of a failure ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub pending: usize,
    pub scraped: usize,
    pub skipped: usize,
    pub failed: usize,
    /// URLs whose shape matched no known rendering
    pub unhandled: usize,
    pub errors: usize,
}

/// Replay the ledger written on `date`.
///
/// The ledger is marked consumed before anything is replayed, so URLs that
/// fail again land in a fresh ledger even when `date` is today. Printable
/// URLs are extracted directly; pretty URLs go through the print button
/// first.
pub async fn retry<B>(
    browser: &mut B,
    session: &mut Session,
    sink: &OutputSink,
    rules: &SiteRules,
    pacer: &Pacer,
    date: NaiveDate,
) -> Result<RetrySummary, HarvestError>
where
    B: BrowserSession + ?Sized,
{
    let urls = session.ledger().load_pending(date).map_err(HarvestError::Ledger)?;
    if session.ledger().mark_consumed(date).map_err(HarvestError::Ledger)? {
        debug!(date = %date, "Ledger consumed ahead of replay");
    }
    let index = session.index_context().clone();
    let mut summary = RetrySummary {
        pending: urls.len(),
        ..RetrySummary::default()
    };

    info!(date = %date, count = urls.len(), "Starting failure replay");

    for url in &urls {
        let Some(kind) = rules.classify_url(url) else {
            warn!(url = %url, "Unhandled URL shape");
            summary.unhandled += 1;
            continue;
        };

        match retry_url(browser, session, sink, rules, pacer, url, kind).await {
            Ok(EntryResult::Scraped) => summary.scraped += 1,
            Ok(EntryResult::Skipped) => summary.skipped += 1,
            Ok(EntryResult::Failed) => summary.failed += 1,
            Err(HarvestError::Browser(e)) => {
                warn!(url = %url, error = %e, "Skipping URL after browser error");
                summary.errors += 1;
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = return_to(browser, &index).await {
            warn!(error = %e, "Could not refocus the starting window");
        }
        pacer.wait("Finished with retried listing", 5.0).await;
    }

    info!(date = %date, "Finished with failures");
    Ok(summary)
}

async fn retry_url<B>(
    browser: &mut B,
    session: &mut Session,
    sink: &OutputSink,
    rules: &SiteRules,
    pacer: &Pacer,
    url: &str,
    kind: UrlKind,
) -> Result<EntryResult, HarvestError>
where
    B: BrowserSession + ?Sized,
{
    if session.is_settled(url) {
        info!(url, "Listing already handled this session");
        return Ok(EntryResult::Skipped);
    }

    let context = browser.open(url).await?;
    pacer.wait("Opened listing", 3.0).await;
    browser.wait_for_stable().await?;

    match kind {
        UrlKind::Printable => scrape_printable(browser, session, sink, rules, &context, url).await,
        UrlKind::Pretty => {
            match print_through(browser, session, rules, pacer, context, url.to_string()).await? {
                NavOutcome::Printable { context, source_url } => {
                    scrape_printable(browser, session, sink, rules, &context, &source_url).await
                }
                NavOutcome::Skipped(_) => Ok(EntryResult::Skipped),
                NavOutcome::Failed { .. } => Ok(EntryResult::Failed),
            }
        }
    }
}
