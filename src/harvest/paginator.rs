use crate::harvest::navigator::{navigate, return_to, NavOutcome};
use crate::harvest::{extract, HarvestError, OutputSink, Pacer};
use crate::models::Session;
use crate::scrapers::traits::{BrowserSession, ContextId, ElementRef, Lookup, Modifier};
use crate::scrapers::types::SiteRules;
use tracing::{debug, info, warn};

/// Totals for one pass over the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub pages: usize,
    pub entries: usize,
    pub scraped: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Entries abandoned because the browser misbehaved
    pub errors: usize,
}

/// How a single listing ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryResult {
    Scraped,
    Skipped,
    Failed,
}

/// Walk every page of the index, scraping each listing entry into `sink`.
///
/// The focused context must be the index page on entry. Individual
/// listings never stop the run; only an unwritable `sink` does.
pub async fn scrape_index<B>(
    browser: &mut B,
    session: &mut Session,
    sink: &OutputSink,
    rules: &SiteRules,
    pacer: &Pacer,
) -> Result<ScrapeSummary, HarvestError>
where
    B: BrowserSession + ?Sized,
{
    let phrases = rules.marker_phrases();
    let index = session.index_context().clone();
    let mut summary = ScrapeSummary::default();
    let mut page = 1;

    loop {
        summary.pages = page;
        if let Err(e) = return_to(browser, &index).await {
            warn!(page, error = %e, "Could not refocus the index");
        }

        let entries = match browser.find_all_by_text(&phrases).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(page, error = %e, "Could not list entries on page");
                Vec::new()
            }
        };
        info!(page, count = entries.len(), "Found listing entries");

        for (i, entry) in entries.iter().enumerate() {
            summary.entries += 1;
            debug!(page, entry = i + 1, kind = ?rules.classify_entry(&entry.text), text = %entry.text, "Opening entry");

            match process_entry(browser, session, sink, rules, pacer, entry).await {
                Ok(EntryResult::Scraped) => summary.scraped += 1,
                Ok(EntryResult::Skipped) => summary.skipped += 1,
                Ok(EntryResult::Failed) => summary.failed += 1,
                Err(HarvestError::Browser(e)) => {
                    warn!(page, entry = i + 1, error = %e, "Skipping entry after browser error");
                    summary.errors += 1;
                }
                Err(e) => return Err(e),
            }

            if let Err(e) = return_to(browser, &index).await {
                warn!(page, error = %e, "Could not refocus the index");
            }
            pacer
                .wait(&format!("Finished with property {} on page {}", i + 1, page), 5.0)
                .await;
        }

        match browser.find_by_link_text(&rules.next_page_label).await {
            Lookup::Found(next) => {
                if let Err(e) = browser.click(&next, Modifier::None).await {
                    warn!(page, error = %e, "Could not open the next page");
                    break;
                }
                page += 1;
                pacer.wait(&format!("Switching to page {page}"), 5.0).await;
                if let Err(e) = browser.wait_for_stable().await {
                    warn!(page, error = %e, "Next page did not settle");
                }
            }
            Lookup::NotFound => {
                info!(page, "All finished after page {page}");
                break;
            }
            Lookup::TransportError(e) => {
                warn!(page, error = %e, "Could not tell whether there is a next page");
                break;
            }
        }
    }

    Ok(summary)
}

async fn process_entry<B>(
    browser: &mut B,
    session: &mut Session,
    sink: &OutputSink,
    rules: &SiteRules,
    pacer: &Pacer,
    entry: &ElementRef,
) -> Result<EntryResult, HarvestError>
where
    B: BrowserSession + ?Sized,
{
    match navigate(browser, session, entry, rules, pacer).await? {
        NavOutcome::Printable { context, source_url } => {
            scrape_printable(browser, session, sink, rules, &context, &source_url).await
        }
        NavOutcome::Skipped(reason) => {
            debug!(reason = ?reason, "Entry skipped");
            Ok(EntryResult::Skipped)
        }
        NavOutcome::Failed { .. } => Ok(EntryResult::Failed),
    }
}

/// Extract the printable view focused in `context`, then close it
pub(crate) async fn scrape_printable<B>(
    browser: &mut B,
    session: &mut Session,
    sink: &OutputSink,
    rules: &SiteRules,
    context: &ContextId,
    source_url: &str,
) -> Result<EntryResult, HarvestError>
where
    B: BrowserSession + ?Sized,
{
    let url = browser.current_url().await?;
    let html = browser.page_source().await?;
    let extracted = extract(&html, &url, rules, session, sink)?;

    browser.switch_to(context).await?;
    browser.close_current().await?;

    match extracted {
        Some(_) => {
            session.mark_processed(source_url);
            session.mark_processed(&url);
            Ok(EntryResult::Scraped)
        }
        None => Ok(EntryResult::Failed),
    }
}
