use crate::harvest::{HarvestError, OutputSink};
use crate::models::{ListingRecord, Session};
use crate::scrapers::types::SiteRules;
use chrono::{DateTime, Local};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{info, warn};

/// Description used when the printable view has none
pub const MISSING_DESCRIPTION: &str = "Missing description";

/// The printable view could not be turned into a record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("printable view did not render (title {title:?})")]
    Unrendered { title: String },

    #[error("invalid selector {0:?}")]
    Selector(String),
}

/// Parse a rendered printable view into a record
pub fn parse_listing(
    html: &str,
    url: &str,
    rules: &SiteRules,
    captured_at: DateTime<Local>,
) -> Result<ListingRecord, ExtractionFailure> {
    let document = Html::parse_document(html);

    let title_selector = selector("title")?;
    let raw_title = document
        .select(&title_selector)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default();
    let title = strip_site_suffix(&raw_title, &rules.title_suffixes);

    if title.is_empty()
        || title.chars().count() < rules.min_title_chars
        || title == rules.placeholder_title
    {
        return Err(ExtractionFailure::Unrendered { title });
    }

    let description_selector = selector(&rules.description_selector)?;
    let description = document
        .select(&description_selector)
        .next()
        .map(|d| element_text(&d))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| MISSING_DESCRIPTION.to_string());

    let row_selector = selector(&rules.row_selector)?;
    let rows = document
        .select(&row_selector)
        .map(|row| element_text(&row))
        .collect();

    Ok(ListingRecord {
        captured_at,
        title,
        url: url.to_string(),
        description,
        rows,
    })
}

/// Extract the focused printable view and append it to `sink`.
///
/// Returns `None` when the view did not render; the URL is then in the
/// failure ledger and nothing was written.
pub fn extract(
    html: &str,
    url: &str,
    rules: &SiteRules,
    session: &mut Session,
    sink: &OutputSink,
) -> Result<Option<ListingRecord>, HarvestError> {
    match parse_listing(html, url, rules, Local::now()) {
        Ok(record) => {
            info!(title = %record.title, rows = record.rows.len(), "Scraping listing");
            sink.append(&record).map_err(HarvestError::Sink)?;
            Ok(Some(record))
        }
        Err(failure) => {
            warn!(url, error = %failure, "Could not extract listing");
            session.record_failure(url);
            Ok(None)
        }
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionFailure> {
    Selector::parse(css).map_err(|_| ExtractionFailure::Selector(css.to_string()))
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_site_suffix(title: &str, suffixes: &[String]) -> String {
    suffixes
        .iter()
        .find_map(|suffix| title.strip_suffix(suffix.trim()))
        .unwrap_or(title)
        .trim()
        .to_string()
}
