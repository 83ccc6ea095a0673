use crate::harvest::Pacer;
use crate::models::Session;
use crate::scrapers::traits::{BrowserError, BrowserSession, ContextId, ElementRef, Lookup, Modifier};
use crate::scrapers::types::SiteRules;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Why a listing entry was passed over without touching the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Activating the entry did not open a new context
    NoPopup,
    /// The listing already failed or was already scraped in this session
    AlreadySettled { url: String },
}

/// Terminal state of one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// The printable view has focus. `source_url` is the pretty view it was
    /// reached from.
    Printable { context: ContextId, source_url: String },
    Skipped(SkipReason),
    /// Recorded in the failure ledger
    Failed { url: String },
}

impl NavOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NavOutcome::Printable { .. })
    }
}

#[derive(Debug)]
enum NavState<'a> {
    AtIndex { entry: &'a ElementRef },
    PopupOpened { popup: ContextId, url: String },
    PrintClicked { popup: ContextId, url: String },
    Done(NavOutcome),
}

/// Take an index entry through to its printable view.
///
/// Only `NavOutcome::Printable` leaves an extra context open, and that
/// context has focus. Every other outcome, an error included, closes the
/// listing windows and returns focus to the index.
pub async fn navigate<B>(
    browser: &mut B,
    session: &mut Session,
    entry: &ElementRef,
    rules: &SiteRules,
    pacer: &Pacer,
) -> Result<NavOutcome, BrowserError>
where
    B: BrowserSession + ?Sized,
{
    drive(browser, session, rules, pacer, NavState::AtIndex { entry }).await
}

/// Print-and-refocus half of the navigation, starting from a pretty view
/// that is already open in `popup`
pub async fn print_through<B>(
    browser: &mut B,
    session: &mut Session,
    rules: &SiteRules,
    pacer: &Pacer,
    popup: ContextId,
    url: String,
) -> Result<NavOutcome, BrowserError>
where
    B: BrowserSession + ?Sized,
{
    drive(browser, session, rules, pacer, NavState::PopupOpened { popup, url }).await
}

async fn drive<B>(
    browser: &mut B,
    session: &mut Session,
    rules: &SiteRules,
    pacer: &Pacer,
    mut state: NavState<'_>,
) -> Result<NavOutcome, BrowserError>
where
    B: BrowserSession + ?Sized,
{
    let index = session.index_context().clone();

    loop {
        debug!(state = ?state, "Navigator state");
        state = match state {
            NavState::Done(outcome) => return Ok(outcome),
            state => match step(browser, session, rules, pacer, &index, state).await {
                Ok(next) => next,
                Err(e) => {
                    if let Err(cleanup) = return_to(browser, &index).await {
                        warn!(error = %cleanup, "Could not close listing windows after browser error");
                    }
                    return Err(e);
                }
            },
        };
    }
}

/// Advance one state. Errors leave cleanup to `drive`.
async fn step<'a, B>(
    browser: &mut B,
    session: &mut Session,
    rules: &SiteRules,
    pacer: &Pacer,
    index: &ContextId,
    state: NavState<'a>,
) -> Result<NavState<'a>, BrowserError>
where
    B: BrowserSession + ?Sized,
{
    let next = match state {
        NavState::AtIndex { entry } => {
            browser.switch_to(index).await?;
            let before: HashSet<ContextId> = browser.contexts().await?.into_iter().collect();

            browser.click(entry, Modifier::NewContext).await?;
            pacer.wait("Clicked on property button", 5.0).await;

            let opened: Vec<ContextId> = browser
                .contexts()
                .await?
                .into_iter()
                .filter(|c| !before.contains(c))
                .collect();

            match opened.split_first() {
                None => {
                    info!(entry = %entry.text, "No listing window opened");
                    browser.switch_to(index).await?;
                    NavState::Done(NavOutcome::Skipped(SkipReason::NoPopup))
                }
                Some((popup, extra)) => {
                    for stray in extra {
                        debug!(context = %stray, "Closing extra window");
                        browser.switch_to(stray).await?;
                        browser.close_current().await?;
                    }

                    browser.switch_to(popup).await?;
                    pacer.wait("Switched to window", 3.0).await;
                    browser.wait_for_stable().await?;
                    let url = browser.current_url().await?;

                    NavState::PopupOpened {
                        popup: popup.clone(),
                        url,
                    }
                }
            }
        }

        NavState::PopupOpened { popup, url } => {
            if session.is_settled(&url) {
                info!(url = %url, "Listing already handled this session");
                browser.switch_to(&popup).await?;
                browser.close_current().await?;
                browser.switch_to(index).await?;
                NavState::Done(NavOutcome::Skipped(SkipReason::AlreadySettled { url }))
            } else {
                match browser.find_by_class(&rules.print_class).await {
                    Lookup::Found(print) => {
                        browser.click(&print, Modifier::None).await?;
                        pacer.wait("Clicked on print button", 2.0).await;
                        NavState::PrintClicked { popup, url }
                    }
                    Lookup::NotFound => {
                        warn!(url = %url, "No print button on listing");
                        session.record_failure(&url);
                        browser.switch_to(&popup).await?;
                        browser.close_current().await?;
                        browser.switch_to(index).await?;
                        NavState::Done(NavOutcome::Failed { url })
                    }
                    Lookup::TransportError(e) => return Err(e),
                }
            }
        }

        NavState::PrintClicked { popup, url } => {
            browser.switch_to(&popup).await?;
            browser.close_current().await?;
            pacer.wait("Closed pretty window", 2.0).await;

            let remaining: Vec<ContextId> = browser
                .contexts()
                .await?
                .into_iter()
                .filter(|c| c != index)
                .collect();

            match remaining.as_slice() {
                [printable] => {
                    browser.switch_to(printable).await?;
                    pacer.wait("Switched to printable window", 2.0).await;
                    browser.wait_for_stable().await?;
                    NavState::Done(NavOutcome::Printable {
                        context: printable.clone(),
                        source_url: url,
                    })
                }
                others => {
                    warn!(url = %url, windows = others.len(), "Expected exactly one printable window");
                    session.record_failure(&url);
                    return_to(browser, index).await?;
                    NavState::Done(NavOutcome::Failed { url })
                }
            }
        }

        NavState::Done(outcome) => NavState::Done(outcome),
    };
    Ok(next)
}

/// Close every context except `keep` and focus it
pub async fn return_to<B>(browser: &mut B, keep: &ContextId) -> Result<(), BrowserError>
where
    B: BrowserSession + ?Sized,
{
    for context in browser.contexts().await? {
        if context != *keep {
            debug!(context = %context, "Closing stray window");
            browser.switch_to(&context).await?;
            browser.close_current().await?;
        }
    }
    browser.switch_to(keep).await
}
