use async_trait::async_trait;
use thiserror::Error;

/// Identifier of one browsing context (tab or popup window)
pub type ContextId = String;

/// Transport-level failure reported by the browser driver
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("browsing context {0} is no longer open")]
    ContextGone(ContextId),

    #[error("no browsing context has focus")]
    NoFocus,
}

impl BrowserError {
    pub fn driver(err: impl std::fmt::Display) -> Self {
        Self::Driver(err.to_string())
    }
}

/// Outcome of an element query that separates "definitely absent" from
/// "could not determine"
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    TransportError(BrowserError),
}

impl<T> From<Result<Option<T>, BrowserError>> for Lookup<T> {
    fn from(result: Result<Option<T>, BrowserError>) -> Self {
        match result {
            Ok(Some(found)) => Lookup::Found(found),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::TransportError(e),
        }
    }
}

/// How an element is located on the page that was active when it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Link whose text contains any of the phrases
    AnyText(Vec<String>),
    /// Link whose trimmed text equals the label
    LinkText(String),
    /// Element carrying the CSS class
    Class(String),
}

/// Reference to an element on a page. Only valid while `context` is still
/// showing the page it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub context: ContextId,
    pub locator: Locator,
    /// Position among all matches of `locator`, in document order
    pub ordinal: usize,
    /// Visible text at discovery time
    pub text: String,
}

/// Modifier applied when activating an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    None,
    /// Force the target to open in a new browsing context
    NewContext,
}

/// Capability the harvesting core needs from a browser driver
#[async_trait]
pub trait BrowserSession: Send {
    /// Context that currently has focus
    async fn current_context(&mut self) -> Result<ContextId, BrowserError>;

    /// All open contexts
    async fn contexts(&mut self) -> Result<Vec<ContextId>, BrowserError>;

    async fn switch_to(&mut self, context: &ContextId) -> Result<(), BrowserError>;

    /// Close the focused context. Nothing has focus afterwards.
    async fn close_current(&mut self) -> Result<(), BrowserError>;

    /// Open `url` in a new context and focus it
    async fn open(&mut self, url: &str) -> Result<ContextId, BrowserError>;

    /// Every link on the focused page whose text contains any of `phrases`,
    /// in document order, without duplicates
    async fn find_all_by_text(&mut self, phrases: &[String]) -> Result<Vec<ElementRef>, BrowserError>;

    async fn find_by_link_text(&mut self, label: &str) -> Lookup<ElementRef>;

    async fn find_by_class(&mut self, class: &str) -> Lookup<ElementRef>;

    async fn click(&mut self, element: &ElementRef, modifier: Modifier) -> Result<(), BrowserError>;

    /// Rendered document of the focused context
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Block until the focused page has finished loading
    async fn wait_for_stable(&mut self) -> Result<(), BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_from_result_keeps_three_states() {
        let found: Lookup<u8> = Ok(Some(1)).into();
        assert!(matches!(found, Lookup::Found(1)));

        let missing: Lookup<u8> = Ok(None).into();
        assert!(matches!(missing, Lookup::NotFound));

        let broken: Lookup<u8> = Err(BrowserError::NoFocus).into();
        assert!(matches!(broken, Lookup::TransportError(BrowserError::NoFocus)));
    }
}
