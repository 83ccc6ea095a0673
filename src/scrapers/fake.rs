//! Scripted in-memory portal for exercising the harvesting core.

use crate::scrapers::traits::{BrowserError, BrowserSession, ContextId, ElementRef, Locator, Lookup, Modifier};
use async_trait::async_trait;
use std::collections::HashMap;

pub const INDEX_URL: &str = "https://portal.test/search";

/// What happened, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Index entry clicked, by its text
    Click(String),
    /// Print button looked up on the page at this URL
    ClassLookup(String),
    PrintClick(String),
    Open(String),
    Close(String),
    NextPage,
}

#[derive(Debug, Clone)]
pub struct FakeEntry {
    pub text: String,
    /// Pretty view opened by a new-context click
    pub opens: Option<String>,
    /// Clicking it raises a driver error
    pub broken: bool,
}

impl FakeEntry {
    pub fn opening(text: &str, url: &str) -> Self {
        Self {
            text: text.to_string(),
            opens: Some(url.to_string()),
            broken: false,
        }
    }

    pub fn inert(text: &str) -> Self {
        Self {
            text: text.to_string(),
            opens: None,
            broken: false,
        }
    }

    pub fn broken(text: &str) -> Self {
        Self {
            text: text.to_string(),
            opens: None,
            broken: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeIndexPage {
    pub entries: Vec<FakeEntry>,
    pub has_next: bool,
}

impl FakeIndexPage {
    pub fn with_next(entries: Vec<FakeEntry>) -> Self {
        Self { entries, has_next: true }
    }

    pub fn last(entries: Vec<FakeEntry>) -> Self {
        Self { entries, has_next: false }
    }
}

#[derive(Debug)]
pub struct FakeBrowser {
    pages: Vec<FakeIndexPage>,
    current_page: usize,
    /// Pretty view URL -> windows its print button opens (`None`: no button)
    listings: HashMap<String, Option<Vec<String>>>,
    documents: HashMap<String, String>,
    contexts: Vec<(ContextId, String)>,
    focused: Option<ContextId>,
    next_id: usize,
    /// Print button lookups report a transport error
    lookups_fail: bool,
    pub log: Vec<Action>,
}

impl FakeBrowser {
    pub fn new(pages: Vec<FakeIndexPage>) -> Self {
        let mut browser = Self {
            pages,
            current_page: 0,
            listings: HashMap::new(),
            documents: HashMap::new(),
            contexts: Vec::new(),
            focused: None,
            next_id: 0,
            lookups_fail: false,
            log: Vec::new(),
        };
        let index = browser.spawn(INDEX_URL);
        browser.focused = Some(index);
        browser.log.clear();
        browser
    }

    pub fn index_context(&self) -> ContextId {
        "ctx-0".to_string()
    }

    pub fn add_listing(&mut self, url: &str, print_opens: Option<Vec<String>>) {
        self.listings.insert(url.to_string(), print_opens);
    }

    pub fn add_document(&mut self, url: &str, html: String) {
        self.documents.insert(url.to_string(), html);
    }

    pub fn fail_print_lookups(&mut self) {
        self.lookups_fail = true;
    }

    pub fn pages_visited(&self) -> usize {
        self.current_page + 1
    }

    fn spawn(&mut self, url: &str) -> ContextId {
        let id = format!("ctx-{}", self.next_id);
        self.next_id += 1;
        self.contexts.push((id.clone(), url.to_string()));
        self.log.push(Action::Open(url.to_string()));
        id
    }

    fn focused_url(&self) -> Result<String, BrowserError> {
        let focused = self.focused.as_ref().ok_or(BrowserError::NoFocus)?;
        self.contexts
            .iter()
            .find(|(id, _)| id == focused)
            .map(|(_, url)| url.clone())
            .ok_or_else(|| BrowserError::ContextGone(focused.clone()))
    }

    fn matching_entries(&self, phrases: &[String]) -> Vec<FakeEntry> {
        self.pages
            .get(self.current_page)
            .map(|page| {
                page.entries
                    .iter()
                    .filter(|e| phrases.iter().any(|p| e.text.contains(p.as_str())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn element(&self, locator: Locator, ordinal: usize, text: &str) -> Result<ElementRef, BrowserError> {
        Ok(ElementRef {
            context: self.focused.clone().ok_or(BrowserError::NoFocus)?,
            locator,
            ordinal,
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn current_context(&mut self) -> Result<ContextId, BrowserError> {
        self.focused.clone().ok_or(BrowserError::NoFocus)
    }

    async fn contexts(&mut self) -> Result<Vec<ContextId>, BrowserError> {
        Ok(self.contexts.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn switch_to(&mut self, context: &ContextId) -> Result<(), BrowserError> {
        if self.contexts.iter().any(|(id, _)| id == context) {
            self.focused = Some(context.clone());
            Ok(())
        } else {
            Err(BrowserError::ContextGone(context.clone()))
        }
    }

    async fn close_current(&mut self) -> Result<(), BrowserError> {
        let focused = self.focused.take().ok_or(BrowserError::NoFocus)?;
        let position = self
            .contexts
            .iter()
            .position(|(id, _)| *id == focused)
            .ok_or_else(|| BrowserError::ContextGone(focused.clone()))?;
        let (_, url) = self.contexts.remove(position);
        self.log.push(Action::Close(url));
        Ok(())
    }

    async fn open(&mut self, url: &str) -> Result<ContextId, BrowserError> {
        let id = self.spawn(url);
        self.focused = Some(id.clone());
        Ok(id)
    }

    async fn find_all_by_text(&mut self, phrases: &[String]) -> Result<Vec<ElementRef>, BrowserError> {
        if self.focused_url()? != INDEX_URL {
            return Ok(Vec::new());
        }
        self.matching_entries(phrases)
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| self.element(Locator::AnyText(phrases.to_vec()), ordinal, &entry.text))
            .collect()
    }

    async fn find_by_link_text(&mut self, label: &str) -> Lookup<ElementRef> {
        let url = match self.focused_url() {
            Ok(url) => url,
            Err(e) => return Lookup::TransportError(e),
        };
        let has_next = url == INDEX_URL
            && self.pages.get(self.current_page).map(|p| p.has_next).unwrap_or(false);
        if has_next {
            self.element(Locator::LinkText(label.to_string()), 0, label).map(Some).into()
        } else {
            Lookup::NotFound
        }
    }

    async fn find_by_class(&mut self, class: &str) -> Lookup<ElementRef> {
        let url = match self.focused_url() {
            Ok(url) => url,
            Err(e) => return Lookup::TransportError(e),
        };
        self.log.push(Action::ClassLookup(url.clone()));
        if self.lookups_fail {
            return Lookup::TransportError(BrowserError::Driver("target closed".to_string()));
        }
        match self.listings.get(&url) {
            Some(Some(_)) => self.element(Locator::Class(class.to_string()), 0, "Print").map(Some).into(),
            _ => Lookup::NotFound,
        }
    }

    async fn click(&mut self, element: &ElementRef, modifier: Modifier) -> Result<(), BrowserError> {
        if self.focused.as_ref() != Some(&element.context) {
            return Err(BrowserError::ContextGone(element.context.clone()));
        }

        match &element.locator {
            Locator::AnyText(phrases) => {
                let entry = self
                    .matching_entries(phrases)
                    .into_iter()
                    .nth(element.ordinal)
                    .ok_or_else(|| BrowserError::Driver("stale entry".to_string()))?;
                self.log.push(Action::Click(entry.text.clone()));
                if entry.broken {
                    return Err(BrowserError::Driver("element click intercepted".to_string()));
                }
                if let Some(url) = entry.opens {
                    if modifier == Modifier::NewContext {
                        self.spawn(&url);
                    }
                }
            }
            Locator::LinkText(_) => {
                self.current_page += 1;
                self.log.push(Action::NextPage);
            }
            Locator::Class(_) => {
                let url = self.focused_url()?;
                self.log.push(Action::PrintClick(url.clone()));
                let opens = self.listings.get(&url).cloned().flatten().unwrap_or_default();
                for target in opens {
                    self.spawn(&target);
                }
            }
        }
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        let url = self.focused_url()?;
        Ok(self
            .documents
            .get(&url)
            .cloned()
            .unwrap_or_else(|| "<html><head><title>about:blank</title></head></html>".to_string()))
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.focused_url()
    }

    async fn wait_for_stable(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Index entries clicked so far, in order
pub fn clicked(log: &[Action]) -> Vec<String> {
    log.iter()
        .filter_map(|a| match a {
            Action::Click(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Whether `url` was ever opened in a context
pub fn opened(log: &[Action], url: &str) -> bool {
    log.iter().any(|a| *a == Action::Open(url.to_string()))
}
