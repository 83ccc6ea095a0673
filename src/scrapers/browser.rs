use crate::config::{Credentials, PortalConfig};
use crate::harvest::Pacer;
use crate::scrapers::traits::{BrowserError, BrowserSession, ContextId, ElementRef, Locator, Lookup, Modifier};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Browser session driven through headless Chrome
pub struct ChromeSession {
    browser: Browser,
    focused: Option<Arc<Tab>>,
    /// Tabs we closed whose destruction Chrome may not have reported yet
    closed: HashSet<ContextId>,
}

impl ChromeSession {
    /// Launch Chrome with one blank tab focused
    pub fn launch(portal: &PortalConfig) -> Result<Self> {
        info!(headless = portal.headless, "Launching Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(portal.headless)
            .window_size(Some((1400, 1000)))
            .args(vec![OsStr::new("--disable-popup-blocking")])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open first tab")?;

        Ok(Self {
            browser,
            focused: Some(tab),
            closed: HashSet::new(),
        })
    }

    /// Sign in on the portal's login form
    pub async fn login(&mut self, portal: &PortalConfig, credentials: &Credentials, pacer: &Pacer) -> Result<()> {
        let tab = self.focused_tab().context("No tab to log in with")?;

        info!(url = %portal.login_url, user = %credentials.username, "Opening login page");
        tab.navigate_to(&portal.login_url).context("Failed to open login page")?;
        blocking(|| tab.wait_until_navigated().map(|_| ())).context("Login page did not load")?;
        pacer.wait("Open login window", 2.0).await;

        tab.wait_for_element("input[name='email']")
            .context("Login form has no email field")?
            .click()?;
        tab.type_str(&credentials.username)?;

        tab.find_element("input[name='password']")
            .context("Login form has no password field")?
            .click()?;
        tab.type_str(&credentials.password)?;

        tab.find_element(".big")
            .context("Login form has no submit button")?
            .click()?;
        pacer.wait("Logging in", 5.0).await;

        blocking(|| tab.wait_until_navigated().map(|_| ())).context("Login did not complete")?;
        Ok(())
    }

    fn focused_tab(&self) -> Result<Arc<Tab>, BrowserError> {
        self.focused.clone().ok_or(BrowserError::NoFocus)
    }

    /// Tabs Chrome still lists, minus the ones we closed. Closed IDs are
    /// forgotten once Chrome stops listing them.
    fn open_tabs(&mut self) -> Result<Vec<Arc<Tab>>, BrowserError> {
        let tabs: Vec<Arc<Tab>> = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|_| BrowserError::Driver("tab list lock poisoned".to_string()))?
            .clone();

        let live: Vec<&ContextId> = tabs.iter().map(|tab| tab.get_target_id()).collect();
        forget_reaped(&mut self.closed, &live);
        Ok(tabs
            .into_iter()
            .filter(|tab| !self.closed.contains(tab.get_target_id()))
            .collect())
    }

    fn resolve(&self, element: &ElementRef) -> Result<(Arc<Tab>, usize), BrowserError> {
        let tab = self.focused_tab()?;
        if *tab.get_target_id() != element.context {
            return Err(BrowserError::ContextGone(element.context.clone()));
        }
        Ok((tab, element.ordinal))
    }

    fn count(&self, xpath: &str) -> Result<usize, BrowserError> {
        let tab = self.focused_tab()?;
        let script = format!(
            "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
            js_string(xpath)
        );
        let result = tab.evaluate(&script, false).map_err(BrowserError::driver)?;
        Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0) as usize)
    }

    fn lookup(&self, locator: Locator, text: &str) -> Lookup<ElementRef> {
        let context = match self.focused_tab() {
            Ok(tab) => tab.get_target_id().clone(),
            Err(e) => return Lookup::TransportError(e),
        };
        self.count(&xpath_for(&locator))
            .map(|n| {
                (n > 0).then(|| ElementRef {
                    context,
                    locator,
                    ordinal: 0,
                    text: text.to_string(),
                })
            })
            .into()
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn current_context(&mut self) -> Result<ContextId, BrowserError> {
        Ok(self.focused_tab()?.get_target_id().clone())
    }

    async fn contexts(&mut self) -> Result<Vec<ContextId>, BrowserError> {
        Ok(self
            .open_tabs()?
            .iter()
            .map(|tab| tab.get_target_id().clone())
            .collect())
    }

    async fn switch_to(&mut self, context: &ContextId) -> Result<(), BrowserError> {
        let tab = self
            .open_tabs()?
            .into_iter()
            .find(|tab| tab.get_target_id() == context)
            .ok_or_else(|| BrowserError::ContextGone(context.clone()))?;
        blocking(|| tab.activate().map(|_| ())).map_err(BrowserError::driver)?;
        self.focused = Some(tab);
        Ok(())
    }

    async fn close_current(&mut self) -> Result<(), BrowserError> {
        let tab = self.focused.take().ok_or(BrowserError::NoFocus)?;
        let id = tab.get_target_id().clone();
        debug!(context = %id, url = %tab.get_url(), "Closing tab");
        blocking(|| tab.close(true).map(|_| ())).map_err(BrowserError::driver)?;
        self.closed.insert(id);
        Ok(())
    }

    async fn open(&mut self, url: &str) -> Result<ContextId, BrowserError> {
        let tab = self.browser.new_tab().map_err(BrowserError::driver)?;
        tab.navigate_to(url).map_err(BrowserError::driver)?;
        let id = tab.get_target_id().clone();
        self.focused = Some(tab);
        Ok(id)
    }

    async fn find_all_by_text(&mut self, phrases: &[String]) -> Result<Vec<ElementRef>, BrowserError> {
        let tab = self.focused_tab()?;
        let locator = Locator::AnyText(phrases.to_vec());
        let script = format!(
            r#"(() => {{
                const found = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const texts = [];
                for (let i = 0; i < found.snapshotLength; i++) {{
                    const node = found.snapshotItem(i);
                    texts.push((node.innerText || node.textContent || '').trim());
                }}
                return JSON.stringify(texts);
            }})()"#,
            js_string(&xpath_for(&locator))
        );

        let result = tab.evaluate(&script, false).map_err(BrowserError::driver)?;
        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or("[]")
            .to_string();
        let texts: Vec<String> = serde_json::from_str(&raw).map_err(BrowserError::driver)?;

        let context = tab.get_target_id().clone();
        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| ElementRef {
                context: context.clone(),
                locator: locator.clone(),
                ordinal,
                text,
            })
            .collect())
    }

    async fn find_by_link_text(&mut self, label: &str) -> Lookup<ElementRef> {
        self.lookup(Locator::LinkText(label.to_string()), label)
    }

    async fn find_by_class(&mut self, class: &str) -> Lookup<ElementRef> {
        self.lookup(Locator::Class(class.to_string()), class)
    }

    async fn click(&mut self, element: &ElementRef, modifier: Modifier) -> Result<(), BrowserError> {
        let (tab, ordinal) = self.resolve(element)?;
        let matches = tab
            .find_elements_by_xpath(&xpath_for(&element.locator))
            .map_err(BrowserError::driver)?;
        let target: &Element = matches
            .get(ordinal)
            .ok_or_else(|| BrowserError::Driver(format!("element {:?} is no longer on the page", element.text)))?;

        match modifier {
            Modifier::None => {
                target.click().map_err(BrowserError::driver)?;
            }
            Modifier::NewContext => {
                target
                    .call_js_fn(NEW_CONTEXT_CLICK, vec![], false)
                    .map_err(BrowserError::driver)?;
            }
        }
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.focused_tab()?.get_content().map_err(BrowserError::driver)
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.focused_tab()?.get_url())
    }

    async fn wait_for_stable(&mut self) -> Result<(), BrowserError> {
        let tab = self.focused_tab()?;
        blocking(|| tab.wait_until_navigated().map(|_| ())).map_err(BrowserError::driver)
    }
}

fn forget_reaped(closed: &mut HashSet<ContextId>, live: &[&ContextId]) {
    closed.retain(|id| live.contains(&id));
}

/// Run a call that blocks on the DevTools connection without stalling the
/// other tasks on the runtime. Needs the multi-threaded runtime.
fn blocking<T>(call: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(call)
}

#[cfg(target_os = "macos")]
const NEW_CONTEXT_CLICK: &str = "function() { this.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true, view: window, metaKey: true })); }";

#[cfg(not(target_os = "macos"))]
const NEW_CONTEXT_CLICK: &str = "function() { this.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true, view: window, ctrlKey: true })); }";

/// Open the named saved search from the dashboard
pub async fn open_saved_search<B>(browser: &mut B, portal: &PortalConfig, name: &str, pacer: &Pacer) -> Result<()>
where
    B: BrowserSession + ?Sized,
{
    for label in [&portal.dashboard_label, &portal.saved_searches_label] {
        debug!(label = %label, "Opening link");
        match browser.find_by_link_text(label).await {
            Lookup::Found(link) => browser.click(&link, Modifier::None).await?,
            Lookup::NotFound => anyhow::bail!("No {label:?} link on the page"),
            Lookup::TransportError(e) => return Err(e).context(format!("Failed to look for {label:?}")),
        }
        pacer.wait(&format!("Opening {label}"), 5.0).await;
    }

    let search = browser
        .find_all_by_text(&[name.to_string()])
        .await?
        .into_iter()
        .next()
        .with_context(|| format!("No saved search named {name:?}"))?;
    browser.click(&search, Modifier::None).await?;
    pacer.wait("Opening relevant saved search", 3.0).await;
    browser.wait_for_stable().await?;

    info!(search = name, "Opened saved search");
    Ok(())
}

fn xpath_for(locator: &Locator) -> String {
    match locator {
        Locator::AnyText(phrases) => {
            let any = phrases
                .iter()
                .map(|p| format!("contains(normalize-space(.), {})", xpath_literal(p)))
                .collect::<Vec<_>>()
                .join(" or ");
            format!("//a[{any}]")
        }
        Locator::LinkText(label) => format!("//a[normalize-space(.)={}]", xpath_literal(label.trim())),
        Locator::Class(class) => format!(
            "//*[contains(concat(' ', normalize-space(@class), ' '), {})]",
            xpath_literal(&format!(" {class} "))
        ),
    }
}

/// XPath 1.0 has no string escapes, so quotes are spliced in with concat()
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts = text
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect::<Vec<_>>()
            .join(", \"'\", ");
        format!("concat({parts})")
    }
}

fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
