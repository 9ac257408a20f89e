//! In-memory browser that replays canned pages, for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::time::Instant;

use super::{cookie_domain_matches, BrowserDriver, ElementSnapshot, Selector};
use crate::{Error, Result};

/// Something the flow did to the scripted browser, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    Visit(String),
    Fill { field: String, value: String },
    Press(String),
    Click(String),
}

#[derive(Debug, Clone)]
struct ScriptedElement {
    selector: Selector,
    snapshot: ElementSnapshot,
    appears_after: Duration,
    disappears_after: Option<Duration>,
}

impl ScriptedElement {
    fn is_attached(&self, since_arrival: Duration) -> bool {
        since_arrival >= self.appears_after
            && self
                .disappears_after
                .is_none_or(|gone| since_arrival < gone)
    }
}

/// One page of a scripted session.
///
/// Element timings are relative to the moment the page is navigated to.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    elements: Vec<ScriptedElement>,
    fields: Vec<String>,
    buttons: HashMap<String, String>,
    links: HashMap<String, String>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, selector: Selector, snapshot: ElementSnapshot) -> Self {
        self.with_delayed_element(selector, snapshot, Duration::ZERO)
    }

    /// An element attached `after` the page was reached.
    pub fn with_delayed_element(
        mut self,
        selector: Selector,
        snapshot: ElementSnapshot,
        after: Duration,
    ) -> Self {
        self.elements.push(ScriptedElement {
            selector,
            snapshot,
            appears_after: after,
            disappears_after: None,
        });
        self
    }

    /// An element present on arrival and removed `after` the page was reached.
    pub fn with_vanishing_element(
        mut self,
        selector: Selector,
        snapshot: ElementSnapshot,
        after: Duration,
    ) -> Self {
        self.elements.push(ScriptedElement {
            selector,
            snapshot,
            appears_after: Duration::ZERO,
            disappears_after: Some(after),
        });
        self
    }

    pub fn with_field(mut self, locator: impl Into<String>) -> Self {
        self.fields.push(locator.into());
        self
    }

    /// A button that navigates to `target` when pressed.
    pub fn with_button(mut self, label: impl Into<String>, target: impl Into<String>) -> Self {
        self.buttons.insert(label.into(), normalize_url(&target.into()));
        self
    }

    /// A link that navigates to `target` when clicked.
    pub fn with_link(mut self, label: impl Into<String>, target: impl Into<String>) -> Self {
        self.links.insert(label.into(), normalize_url(&target.into()));
        self
    }
}

struct ScriptedState {
    pages: HashMap<String, ScriptedPage>,
    current: Option<String>,
    arrived_at: Instant,
    cookies: Vec<(String, String, String)>,
    fields: HashMap<String, String>,
    actions: Vec<BrowserAction>,
}

impl ScriptedState {
    fn navigate(&mut self, url: String) {
        self.current = Some(url);
        self.arrived_at = Instant::now();
        self.fields.clear();
    }

    fn current_page(&self) -> Option<&ScriptedPage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }
}

/// Browser double backed by [`ScriptedPage`]s keyed by URL.
///
/// Unknown URLs render as empty pages, like a browser showing an error page.
pub struct ScriptedBrowser {
    state: Mutex<ScriptedState>,
}

impl Default for ScriptedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                pages: HashMap::new(),
                current: None,
                arrived_at: Instant::now(),
                cookies: Vec::new(),
                fields: HashMap::new(),
                actions: Vec::new(),
            }),
        }
    }

    pub fn with_page(self, url: impl AsRef<str>, page: ScriptedPage) -> Self {
        self.lock().pages.insert(normalize_url(url.as_ref()), page);
        self
    }

    pub fn with_cookie(
        self,
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.lock()
            .cookies
            .push((domain.into(), name.into(), value.into()));
        self
    }

    /// Everything the flow did so far.
    pub fn actions(&self) -> Vec<BrowserAction> {
        self.lock().actions.clone()
    }

    /// Value typed into a field on the current page.
    pub fn field_value(&self, locator: &str) -> Option<String> {
        self.lock().fields.get(locator).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().expect("scripted browser lock poisoned")
    }
}

fn normalize_url(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn visit(&self, url: &str) -> Result<()> {
        let url = normalize_url(url);
        let mut state = self.lock();
        state.actions.push(BrowserAction::Visit(url.clone()));
        state.navigate(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.lock().current.clone())
    }

    async fn find_all(&self, xpath: &str) -> Result<Vec<ElementSnapshot>> {
        let state = self.lock();
        let Some(page) = state.current_page() else {
            return Ok(Vec::new());
        };
        let since_arrival = state.arrived_at.elapsed();
        Ok(page
            .elements
            .iter()
            .filter(|el| el.is_attached(since_arrival))
            .filter(|el| el.selector.to_xpath().is_ok_and(|x| x == xpath))
            .map(|el| el.snapshot.clone())
            .collect())
    }

    async fn fill_field(&self, locator: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        let known = state
            .current_page()
            .is_some_and(|page| page.fields.iter().any(|f| f == locator));
        if !known {
            return Err(Error::ElementNotFound {
                kind: "form field",
                locator: locator.to_string(),
            });
        }
        state.actions.push(BrowserAction::Fill {
            field: locator.to_string(),
            value: value.to_string(),
        });
        state.fields.insert(locator.to_string(), value.to_string());
        Ok(())
    }

    async fn press_button(&self, label: &str) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .current_page()
            .and_then(|page| page.buttons.get(label).cloned())
            .ok_or_else(|| Error::ElementNotFound {
                kind: "button",
                locator: label.to_string(),
            })?;
        state.actions.push(BrowserAction::Press(label.to_string()));
        state.navigate(target);
        Ok(())
    }

    async fn click_link(&self, label: &str) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .current_page()
            .and_then(|page| page.links.get(label).cloned())
            .ok_or_else(|| Error::ElementNotFound {
                kind: "link",
                locator: label.to_string(),
            })?;
        state.actions.push(BrowserAction::Click(label.to_string()));
        state.navigate(target);
        Ok(())
    }

    async fn cookie(&self, domain: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .lock()
            .cookies
            .iter()
            .find(|(cookie_domain, cookie_name, _)| {
                cookie_name == name && cookie_domain_matches(cookie_domain, domain)
            })
            .map(|(_, _, value)| value.clone()))
    }
}
