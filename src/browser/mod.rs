//! Browser automation seam.
//!
//! The portal has no public API, so logging in and reading rendered tables
//! goes through a real browser. [`BrowserDriver`] is the narrow capability
//! set the rest of the crate relies on; [`ChromeBrowser`] drives Chrome over
//! the DevTools protocol and [`ScriptedBrowser`] replays canned pages.

#[cfg(feature = "chrome")]
mod chrome;
mod scripted;
mod selector;
mod wait;

#[cfg(feature = "chrome")]
pub use chrome::ChromeBrowser;
pub use scripted::{BrowserAction, ScriptedBrowser, ScriptedPage};
pub use selector::Selector;
pub use wait::{ElementWaiter, WaitCondition, WaitConfig};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;

/// Point-in-time view of one DOM element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    /// Rendered text, trimmed.
    pub text: String,
    pub visible: bool,
    pub attributes: BTreeMap<String, String>,
    /// Current value for form controls.
    pub value: Option<String>,
    /// Rendered text of each direct child element (table cells for a row).
    pub children: Vec<String>,
}

impl ElementSnapshot {
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Form value, falling back to the `value` attribute.
    pub fn form_value(&self) -> Option<&str> {
        self.value.as_deref().or_else(|| self.attribute("value"))
    }
}

/// Capabilities the portal flows need from a live browser session.
///
/// Element lookups are always XPath; CSS selectors are translated by
/// [`Selector::to_xpath`] before they reach the driver.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn visit(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<Option<String>>;

    /// All elements matching `xpath` on the current page, in document order.
    async fn find_all(&self, xpath: &str) -> Result<Vec<ElementSnapshot>>;

    async fn find(&self, xpath: &str) -> Result<Option<ElementSnapshot>> {
        Ok(self.find_all(xpath).await?.into_iter().next())
    }

    /// Fill a form field located by id, name or label text.
    async fn fill_field(&self, locator: &str, value: &str) -> Result<()>;

    /// Press a button located by its label, id or name.
    async fn press_button(&self, label: &str) -> Result<()>;

    /// Click a link located by its text, id or title.
    async fn click_link(&self, label: &str) -> Result<()>;

    /// Value of the cookie `name` visible to `domain`, if any.
    async fn cookie(&self, domain: &str, name: &str) -> Result<Option<String>>;
}

#[async_trait]
impl<'a, T: BrowserDriver + ?Sized> BrowserDriver for &'a T {
    async fn visit(&self, url: &str) -> Result<()> {
        (**self).visit(url).await
    }

    async fn current_url(&self) -> Result<Option<String>> {
        (**self).current_url().await
    }

    async fn find_all(&self, xpath: &str) -> Result<Vec<ElementSnapshot>> {
        (**self).find_all(xpath).await
    }

    async fn find(&self, xpath: &str) -> Result<Option<ElementSnapshot>> {
        (**self).find(xpath).await
    }

    async fn fill_field(&self, locator: &str, value: &str) -> Result<()> {
        (**self).fill_field(locator, value).await
    }

    async fn press_button(&self, label: &str) -> Result<()> {
        (**self).press_button(label).await
    }

    async fn click_link(&self, label: &str) -> Result<()> {
        (**self).click_link(label).await
    }

    async fn cookie(&self, domain: &str, name: &str) -> Result<Option<String>> {
        (**self).cookie(domain, name).await
    }
}

/// Whether a cookie scoped to `cookie_domain` is sent to `host`.
///
/// A leading dot is ignored; subdomains of the cookie domain match.
pub fn cookie_domain_matches(cookie_domain: &str, host: &str) -> bool {
    let domain = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_domain_matching() {
        assert!(cookie_domain_matches("web.binck.be", "web.binck.be"));
        assert!(cookie_domain_matches(".binck.be", "web.binck.be"));
        assert!(cookie_domain_matches("binck.be", "login.binck.be"));
        assert!(!cookie_domain_matches("web.binck.be", "login.binck.be"));
        assert!(!cookie_domain_matches("binck.be", "notbinck.be"));
    }

    #[test]
    fn form_value_prefers_live_value() {
        let el = ElementSnapshot::hidden()
            .with_attribute("value", "initial")
            .with_value("typed");
        assert_eq!(el.form_value(), Some("typed"));

        let el = ElementSnapshot::hidden().with_attribute("value", "initial");
        assert_eq!(el.form_value(), Some("initial"));
    }
}
