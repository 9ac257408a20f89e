//! Chrome DevTools driver.
//!
//! Element reads are done by evaluating small scripts that serialize their
//! result to JSON, so every call returns plain data instead of remote object
//! handles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams as GetAllCookiesParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{cookie_domain_matches, BrowserDriver, ElementSnapshot};
use crate::config::BrowserConfig;
use crate::{Error, Result};

const SNAPSHOT_SCRIPT: &str = r#"
(xpath) => {
  const text = (node) => ((node.innerText ?? node.textContent) || '').trim();
  const result = document.evaluate(xpath, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  const out = [];
  for (let i = 0; i < result.snapshotLength; i++) {
    const el = result.snapshotItem(i);
    if (!(el instanceof Element)) continue;
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const attributes = {};
    for (const attr of el.attributes) attributes[attr.name] = attr.value;
    out.push({
      text: text(el),
      visible: style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0),
      attributes,
      value: 'value' in el ? String(el.value) : null,
      children: Array.from(el.children).map(text),
    });
  }
  return out;
}
"#;

const FILL_SCRIPT: &str = r#"
(locator, value) => {
  let field = document.getElementById(locator) || document.getElementsByName(locator)[0];
  if (!field) {
    const label = Array.from(document.querySelectorAll('label')).find((l) => l.textContent.trim() === locator);
    field = label ? label.control : null;
  }
  if (!field) return false;
  field.focus();
  field.value = value;
  field.dispatchEvent(new Event('input', { bubbles: true }));
  field.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
}
"#;

const PRESS_SCRIPT: &str = r#"
(label) => {
  const candidates = document.querySelectorAll('button, input[type=submit], input[type=button], input[type=image]');
  const button = Array.from(candidates).find((b) =>
    b.id === label || b.name === label || (b.value || '').trim() === label || (b.textContent || '').trim() === label);
  if (!button) return false;
  button.click();
  return true;
}
"#;

const CLICK_SCRIPT: &str = r#"
(label) => {
  const link = Array.from(document.querySelectorAll('a')).find((a) =>
    a.id === label || a.title === label || (a.textContent || '').trim() === label);
  if (!link) return false;
  link.click();
  return true;
}
"#;

/// A headed or headless Chrome instance with a single tab.
pub struct ChromeBrowser {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeBrowser {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let chrome_path = match &config.chrome_executable {
            Some(path) => path.clone(),
            None => find_chrome().ok_or_else(|| {
                Error::Browser(
                    "Chrome/Chromium not found. Install it or set browser.chrome_executable."
                        .to_string(),
                )
            })?,
        };

        let mut builder = ChromeConfig::builder()
            .chrome_executable(&chrome_path)
            .viewport(None)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &config.profile_dir {
            std::fs::create_dir_all(dir)?;
            builder = builder.user_data_dir(dir);
        }
        let chrome_config = builder
            .build()
            .map_err(|e| Error::Browser(format!("Failed to configure browser: {e}")))?;

        info!(chrome = %chrome_path.display(), headless = config.headless, "launching browser");
        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| Error::Browser(format!("Failed to launch browser: {e}")))?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(e.to_string()))?;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Close the browser and stop the DevTools event loop.
    pub async fn shutdown(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        self.handler_task.abort();
        closed.map_err(|e| Error::Browser(e.to_string()))?;
        Ok(())
    }

    /// Call a JS function with JSON-encoded arguments and decode its result.
    async fn call<T: DeserializeOwned>(&self, function: &str, args: &[&str]) -> Result<T> {
        let args = args
            .iter()
            .map(|arg| serde_json::to_string(arg))
            .collect::<serde_json::Result<Vec<_>>>()
            .map_err(|e| Error::Browser(e.to_string()))?
            .join(", ");
        let script = format!("JSON.stringify(({})({args}))", function.trim());

        let json: String = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| Error::Browser(e.to_string()))?
            .into_value()
            .map_err(|e| Error::Browser(format!("unexpected script result: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Browser(format!("unexpected script result: {e}")))
    }
}

fn require(found: bool, kind: &'static str, locator: &str) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(Error::ElementNotFound {
            kind,
            locator: locator.to_string(),
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromeBrowser {
    async fn visit(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| Error::Browser(format!("Failed to navigate to {url}: {e}")))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| Error::Browser(e.to_string()))
    }

    async fn find_all(&self, xpath: &str) -> Result<Vec<ElementSnapshot>> {
        self.call(SNAPSHOT_SCRIPT, &[xpath]).await
    }

    async fn fill_field(&self, locator: &str, value: &str) -> Result<()> {
        let found: bool = self.call(FILL_SCRIPT, &[locator, value]).await?;
        require(found, "form field", locator)
    }

    async fn press_button(&self, label: &str) -> Result<()> {
        let found: bool = self.call(PRESS_SCRIPT, &[label]).await?;
        require(found, "button", label)
    }

    async fn click_link(&self, label: &str) -> Result<()> {
        let found: bool = self.call(CLICK_SCRIPT, &[label]).await?;
        require(found, "link", label)
    }

    async fn cookie(&self, domain: &str, name: &str) -> Result<Option<String>> {
        let cookies = self
            .page
            .execute(GetAllCookiesParams::default())
            .await
            .map_err(|e| Error::Browser(e.to_string()))?
            .result
            .cookies;
        Ok(cookies
            .into_iter()
            .find(|c| c.name == name && cookie_domain_matches(&c.domain, domain))
            .map(|c| c.value))
    }
}

/// Find Chrome/Chromium executable.
fn find_chrome() -> Option<PathBuf> {
    for binary in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(binary).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    candidates
        .into_iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}
