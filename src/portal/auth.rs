//! Browser login and the bridge from the browser session to plain HTTP.
//!
//! The portal's JSON endpoints accept the same cookies as the web UI plus
//! the anti-forgery token rendered into every page, so once the browser is
//! logged in those two pieces are all an HTTP client needs.

use std::collections::BTreeMap;

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::browser::{BrowserDriver, ElementWaiter, Selector, WaitConfig};
use crate::config::PortalConfig;
use crate::{Error, Result};

/// Hidden input holding the anti-forgery token on portal pages.
pub const TOKEN_XPATH: &str =
    r#"//body/div[@class = "wrap"]/input[@name = "__RequestVerificationToken"][1]"#;

/// Header and form name of the anti-forgery token.
pub const TOKEN_HEADER: &str = "__RequestVerificationToken";

const TWO_FACTOR_MARKER: &str = "#loginTwoFactor";
const NAVIGATION_MARKER: &str = "#secondary-nav-left";

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// The live browser session of one run.
pub struct Session<D> {
    driver: D,
    base_url: Url,
    wait: WaitConfig,
}

impl<D: BrowserDriver> Session<D> {
    /// Wrap a driver that is already logged in.
    pub fn attach(driver: D, base_url: &str, wait: WaitConfig) -> Result<Self> {
        Ok(Self {
            driver,
            base_url: parse_url(base_url)?,
            wait,
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn waiter(&self) -> ElementWaiter<'_, D> {
        ElementWaiter::new(&self.driver, self.wait)
    }

    /// Resolve `path` against the portal base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| Error::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn visit(&self, url: &Url) -> Result<()> {
        self.driver.visit(url.as_str()).await
    }

    pub async fn visit_path(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        self.visit(&url).await
    }

    /// Read the anti-forgery token from the current page.
    pub async fn extract_token(&self) -> Result<String> {
        let token = self
            .driver
            .find(TOKEN_XPATH)
            .await?
            .and_then(|el| el.form_value().map(str::to_string))
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => Ok(token),
            None => {
                let url = self
                    .driver
                    .current_url()
                    .await?
                    .unwrap_or_else(|| self.base_url.to_string());
                Err(Error::TokenNotFound { url })
            }
        }
    }

    /// Read every declared cookie, failing on the first one that is absent.
    pub async fn extract_cookies(
        &self,
        wanted: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<BridgedCookie>> {
        let mut cookies = Vec::new();
        for (domain, names) in wanted {
            for name in names {
                let value = self
                    .driver
                    .cookie(domain, name)
                    .await?
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| Error::MissingCookie {
                        domain: domain.clone(),
                        name: name.clone(),
                    })?;
                cookies.push(BridgedCookie {
                    domain: domain.clone(),
                    name: name.clone(),
                    value,
                });
            }
        }
        Ok(cookies)
    }

    /// Snapshot the token and cookies for API calls.
    ///
    /// The token is page-scoped, so take a fresh snapshot after navigating.
    pub async fn credentials(
        &self,
        wanted: &BTreeMap<String, Vec<String>>,
    ) -> Result<CredentialBundle> {
        let token = self.extract_token().await?;
        let cookies = self.extract_cookies(wanted).await?;
        debug!(cookies = cookies.len(), "bridged browser session");
        Ok(CredentialBundle { token, cookies })
    }
}

/// Log in through the portal's web form.
///
/// Skips the second factor through the read-only link, which is enough for
/// every report.
pub async fn login<D: BrowserDriver>(
    driver: D,
    portal: &PortalConfig,
    username: &str,
    password: &SecretString,
    wait: WaitConfig,
) -> Result<Session<D>> {
    let session = Session::attach(driver, &portal.base_url, wait)?;
    let login = &portal.login;
    let waiter = session.waiter();

    info!(username, url = %session.base_url(), "logging in");
    session
        .visit(session.base_url())
        .await
        .map_err(|e| Error::authentication("opening the login page", e))?;

    let submit = async {
        session
            .driver
            .fill_field(&login.username_field, username)
            .await?;
        session
            .driver
            .fill_field(&login.password_field, password.expose_secret())
            .await?;
        session.driver.press_button(&login.submit_button).await
    };
    submit
        .await
        .map_err(|e| Error::authentication("submitting credentials", e))?;

    waiter
        .wait_for_presence(&Selector::css(TWO_FACTOR_MARKER), true)
        .await
        .map_err(|e| Error::authentication("waiting for the two-factor prompt", e))?;

    session
        .driver
        .click_link(&login.two_factor_bypass_link)
        .await
        .map_err(|e| Error::authentication("skipping two-factor authentication", e))?;

    waiter
        .wait_for_presence(&Selector::css(NAVIGATION_MARKER), true)
        .await
        .map_err(|e| Error::authentication("waiting for the portal navigation", e))?;

    info!("logged in");
    Ok(session)
}

/// A browser cookie copied into API requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgedCookie {
    pub domain: String,
    pub name: String,
    pub value: String,
}

/// Token and cookies taken from the browser at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub token: String,
    pub cookies: Vec<BridgedCookie>,
}

impl CredentialBundle {
    /// `Cookie` header value for a request to `host`.
    pub fn cookie_header_for(&self, host: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| crate::browser::cookie_domain_matches(&c.domain, host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }
}
