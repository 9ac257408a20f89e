#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use binck_export::browser::{ElementSnapshot, ScriptedBrowser, ScriptedPage, Selector, WaitConfig};
use binck_export::clock::FixedClock;
use binck_export::config::{PortalConfig, ReportsConfig};
use binck_export::portal::api::RESULTS_OVERVIEW_PATH;
use binck_export::portal::auth::TOKEN_XPATH;
use binck_export::portal::{login, BridgedCookie, CredentialBundle, PortalApiClient};
use binck_export::reports::ReportContext;
use chrono::{TimeZone, Utc};
use secrecy::SecretString;

pub const TOKEN: &str = "test-token";
pub const COOKIE_HEADER: &str = "ASP.NET_SessionId=session; .ASPXAUTH=auth";

pub fn wait_config() -> WaitConfig {
    WaitConfig {
        timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
    }
}

/// Portal settings pointing at a mock server.
pub fn portal_config(base_url: &str) -> PortalConfig {
    let host = reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_default();
    PortalConfig {
        base_url: base_url.to_string(),
        position_history_url: format!("{base_url}/Klanten/Portefeuille/PositieOpbouw.aspx"),
        cookies: BTreeMap::from([(
            host,
            vec!["ASP.NET_SessionId".to_string(), ".ASPXAUTH".to_string()],
        )]),
        ..PortalConfig::default()
    }
}

pub fn credentials(host: &str) -> CredentialBundle {
    CredentialBundle {
        token: TOKEN.to_string(),
        cookies: vec![
            BridgedCookie {
                domain: host.to_string(),
                name: "ASP.NET_SessionId".to_string(),
                value: "session".to_string(),
            },
            BridgedCookie {
                domain: host.to_string(),
                name: ".ASPXAUTH".to_string(),
                value: "auth".to_string(),
            },
        ],
    }
}

pub fn token_element() -> ElementSnapshot {
    ElementSnapshot::hidden().with_attribute("value", TOKEN)
}

/// A browser with the login form, the two-factor prompt, the landing page
/// and a results overview carrying the token.
pub fn scripted_portal(portal: &PortalConfig) -> ScriptedBrowser {
    let base = portal.base_url.trim_end_matches('/');
    let host = reqwest::Url::parse(base)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_default();
    let two_factor = format!("{base}/Login/TwoFactor");
    let home = format!("{base}/Home/Index");

    ScriptedBrowser::new()
        .with_page(
            base,
            ScriptedPage::new()
                .with_field(&portal.login.username_field)
                .with_field(&portal.login.password_field)
                .with_button(&portal.login.submit_button, &two_factor),
        )
        .with_page(
            &two_factor,
            ScriptedPage::new()
                .with_element(
                    Selector::css("#loginTwoFactor"),
                    ElementSnapshot::visible(""),
                )
                .with_link(&portal.login.two_factor_bypass_link, &home),
        )
        .with_page(
            &home,
            ScriptedPage::new().with_element(
                Selector::css("#secondary-nav-left"),
                ElementSnapshot::visible(""),
            ),
        )
        .with_page(
            format!("{base}{RESULTS_OVERVIEW_PATH}"),
            ScriptedPage::new().with_element(Selector::xpath(TOKEN_XPATH), token_element()),
        )
        .with_cookie(&host, "ASP.NET_SessionId", "session")
        .with_cookie(&host, ".ASPXAUTH", "auth")
}

/// Log `browser` in and wrap it in a report context for `year`.
pub async fn report_context(
    browser: ScriptedBrowser,
    portal: PortalConfig,
    year: i32,
) -> Result<ReportContext<ScriptedBrowser>> {
    let password = SecretString::from("secret".to_string());
    let session = login(browser, &portal, "jane", &password, wait_config()).await?;
    let api = PortalApiClient::new(&portal.base_url)?;
    // Reports default to the year before "now".
    let clock = FixedClock::new(Utc.with_ymd_and_hms(year + 1, 3, 1, 12, 0, 0).unwrap());
    Ok(ReportContext::new(
        session,
        api,
        portal,
        ReportsConfig::default(),
        Arc::new(clock),
    ))
}
