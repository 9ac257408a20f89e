use std::fmt;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer};
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::{BrowserDriver, ElementSnapshot, Selector};
use crate::duration::deserialize_duration;
use crate::{Error, Result};

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

/// Floor for the pause between polls, whatever the configuration says.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn deserialize_poll_interval<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let interval = deserialize_duration(deserializer)?;
    if interval.is_zero() {
        return Err(de::Error::custom("poll_interval must be greater than zero"));
    }
    Ok(interval)
}

/// Bounds for DOM polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Give up after this long.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Pause between two polls. Must be non-zero.
    #[serde(deserialize_with = "deserialize_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// The DOM state a wait is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    Present,
    Absent,
    Visible,
    Hidden,
}

impl WaitCondition {
    /// Visibility is judged on the first match; no match counts as hidden.
    fn is_met(self, elements: &[ElementSnapshot]) -> bool {
        match self {
            WaitCondition::Present => !elements.is_empty(),
            WaitCondition::Absent => elements.is_empty(),
            WaitCondition::Visible => elements.first().is_some_and(|el| el.visible),
            WaitCondition::Hidden => !elements.first().is_some_and(|el| el.visible),
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitCondition::Present => "present",
            WaitCondition::Absent => "absent",
            WaitCondition::Visible => "visible",
            WaitCondition::Hidden => "hidden",
        })
    }
}

/// Polls the current page until an element reaches the wanted state.
///
/// The portal attaches elements before their data is populated, and some
/// transitions (login steps, spinners) have no other observable signal.
/// Waiting never mutates the page. Browser errors while polling (a page
/// being torn down mid-navigation) count as "not yet"; only the deadline
/// ends the wait.
pub struct ElementWaiter<'a, D: ?Sized> {
    driver: &'a D,
    config: WaitConfig,
}

impl<'a, D: BrowserDriver + ?Sized> ElementWaiter<'a, D> {
    pub fn new(driver: &'a D, config: WaitConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> WaitConfig {
        self.config
    }

    /// Wait for the element to appear (`present = true`) or disappear.
    pub async fn wait_for_presence(&self, selector: &Selector, present: bool) -> Result<()> {
        let condition = if present {
            WaitCondition::Present
        } else {
            WaitCondition::Absent
        };
        self.wait_for(selector, condition).await
    }

    /// Wait for the element to become visible (`visible = true`) or hidden.
    pub async fn wait_for_visibility(&self, selector: &Selector, visible: bool) -> Result<()> {
        let condition = if visible {
            WaitCondition::Visible
        } else {
            WaitCondition::Hidden
        };
        self.wait_for(selector, condition).await
    }

    pub async fn wait_for(&self, selector: &Selector, condition: WaitCondition) -> Result<()> {
        let xpath = selector.to_xpath()?;
        let started = Instant::now();
        let deadline = started + self.config.timeout;

        let poll_interval = self.config.poll_interval.max(MIN_POLL_INTERVAL);

        loop {
            let met = match self.driver.find_all(&xpath).await {
                Ok(elements) => condition.is_met(&elements),
                Err(Error::Browser(reason)) => {
                    debug!(selector = %selector, %reason, "poll failed, retrying");
                    false
                }
                Err(e) => return Err(e),
            };
            if met {
                debug!(
                    selector = %selector,
                    %condition,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "wait condition met"
                );
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    selector: selector.to_string(),
                    condition,
                    waited: now - started,
                });
            }
            sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::browser::{ScriptedBrowser, ScriptedPage};

    const PAGE: &str = "https://web.binck.be/";

    fn browser_with(page: ScriptedPage) -> ScriptedBrowser {
        ScriptedBrowser::new().with_page(PAGE, page)
    }

    #[tokio::test(start_paused = true)]
    async fn presence_returns_once_element_appears() -> Result<()> {
        let selector = Selector::css("#secondary-nav-left");
        let browser = browser_with(ScriptedPage::new().with_delayed_element(
            selector.clone(),
            ElementSnapshot::visible("nav"),
            Duration::from_secs(2),
        ));
        browser.visit(PAGE).await?;

        let started = Instant::now();
        ElementWaiter::new(&browser, WaitConfig::default())
            .wait_for_presence(&selector, true)
            .await?;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "waited too long: {elapsed:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn presence_times_out_after_full_timeout() -> Result<()> {
        let browser = browser_with(ScriptedPage::new());
        browser.visit(PAGE).await?;

        let started = Instant::now();
        let err = ElementWaiter::new(&browser, WaitConfig::default())
            .wait_for_presence(&Selector::css("#loginTwoFactor"), true)
            .await
            .unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(20));
        match err {
            Error::Timeout {
                selector,
                condition,
                waited,
            } => {
                assert_eq!(selector, "#loginTwoFactor");
                assert_eq!(condition, WaitCondition::Present);
                assert_eq!(waited, Duration::from_secs(20));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn absence_waits_for_spinner_removal() -> Result<()> {
        let spinner = Selector::css("div.spinner");
        let browser = browser_with(ScriptedPage::new().with_vanishing_element(
            spinner.clone(),
            ElementSnapshot::visible(""),
            Duration::from_millis(1200),
        ));
        browser.visit(PAGE).await?;

        let started = Instant::now();
        ElementWaiter::new(&browser, WaitConfig::default())
            .wait_for_presence(&spinner, false)
            .await?;
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn css_selector_is_found_through_its_translated_xpath() -> Result<()> {
        let browser = browser_with(
            ScriptedPage::new()
                .with_element(Selector::css("#loginTwoFactor"), ElementSnapshot::visible("")),
        );
        browser.visit(PAGE).await?;

        let waiter = ElementWaiter::new(&browser, WaitConfig::default());
        waiter
            .wait_for_presence(&Selector::xpath("descendant-or-self::*[@id = 'loginTwoFactor']"), true)
            .await?;
        waiter
            .wait_for_presence(&Selector::css("#loginTwoFactor"), true)
            .await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_uses_configured_bounds() -> Result<()> {
        let table = Selector::css("table.overview");
        let browser = browser_with(
            ScriptedPage::new().with_element(table.clone(), ElementSnapshot::hidden()),
        );
        browser.visit(PAGE).await?;

        let config = WaitConfig {
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        };
        let waiter = ElementWaiter::new(&browser, config);

        waiter.wait_for_visibility(&table, false).await?;

        let started = Instant::now();
        let err = waiter.wait_for_visibility(&table, true).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                condition: WaitCondition::Visible,
                ..
            }
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_counts_as_hidden() -> Result<()> {
        let browser = browser_with(ScriptedPage::new());
        browser.visit(PAGE).await?;

        ElementWaiter::new(&browser, WaitConfig::default())
            .wait_for_visibility(&Selector::css(".spinner"), false)
            .await
    }

    /// Fails the second poll like a page mid-navigation, then serves the
    /// element from the fourth poll on.
    struct NavigatingDriver {
        polls: AtomicU32,
        error: fn() -> Error,
    }

    impl NavigatingDriver {
        fn new(error: fn() -> Error) -> Self {
            Self {
                polls: AtomicU32::new(0),
                error,
            }
        }
    }

    #[async_trait]
    impl BrowserDriver for NavigatingDriver {
        async fn visit(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn current_url(&self) -> Result<Option<String>> {
            Ok(None)
        }

        async fn find_all(&self, _xpath: &str) -> Result<Vec<ElementSnapshot>> {
            match self.polls.fetch_add(1, Ordering::SeqCst) + 1 {
                2 => Err((self.error)()),
                n if n >= 4 => Ok(vec![ElementSnapshot::visible("")]),
                _ => Ok(Vec::new()),
            }
        }

        async fn fill_field(&self, _locator: &str, _value: &str) -> Result<()> {
            Ok(())
        }

        async fn press_button(&self, _label: &str) -> Result<()> {
            Ok(())
        }

        async fn click_link(&self, _label: &str) -> Result<()> {
            Ok(())
        }

        async fn cookie(&self, _domain: &str, _name: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn browser_error_mid_navigation_keeps_polling() -> Result<()> {
        let driver = NavigatingDriver::new(|| {
            Error::Browser("Execution context was destroyed".to_string())
        });

        let started = Instant::now();
        ElementWaiter::new(&driver, WaitConfig::default())
            .wait_for_presence(&Selector::css("#loginTwoFactor"), true)
            .await?;

        assert_eq!(driver.polls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_end_the_wait() {
        let driver = NavigatingDriver::new(|| Error::ElementNotFound {
            kind: "frame",
            locator: "main".to_string(),
        });

        let err = ElementWaiter::new(&driver, WaitConfig::default())
            .wait_for_presence(&Selector::css("#loginTwoFactor"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
        assert_eq!(driver.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_browser_errors_still_time_out() {
        struct BrokenDriver;

        #[async_trait]
        impl BrowserDriver for BrokenDriver {
            async fn visit(&self, _url: &str) -> Result<()> {
                Ok(())
            }

            async fn current_url(&self) -> Result<Option<String>> {
                Ok(None)
            }

            async fn find_all(&self, _xpath: &str) -> Result<Vec<ElementSnapshot>> {
                Err(Error::Browser("Execution context was destroyed".to_string()))
            }

            async fn fill_field(&self, _locator: &str, _value: &str) -> Result<()> {
                Ok(())
            }

            async fn press_button(&self, _label: &str) -> Result<()> {
                Ok(())
            }

            async fn click_link(&self, _label: &str) -> Result<()> {
                Ok(())
            }

            async fn cookie(&self, _domain: &str, _name: &str) -> Result<Option<String>> {
                Ok(None)
            }
        }

        let started = Instant::now();
        let err = ElementWaiter::new(&BrokenDriver, WaitConfig::default())
            .wait_for_presence(&Selector::css("#loginTwoFactor"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_is_floored() -> Result<()> {
        let driver = NavigatingDriver::new(|| Error::Browser("gone".to_string()));
        let config = WaitConfig {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::ZERO,
        };

        let started = Instant::now();
        ElementWaiter::new(&driver, config)
            .wait_for_presence(&Selector::css("#loginTwoFactor"), true)
            .await?;
        assert_eq!(started.elapsed(), MIN_POLL_INTERVAL * 3);
        Ok(())
    }

    #[test]
    fn zero_poll_interval_is_rejected_in_config() {
        let err = toml::from_str::<WaitConfig>(r#"poll_interval = "0ms""#).unwrap_err();
        assert!(err.to_string().contains("poll_interval must be greater than zero"));

        let config: WaitConfig = toml::from_str(r#"poll_interval = "250ms""#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_secs(20));
    }
}
