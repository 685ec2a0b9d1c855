//!  Swoop Fare Scraper
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # WebDriver browser sessions
//!
//! Chrome driven over the WebDriver protocol (chromedriver). The disguise is
//! applied twice: as launch arguments, and through the DevTools protocol so
//! that the stealth script runs before any page script on every document.
//!
//! Requirements: chromedriver reachable at `server_url`
//! (`chromedriver --port=9515`).

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use swoop_browser_disguise::Disguise;
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};

use crate::page_acquirer::{BrowserLauncher, BrowserSession};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Set on `window` right before a click; a fresh document no longer has it.
const NAVIGATION_MARKER: &str = "__swoopAwaitingNavigation";

/// Counts resource loads on each document. The resource timing buffer holds
/// 250 entries by default, so its length alone stops moving on busy pages.
const RESOURCE_COUNTER_SCRIPT: &str = r#"
(() => {
    let seen = 0;
    if (performance.setResourceTimingBufferSize) {
        performance.setResourceTimingBufferSize(100000);
    }
    try {
        new PerformanceObserver((list) => { seen += list.getEntries().length; })
            .observe({ type: 'resource', buffered: true });
    } catch (e) {
        return;
    }
    Object.defineProperty(window, '__swoopResourceCount', { get: () => seen, enumerable: false });
})();
"#;

const IDLE_SNAPSHOT_SCRIPT: &str = "const seen = window.__swoopResourceCount; \
     return [document.readyState, \
     typeof seen === 'number' ? seen : performance.getEntriesByType('resource').length];";

#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    pub server_url: String,
    pub headless: bool,
    pub chrome_binary: Option<String>,
}

impl Default for WebDriverLauncher {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            chrome_binary: None,
        }
    }
}

impl WebDriverLauncher {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    fn capabilities(&self, disguise: &Disguise) -> anyhow::Result<thirtyfour::ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();
        if self.headless {
            caps.add_arg("--headless=new")?;
        }
        for arg in disguise.chrome_args() {
            caps.add_arg(&arg)?;
        }
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--no-first-run")?;
        caps.add_exclude_switch("enable-automation")?;
        caps.add_experimental_option("useAutomationExtension", false)?;
        if let Some(binary) = &self.chrome_binary {
            caps.set_binary(binary)?;
        }
        Ok(caps)
    }
}

impl BrowserLauncher for WebDriverLauncher {
    type Session = WebDriverSession;

    async fn launch(&self, disguise: &Disguise) -> anyhow::Result<WebDriverSession> {
        let caps = self.capabilities(disguise)?;
        let driver = WebDriver::new(&self.server_url, caps)
            .await
            .map_err(|e| anyhow!("WebDriver error at {}: {}", self.server_url, e))?;

        if let Err(e) = prepare_documents(&driver, disguise).await {
            let _ = driver.quit().await;
            return Err(e);
        }

        Ok(WebDriverSession {
            driver: Some(driver),
            url_before_click: None,
        })
    }
}

/// Scripts and overrides that must be in place before the first navigation.
async fn prepare_documents(driver: &WebDriver, disguise: &Disguise) -> anyhow::Result<()> {
    let dev_tools = ChromeDevTools::new(driver.handle.clone());
    dev_tools
        .execute_cdp_with_params(
            "Network.setUserAgentOverride",
            json!({
                "userAgent": disguise.user_agent,
                "acceptLanguage": disguise.accept_language,
                "platform": disguise.platform,
            }),
        )
        .await
        .context("Failed to override the user agent")?;
    dev_tools
        .execute_cdp_with_params(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": disguise.stealth_script() }),
        )
        .await
        .context("Failed to install the stealth script")?;
    dev_tools
        .execute_cdp_with_params(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": RESOURCE_COUNTER_SCRIPT }),
        )
        .await
        .context("Failed to install the resource counter")?;
    Ok(())
}

pub struct WebDriverSession {
    driver: Option<WebDriver>,
    url_before_click: Option<String>,
}

impl WebDriverSession {
    fn driver(&self) -> anyhow::Result<&WebDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| anyhow!("WebDriver session already closed"))
    }

    async fn eval(&self, script: &str) -> anyhow::Result<Value> {
        let ret = self.driver()?.execute(script, Vec::new()).await?;
        Ok(ret.json().clone())
    }
}

impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.driver()?.goto(url).await?;
        Ok(())
    }

    async fn wait_network_idle(
        &mut self,
        quiet_window: Duration,
        poll_interval: Duration,
    ) -> anyhow::Result<()> {
        let mut last_count = None;
        let mut quiet_since = Instant::now();
        loop {
            let snapshot = self.eval(IDLE_SNAPSHOT_SCRIPT).await?;
            let complete = snapshot[0].as_str() == Some("complete");
            let count = snapshot[1].as_u64();

            if complete && count.is_some() && count == last_count {
                if quiet_since.elapsed() >= quiet_window {
                    return Ok(());
                }
            } else {
                last_count = count;
                quiet_since = Instant::now();
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn current_url(&mut self) -> anyhow::Result<String> {
        Ok(self.driver()?.current_url().await?.to_string())
    }

    async fn wait_visible(&mut self, css: &str, poll_interval: Duration) -> anyhow::Result<()> {
        let driver = self.driver()?;
        loop {
            if let Ok(el) = driver.query(By::Css(css)).nowait().first().await {
                if let Ok(true) = el.is_displayed().await {
                    return Ok(());
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn click(&mut self, css: &str) -> anyhow::Result<()> {
        let before = self.current_url().await?;
        self.eval(&format!("window.{NAVIGATION_MARKER} = true; return true;"))
            .await?;
        let driver = self.driver()?;
        let el = driver.query(By::Css(css)).nowait().first().await?;
        el.click().await?;
        self.url_before_click = Some(before);
        Ok(())
    }

    async fn wait_for_navigation(&mut self, poll_interval: Duration) -> anyhow::Result<()> {
        let before = self
            .url_before_click
            .take()
            .context("No click is awaiting navigation")?;
        let navigation_check = format!(
            "return [window.{NAVIGATION_MARKER} === true, document.readyState, location.href];"
        );
        loop {
            // Scripts fail while the old document is unloading
            if let Ok(snapshot) = self.eval(&navigation_check).await {
                let marker_present = snapshot[0].as_bool().unwrap_or(true);
                let complete = snapshot[1].as_str() == Some("complete");
                let url_changed = snapshot[2].as_str().is_some_and(|href| href != before);
                if complete && (!marker_present || url_changed) {
                    return Ok(());
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn page_source(&mut self) -> anyhow::Result<String> {
        Ok(self.driver()?.source().await?)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_counter_outgrows_timing_buffer() {
        assert!(RESOURCE_COUNTER_SCRIPT.contains("setResourceTimingBufferSize(100000)"));
        assert!(RESOURCE_COUNTER_SCRIPT.contains("new PerformanceObserver"));
        assert!(RESOURCE_COUNTER_SCRIPT.contains("'__swoopResourceCount'"));
    }

    #[test]
    fn test_idle_snapshot_prefers_counter() {
        assert!(IDLE_SNAPSHOT_SCRIPT.starts_with("const seen = window.__swoopResourceCount;"));
        assert!(IDLE_SNAPSHOT_SCRIPT.contains("performance.getEntriesByType('resource').length"));
    }
}
