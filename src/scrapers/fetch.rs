//! Page acquisition for the command line: plain HTTP, or a headless Chrome
//! render for pages that build their content client-side.

use anyhow::{bail, Context, Result};
use headless_chrome::{Browser, LaunchOptions};
use reqwest::Client;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Downloads listing pages over HTTP.
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// HTML of the page at `url`.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        info!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned status {}", url, status);
        }

        let html = response
            .text()
            .await
            .context("Failed to read response body")?;
        debug!("Fetched {} bytes from {}", html.len(), url);
        Ok(html)
    }
}

/// Renders pages in headless Chrome and captures the resulting DOM.
pub struct BrowserRenderer {
    browser: Browser,
    settle: Duration,
}

impl BrowserRenderer {
    pub fn new(settle: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser, settle })
    }

    /// Outer HTML of the document once the page has settled.
    pub fn render(&self, url: &str) -> Result<String> {
        let tab = self.browser.new_tab()?;

        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        info!("Waiting {:?} for {} to settle...", self.settle, url);
        thread::sleep(self.settle);

        // Cookie walls hide the listing on some portals
        let _ = tab.evaluate(
            r#"
            const button = document.querySelector('button[id*="accept"], button[id*="consent"]');
            if (button) button.click();
            "#,
            false,
        );

        let result = tab.evaluate("document.documentElement.outerHTML", false)?;
        let Some(html) = result.value.as_ref().and_then(|v| v.as_str()) else {
            warn!("Could not get HTML from {}", url);
            bail!("Rendered page {} returned no HTML", url);
        };
        if html.is_empty() {
            bail!("Rendered page {} is empty", url);
        }

        info!("Captured {} bytes of rendered HTML", html.len());
        Ok(html.to_string())
    }
}
