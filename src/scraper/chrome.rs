use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::{CrawlError, Result};
use crate::scraper::config::ScraperConfig;
use crate::scraper::{js_string, BrowserCookie, PageDriver};

/// A launched Chrome instance
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    config: ScraperConfig,
}

impl ChromeSession {
    /// Launch a browser with the given configuration
    pub async fn launch(config: &ScraperConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                ..Default::default()
            });

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref executable) = config.executable {
            builder = builder.chrome_executable(executable);
        }

        let browser_config = builder
            .build()
            .map_err(|e| CrawlError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            CrawlError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            config: config.clone(),
        })
    }

    /// Open a blank page
    pub async fn new_page(&self) -> Result<ChromePage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::Browser(format!("Failed to create page: {}", e)))?;

        if let Some(ref ua) = self.config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| CrawlError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        Ok(ChromePage {
            page,
            config: self.config.clone(),
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Error closing browser: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// One browser tab driven through [`PageDriver`]
pub struct ChromePage {
    page: Page,
    config: ScraperConfig,
}

impl ChromePage {
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            debug!("Failed to close page: {}", e);
        }
    }

    fn cookie_param(cookie: &BrowserCookie) -> Result<CookieParam> {
        let mut builder = CookieParam::builder()
            .name(cookie.name.clone())
            .value(cookie.value.clone());

        if let Some(ref domain) = cookie.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(ref path) = cookie.path {
            builder = builder.path(path.clone());
        }
        if let Some(secure) = cookie.secure {
            builder = builder.secure(secure);
        }
        if let Some(http_only) = cookie.http_only {
            builder = builder.http_only(http_only);
        }
        if let Some(expires) = cookie.persistent_expiry() {
            builder = builder.expires(TimeSinceEpoch::new(expires));
        }
        let same_site = match cookie.same_site.as_deref() {
            Some("Strict") => Some(CookieSameSite::Strict),
            Some("Lax") => Some(CookieSameSite::Lax),
            Some("None") => Some(CookieSameSite::None),
            _ => None,
        };
        if let Some(same_site) = same_site {
            builder = builder.same_site(same_site);
        }

        builder
            .build()
            .map_err(|e| CrawlError::Browser(format!("Invalid cookie {}: {}", cookie.name, e)))
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| CrawlError::from_browser(format!("Navigation to {} failed: {}", url, e)))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| CrawlError::from_browser(format!("Navigation failed: {}", e)))?;
            Ok::<(), CrawlError>(())
        };

        tokio::time::timeout(self.config.timeout(), navigation)
            .await
            .map_err(|_| CrawlError::Timeout(format!("navigation to {}", url)))??;

        // Additional wait for dynamic content
        tokio::time::sleep(self.config.wait_after_load()).await;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| CrawlError::from_browser(format!("Script execution failed: {}", e)))?;

        // `undefined` has no JSON value
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if !self.exists(selector).await? {
            return Err(CrawlError::NotFound(selector.to_string()));
        }
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| CrawlError::from_browser(format!("Failed to find {}: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| CrawlError::from_browser(format!("Failed to click {}: {}", selector, e)))?;
        Ok(())
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.evaluate(&format!("window.scrollBy(0, {})", dy)).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| CrawlError::from_browser(format!("Failed to read URL: {}", e)))?;
        Ok(url.unwrap_or_default())
    }

    async fn press_escape(&self) -> Result<()> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| CrawlError::from_browser(format!("Failed to find body: {}", e)))?;
        if let Err(e) = body.press_key("Escape").await {
            // Fall back to a synthetic event when input dispatch is unavailable
            debug!("press_key failed, dispatching synthetic Escape: {}", e);
            self.evaluate(&format!(
                "document.dispatchEvent(new KeyboardEvent('keydown', {{ key: {}, bubbles: true }}))",
                js_string("Escape")
            ))
            .await?;
        }
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<()> {
        let params = cookies
            .iter()
            .map(Self::cookie_param)
            .collect::<Result<Vec<_>>>()?;
        if params.is_empty() {
            return Ok(());
        }
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| CrawlError::Browser(format!("Failed to set cookies: {}", e)))?;
        Ok(())
    }
}
