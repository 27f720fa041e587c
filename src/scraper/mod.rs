//! Browser automation layer.
//!
//! Everything that touches a live page goes through [`PageDriver`], a small
//! async interface over the browser engine. [`ChromePage`] implements it
//! with chromiumoxide; tests substitute fakes.
//!
//! # Architecture
//!
//! ```text
//! ChromeSession → ChromePage (PageDriver) → platform extractors → crawler
//!                       ↑
//!              Supervisor (retry/backoff), Pacing (human-like delays)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use socialcrawl::scraper::{ChromeSession, PageDriver, ScraperConfig};
//!
//! let session = ChromeSession::launch(&ScraperConfig::default()).await?;
//! let page = session.new_page().await?;
//! page.navigate("https://www.xiaohongshu.com").await?;
//! page.wait_for_text("#detail-title", Duration::from_secs(10)).await?;
//! ```

mod chrome;
mod config;
mod cookies;
mod pacing;
mod retry;
mod stall;

pub use chrome::{ChromePage, ChromeSession};
pub use config::ScraperConfig;
pub use cookies::{load_cookies, BrowserCookie};
pub use pacing::{Pacing, PacingConfig};
pub use retry::{Outcome, RetryConfig, Supervisor};
pub use stall::StallCounter;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::app::{CrawlError, Result};

/// Interval between polls while waiting on the page
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Async interface over one browser page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Click the first element matching `selector`
    ///
    /// Fails with [`CrawlError::NotFound`] when nothing matches.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Scroll the window vertically by `dy` pixels
    async fn scroll_by(&self, dy: i64) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Press Escape, closing overlays and detail views
    async fn press_escape(&self) -> Result<()>;

    /// Install cookies; must happen before navigating to their domain
    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<()>;

    /// Whether any element matches `selector`
    async fn exists(&self, selector: &str) -> Result<bool> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    /// Wait until an element matching `selector` is present
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until an element matching `selector` is present and has
    /// non-empty text; containers often render before their text does.
    async fn wait_for_text(&self, selector: &str, timeout: Duration) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             return !!el && (el.innerText || '').trim().length > 0; }})()",
            js_string(selector)
        );
        self.wait_for_condition(&script, timeout, &format!("text in {}", selector))
            .await
    }

    /// Poll a boolean script until it returns `true`
    async fn wait_for_condition(&self, script: &str, timeout: Duration, what: &str) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.evaluate(script).await?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::Timeout(what.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Whether the element intersects the current viewport
    async fn is_in_viewport(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             return r.bottom > 0 && r.right > 0 && \
                    r.top < window.innerHeight && r.left < window.innerWidth; }})()",
            js_string(selector)
        );
        match self.evaluate(&script).await? {
            Value::Bool(visible) => Ok(visible),
            _ => Err(CrawlError::NotFound(selector.to_string())),
        }
    }

    /// Scroll the element to the middle of the viewport
    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; \
             el.scrollIntoView({{ block: 'center', inline: 'nearest' }}); \
             return true; }})()",
            js_string(selector)
        );
        if self.evaluate(&script).await?.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(CrawlError::NotFound(selector.to_string()))
        }
    }

    /// Current viewport height in pixels
    async fn viewport_height(&self) -> Result<f64> {
        Ok(self
            .evaluate("window.innerHeight")
            .await?
            .as_f64()
            .unwrap_or(0.0))
    }
}

/// Quote a string as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
