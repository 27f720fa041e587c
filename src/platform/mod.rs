//! Platform capabilities.
//!
//! The crawl loop is written once against three small traits; each platform
//! provides its own implementations:
//!
//! - [`Navigator`]: reach the feed of a task and page through results
//! - [`ContentExtractor`]: list the rendered items and read one item
//! - [`Scroller`]: move the feed forward
//!
//! All page access goes through [`PageDriver`], so the traits are testable
//! against a fake page.

mod comments;
pub mod scripts;
mod weibo;
mod xhs;

pub use comments::{CommentCollector, CommentSelectors};
pub use weibo::{Weibo, WeiboSelectors};
pub use xhs::{Xhs, XhsSelectors};

use async_trait::async_trait;

use crate::app::Result;
use crate::config::{Config, TaskRunConfig};
use crate::domain::{Candidate, DetailFields, Platform, TaskRun};
use crate::scraper::PageDriver;

/// Moves the browser to a task's feed.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Land on the platform home page; cookies must already be installed
    async fn open_home(&self, page: &dyn PageDriver, task: &TaskRun) -> Result<()> {
        page.navigate(task.platform.home_url()).await
    }

    /// Navigate to the feed of `task` and wait for it to render
    async fn open_feed(&self, page: &dyn PageDriver, task: &TaskRun) -> Result<()>;

    /// Advance to the result page after `current` (1-based).
    ///
    /// Returns `false` when there is no further page.
    async fn next_page(&self, _page: &dyn PageDriver, _task: &TaskRun, _current: u32) -> Result<bool> {
        Ok(false)
    }

    async fn is_logged_in(&self, page: &dyn PageDriver) -> Result<bool>;
}

/// Lists feed items and reads them.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Snapshot of the items currently rendered, in page order
    async fn scan(&self, page: &dyn PageDriver) -> Result<Vec<Candidate>>;

    /// Bring the item's full content on screen
    async fn open_item(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<()>;

    async fn extract(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<DetailFields>;

    /// Comments of an opened item; callers treat failure as no comments
    async fn comments(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<Vec<String>>;

    /// Return to the feed
    async fn close_item(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<()>;

    /// Whether the feed shows its end-of-content marker
    async fn end_of_feed(&self, page: &dyn PageDriver) -> Result<bool>;
}

/// Moves the feed forward.
#[async_trait]
pub trait Scroller: Send + Sync {
    /// Scroll one step; returns the new vertical offset
    async fn advance(&self, page: &dyn PageDriver) -> Result<f64>;
}

/// Scrolls the window by a share of the viewport height
#[derive(Debug, Clone)]
pub struct ViewportScroller {
    fraction: f64,
}

impl ViewportScroller {
    /// Step used when the viewport height can't be read
    const FALLBACK_STEP: f64 = 600.0;

    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }
}

#[async_trait]
impl Scroller for ViewportScroller {
    async fn advance(&self, page: &dyn PageDriver) -> Result<f64> {
        let height = page.viewport_height().await?;
        let height = if height > 0.0 { height } else { Self::FALLBACK_STEP };
        let step = (height * self.fraction).round() as i64;
        page.scroll_by(step.max(1)).await?;
        Ok(page.evaluate("window.scrollY").await?.as_f64().unwrap_or(0.0))
    }
}

/// The three capabilities of one platform, bundled for a task run
pub struct PlatformKit {
    pub navigator: Box<dyn Navigator>,
    pub extractor: Box<dyn ContentExtractor>,
    pub scroller: Box<dyn Scroller>,
}

impl PlatformKit {
    pub fn for_task(run: &TaskRunConfig, config: &Config) -> Self {
        let scroller = Box::new(ViewportScroller::new(run.crawl.scroll_fraction()));
        match run.task.platform {
            Platform::Weibo => {
                let weibo = Weibo::new(config.weibo.clone(), &run.crawl);
                Self {
                    navigator: Box::new(weibo.clone()),
                    extractor: Box::new(weibo),
                    scroller,
                }
            }
            Platform::Xhs => {
                let xhs = Xhs::new(config.xhs.clone(), &run.crawl, run.supervisor());
                Self {
                    navigator: Box::new(xhs.clone()),
                    extractor: Box::new(xhs),
                    scroller,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::BrowserCookie;
    use serde_json::Value;
    use std::sync::Mutex;

    struct ScrollPage {
        scrolled: Mutex<Vec<i64>>,
        height: f64,
    }

    #[async_trait]
    impl PageDriver for ScrollPage {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn evaluate(&self, script: &str) -> Result<Value> {
            Ok(match script {
                "window.innerHeight" => serde_json::json!(self.height),
                "window.scrollY" => {
                    serde_json::json!(self.scrolled.lock().unwrap().iter().sum::<i64>())
                }
                _ => Value::Null,
            })
        }
        async fn click(&self, _selector: &str) -> Result<()> {
            Ok(())
        }
        async fn scroll_by(&self, dy: i64) -> Result<()> {
            self.scrolled.lock().unwrap().push(dy);
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn press_escape(&self) -> Result<()> {
            Ok(())
        }
        async fn set_cookies(&self, _cookies: &[BrowserCookie]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_viewport_scroller_steps_by_fraction() {
        let page = ScrollPage {
            scrolled: Mutex::new(Vec::new()),
            height: 1000.0,
        };
        let scroller = ViewportScroller::new(0.8);
        assert_eq!(scroller.advance(&page).await.unwrap(), 800.0);
        assert_eq!(scroller.advance(&page).await.unwrap(), 1600.0);
    }

    #[tokio::test]
    async fn test_viewport_scroller_falls_back_without_height() {
        let page = ScrollPage {
            scrolled: Mutex::new(Vec::new()),
            height: 0.0,
        };
        ViewportScroller::new(0.5).advance(&page).await.unwrap();
        assert_eq!(*page.scrolled.lock().unwrap(), vec![300]);
    }
}
