//! In-memory fakes of the page, platform, fetcher and OCR seams.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::app::{CrawlError, Result};
use crate::config::{CrawlConfig, TaskRunConfig};
use crate::domain::{Candidate, DetailFields, Platform, Query, TaskRun};
use crate::fetcher::{FetchedImage, ImageFetcher};
use crate::ocr::OcrService;
use crate::platform::{ContentExtractor, Navigator, PlatformKit, Scroller};
use crate::scraper::{BrowserCookie, PacingConfig, PageDriver, RetryConfig};

pub fn run_config(root: &Path, max_items: usize, image_processing: bool) -> TaskRunConfig {
    TaskRunConfig {
        task: TaskRun {
            platform: Platform::Xhs,
            query: Query::Keyword("foo".into()),
            max_items,
            image_processing,
            export: None,
        },
        task_dir: root.join("task"),
        cookie_path: root.join("xiaohongshu_cookie.json"),
        crawl: CrawlConfig {
            stall_limit: 3,
            settle_delay_ms: 0,
            ..Default::default()
        },
        retry: RetryConfig {
            max_attempts: 2,
            base_delay_ms: 0,
        },
        pacing: PacingConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
        },
        ocr_enabled: image_processing,
    }
}

/// Candidates with references and note URLs numbered from `range`
pub fn candidates(range: std::ops::RangeInclusive<u32>) -> Vec<Candidate> {
    range
        .map(|n| Candidate {
            reference: n.to_string(),
            title: format!("post {}", n),
            url: Some(format!("https://www.xiaohongshu.com/explore/{}", n)),
        })
        .collect()
}

/// A page that answers nothing interesting
#[derive(Default)]
pub struct FakePage {
    offscreen: bool,
    scrolled_into_view: Mutex<Vec<String>>,
    pub cookies: Mutex<usize>,
    pub navigated: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn offscreen() -> Self {
        Self {
            offscreen: true,
            ..Default::default()
        }
    }

    pub fn scrolled_into_view(&self) -> Vec<String> {
        self.scrolled_into_view.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigated.lock().unwrap().push(url.to_string());
        Ok(())
    }
    async fn evaluate(&self, _script: &str) -> Result<Value> {
        Ok(Value::Null)
    }
    async fn click(&self, _selector: &str) -> Result<()> {
        Ok(())
    }
    async fn scroll_by(&self, _dy: i64) -> Result<()> {
        Ok(())
    }
    async fn current_url(&self) -> Result<String> {
        Ok("about:blank".into())
    }
    async fn press_escape(&self) -> Result<()> {
        Ok(())
    }
    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<()> {
        *self.cookies.lock().unwrap() += cookies.len();
        Ok(())
    }
    async fn is_in_viewport(&self, _selector: &str) -> Result<bool> {
        Ok(!self.offscreen)
    }
    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        self.scrolled_into_view
            .lock()
            .unwrap()
            .push(selector.to_string());
        Ok(())
    }
}

/// A scripted feed: one candidate list per scroll position, the last one
/// repeating once scrolling runs past the end. A feed may span several
/// result pages, each with its own passes.
#[derive(Default)]
pub struct FeedState {
    pages: Vec<Vec<Vec<Candidate>>>,
    page: AtomicUsize,
    position: AtomicUsize,
    end_at: Option<usize>,
    failing: Vec<String>,
    extracted: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

impl FeedState {
    pub fn new(passes: Vec<Vec<Candidate>>) -> Arc<Self> {
        Arc::new(Self {
            pages: vec![passes],
            ..Default::default()
        })
    }

    /// The end marker shows from scroll position `end_at` on
    pub fn with_end(passes: Vec<Vec<Candidate>>, end_at: usize) -> Arc<Self> {
        Self::paged(vec![passes], end_at)
    }

    /// Several result pages whose end marker shows from `end_at` on
    pub fn paged(pages: Vec<Vec<Vec<Candidate>>>, end_at: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            end_at: Some(end_at),
            ..Default::default()
        })
    }

    /// Index of the result page on screen
    pub fn page(&self) -> usize {
        self.page.load(Ordering::SeqCst)
    }

    /// Move to the next result page, scrolled to the top
    fn turn_page(&self) -> bool {
        let next = self.page() + 1;
        if next >= self.pages.len() {
            return false;
        }
        self.page.store(next, Ordering::SeqCst);
        self.position.store(0, Ordering::SeqCst);
        true
    }

    /// Extraction of these references fails
    pub fn failing(self: Arc<Self>, refs: &[&str]) -> Arc<Self> {
        let mut state = Arc::try_unwrap(self).unwrap_or_default();
        state.failing = refs.iter().map(|r| r.to_string()).collect();
        Arc::new(state)
    }

    /// References of every extraction attempt, in order
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }

    fn current(&self) -> Vec<Candidate> {
        let Some(passes) = self.pages.get(self.page()).filter(|p| !p.is_empty()) else {
            return Vec::new();
        };
        let position = self.position.load(Ordering::SeqCst).min(passes.len() - 1);
        passes[position].clone()
    }
}

pub struct FakeExtractor {
    feed: Arc<FeedState>,
    images: Vec<String>,
    empty: bool,
}

impl FakeExtractor {
    pub fn with_images(urls: &[&str]) -> Self {
        Self {
            feed: FeedState::new(Vec::new()),
            images: urls.iter().map(|u| u.to_string()).collect(),
            empty: false,
        }
    }

    pub fn empty_content() -> Self {
        Self {
            empty: true,
            ..Self::with_images(&[])
        }
    }

    pub fn closed(&self) -> usize {
        self.feed.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn scan(&self, _page: &dyn PageDriver) -> Result<Vec<Candidate>> {
        Ok(self.feed.current())
    }

    async fn open_item(&self, _page: &dyn PageDriver, _candidate: &Candidate) -> Result<()> {
        Ok(())
    }

    async fn extract(&self, _page: &dyn PageDriver, candidate: &Candidate) -> Result<DetailFields> {
        self.feed
            .extracted
            .lock()
            .unwrap()
            .push(candidate.reference.clone());
        if self.feed.failing.contains(&candidate.reference) {
            return Err(CrawlError::NotFound(candidate.selector()));
        }
        if self.empty {
            return Ok(DetailFields::default());
        }
        Ok(DetailFields {
            title: candidate.title.clone(),
            text: format!("body of {}", candidate.title),
            url: candidate.url.clone(),
            published_at: None,
            image_urls: self.images.clone(),
        })
    }

    async fn comments(&self, _page: &dyn PageDriver, _candidate: &Candidate) -> Result<Vec<String>> {
        Ok(vec!["first!".into()])
    }

    async fn close_item(&self, _page: &dyn PageDriver, _candidate: &Candidate) -> Result<()> {
        self.feed.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn end_of_feed(&self, _page: &dyn PageDriver) -> Result<bool> {
        let position = self.feed.position.load(Ordering::SeqCst);
        Ok(self.feed.end_at.is_some_and(|end| position >= end))
    }
}

struct FakeScroller {
    feed: Arc<FeedState>,
}

#[async_trait]
impl Scroller for FakeScroller {
    async fn advance(&self, _page: &dyn PageDriver) -> Result<f64> {
        let position = self.feed.position.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(position as f64 * 800.0)
    }
}

/// Navigator whose feed opens unless told otherwise
#[derive(Default)]
pub struct FakeNavigator {
    pub unreachable: bool,
    /// Feed whose further result pages `next_page` opens
    pub paged: Option<Arc<FeedState>>,
}

#[async_trait]
impl Navigator for FakeNavigator {
    async fn open_home(&self, _page: &dyn PageDriver, _task: &TaskRun) -> Result<()> {
        if self.unreachable {
            return Err(CrawlError::from_browser("net::ERR_CONNECTION_REFUSED connection refused"));
        }
        Ok(())
    }

    async fn open_feed(&self, _page: &dyn PageDriver, _task: &TaskRun) -> Result<()> {
        Ok(())
    }

    async fn next_page(&self, _page: &dyn PageDriver, _task: &TaskRun, _current: u32) -> Result<bool> {
        Ok(self.paged.as_ref().is_some_and(|feed| feed.turn_page()))
    }

    async fn is_logged_in(&self, _page: &dyn PageDriver) -> Result<bool> {
        Ok(true)
    }
}

pub fn kit(feed: Arc<FeedState>) -> PlatformKit {
    kit_with(feed, FakeNavigator::default())
}

/// Kit whose navigator turns the feed's result pages
pub fn kit_paged(feed: Arc<FeedState>) -> PlatformKit {
    let navigator = FakeNavigator {
        paged: Some(feed.clone()),
        ..Default::default()
    };
    kit_with(feed, navigator)
}

pub fn kit_with(feed: Arc<FeedState>, navigator: FakeNavigator) -> PlatformKit {
    PlatformKit {
        navigator: Box::new(navigator),
        extractor: Box::new(FakeExtractor {
            feed: feed.clone(),
            images: Vec::new(),
            empty: false,
        }),
        scroller: Box::new(FakeScroller { feed }),
    }
}

/// Serves a tiny body for every URL except those containing "missing"
pub struct FakeFetcher;

pub fn fetcher() -> FakeFetcher {
    FakeFetcher
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        if url.contains("missing") {
            return Err(CrawlError::NotFound(url.to_string()));
        }
        Ok(FetchedImage {
            body: b"\x89PNG fake".to_vec(),
            content_type: None,
        })
    }
}

/// Returns "text of <file name>", failing for paths containing a marker
pub struct FakeOcr {
    fail_marker: String,
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: marker.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for FakeOcr {
    async fn extract_text(&self, image: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains(&self.fail_marker) {
            return Err(CrawlError::Ocr(format!("engine crashed on {}", name)));
        }
        Ok(format!("text of {}", name))
    }
}
