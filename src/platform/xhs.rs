use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::app::{CrawlError, Result};
use crate::config::CrawlConfig;
use crate::domain::{Candidate, DetailFields, Query, TaskRun};
use crate::platform::scripts::{self, DetailQuery};
use crate::platform::{CommentCollector, CommentSelectors, ContentExtractor, Navigator};
use crate::scraper::{PageDriver, Supervisor};

const SEARCH_URL: &str = "https://www.xiaohongshu.com/search_result";
const NOTE_URL: &str = "https://www.xiaohongshu.com/explore/";

/// CSS selectors for Xiaohongshu search results and note overlays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XhsSelectors {
    /// One note card in the result grid
    pub item: String,
    /// Card title
    pub title: String,
    pub link: String,
    /// Clickable cover inside a card
    pub cover: String,
    /// Overlay shown while a note is open
    pub detail_root: String,
    pub detail_title: String,
    pub detail_text: String,
    pub detail_time: String,
    pub detail_images: String,
    pub comments: CommentSelectors,
    /// Bottom of the result grid
    pub end_marker: String,
    /// Only present when logged out
    pub login_button: String,
}

impl Default for XhsSelectors {
    fn default() -> Self {
        Self {
            item: "section.note-item".to_string(),
            title: ".footer .title, a.title".to_string(),
            link: r#"a.cover, a[href*="/explore/"], a[href*="/search_result/"]"#.to_string(),
            cover: "a.cover".to_string(),
            detail_root: "#noteContainer".to_string(),
            detail_title: "#detail-title".to_string(),
            detail_text: "#detail-desc .note-text, #detail-desc".to_string(),
            detail_time: ".note-content .date".to_string(),
            detail_images: "div.swiper-slide img.note-slider-img".to_string(),
            comments: CommentSelectors::default(),
            end_marker: ".feeds-page .end-container".to_string(),
            login_button: ".login-button".to_string(),
        }
    }
}

/// Xiaohongshu keyword search. Notes open in an overlay closed with Escape.
#[derive(Debug, Clone)]
pub struct Xhs {
    selectors: XhsSelectors,
    detail_timeout: Duration,
    collect_comments: bool,
    comments: CommentCollector,
}

impl Xhs {
    pub fn new(selectors: XhsSelectors, crawl: &CrawlConfig, supervisor: Supervisor) -> Self {
        let comments = CommentCollector::new(selectors.comments.clone(), crawl, supervisor);
        Self {
            selectors,
            detail_timeout: crawl.detail_timeout(),
            collect_comments: crawl.collect_comments,
            comments,
        }
    }
}

/// Search URL for a keyword
pub fn search_url(keyword: &str) -> Result<String> {
    let url = Url::parse_with_params(SEARCH_URL, &[("keyword", keyword), ("source", "web_explore_feed")])?;
    Ok(url.to_string())
}

/// Map search-result links to the canonical `/explore/<id>` note URL.
pub fn note_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        ["search_result", id] | ["explore", id] | ["discovery", "item", id] => {
            format!("{}{}", NOTE_URL, id)
        }
        _ => raw.to_string(),
    }
}

fn is_note_url(url: &str) -> bool {
    url.starts_with(NOTE_URL)
}

#[async_trait]
impl Navigator for Xhs {
    async fn open_feed(&self, page: &dyn PageDriver, task: &TaskRun) -> Result<()> {
        let keyword = match &task.query {
            Query::Keyword(keyword) => keyword,
            Query::User(_) => {
                return Err(CrawlError::Task("user feeds are not supported on xhs".into()));
            }
        };
        let url = search_url(keyword)?;
        debug!("Opening {}", url);
        page.navigate(&url).await?;
        page.wait_for_selector(&self.selectors.item, self.detail_timeout)
            .await
    }

    async fn is_logged_in(&self, page: &dyn PageDriver) -> Result<bool> {
        Ok(!page.exists(&self.selectors.login_button).await?)
    }
}

#[async_trait]
impl ContentExtractor for Xhs {
    async fn scan(&self, page: &dyn PageDriver) -> Result<Vec<Candidate>> {
        let script = scripts::scan_script(
            &self.selectors.item,
            &self.selectors.title,
            &self.selectors.link,
        );
        let value = page.evaluate(&script).await?;
        let mut candidates: Vec<Candidate> = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            _ => return Ok(Vec::new()),
        };
        for candidate in &mut candidates {
            candidate.url = candidate.url.as_deref().map(note_url);
        }
        Ok(candidates)
    }

    async fn open_item(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<()> {
        // A retry after a content timeout finds the overlay still open;
        // clicking the card behind it would do nothing
        if page.exists(&self.selectors.detail_root).await? {
            debug!("Note overlay still open, closing before opening '{}'", candidate.display_title());
            self.close_item(page, candidate).await?;
        }

        let selector = candidate.selector();
        let cover = format!("{} {}", selector, self.selectors.cover);
        match page.click(&cover).await {
            Err(CrawlError::NotFound(_)) => page.click(&selector).await?,
            other => other?,
        }

        // The overlay renders before its text; wait for real content
        let ready = scripts::any_text_script(&[
            self.selectors.detail_title.as_str(),
            self.selectors.detail_text.as_str(),
        ]);
        page.wait_for_condition(&ready, self.detail_timeout, "note detail content")
            .await
    }

    async fn extract(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<DetailFields> {
        let script = scripts::detail_script(&DetailQuery {
            scope: None,
            title: Some(&self.selectors.detail_title),
            text: &self.selectors.detail_text,
            link: r#"link[rel="canonical"]"#,
            time: &self.selectors.detail_time,
            images: &self.selectors.detail_images,
            page_url_fallback: true,
        });

        let value = page.evaluate(&script).await?;
        if value.is_null() {
            return Err(CrawlError::NotFound(self.selectors.detail_root.clone()));
        }

        let mut fields: DetailFields = serde_json::from_value(value)?;
        let page_url = fields.url.as_deref().map(note_url);
        fields.url = match page_url {
            Some(url) if is_note_url(&url) => Some(url),
            other => candidate.url.clone().or(other),
        };
        Ok(fields)
    }

    async fn comments(&self, page: &dyn PageDriver, _candidate: &Candidate) -> Result<Vec<String>> {
        if !self.collect_comments {
            return Ok(Vec::new());
        }
        Ok(self.comments.collect(page).await)
    }

    async fn close_item(&self, page: &dyn PageDriver, _candidate: &Candidate) -> Result<()> {
        page.press_escape().await?;
        let closed = scripts::absent_script(&self.selectors.detail_root);
        page.wait_for_condition(&closed, self.detail_timeout, "note overlay to close")
            .await
    }

    async fn end_of_feed(&self, page: &dyn PageDriver) -> Result<bool> {
        let script = scripts::reached_script(&self.selectors.end_marker);
        Ok(page.evaluate(&script).await?.as_bool().unwrap_or(false))
    }
}
