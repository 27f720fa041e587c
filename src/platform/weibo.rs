use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::app::{CrawlError, Result};
use crate::config::CrawlConfig;
use crate::domain::{Candidate, DetailFields, Query, TaskRun};
use crate::platform::scripts::{self, DetailQuery};
use crate::platform::{ContentExtractor, Navigator};
use crate::scraper::PageDriver;

const SEARCH_URL: &str = "https://s.weibo.com/weibo";

/// Wait after clicking "expand" links for the full text to render
const EXPAND_WAIT: Duration = Duration::from_millis(800);

/// Thumbnail path segments that have a full-size `/large/` variant
const THUMBNAIL_SEGMENTS: [&str; 3] = ["/thumb150/", "/orj360/", "/thumbnail/"];

/// CSS selectors for Weibo search results and user feeds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeiboSelectors {
    /// One feed card
    pub item: String,
    /// Post text, full variant first
    pub text: String,
    pub link: String,
    pub time: String,
    pub images: String,
    /// "Expand" links inside truncated cards
    pub expand: String,
    /// Comments shown inline under a card
    pub comment: String,
    /// Bottom of the result list
    pub end_marker: String,
    pub next_page: String,
    /// Only present when logged in
    pub login_marker: String,
}

impl Default for WeiboSelectors {
    fn default() -> Self {
        Self {
            item: r#"div.card-wrap[mid], article[class*="Feed_wrap"]"#.to_string(),
            text: concat!(
                r#"p[node-type="feed_list_content_full"], "#,
                r#"p[node-type="feed_list_content"], "#,
                r#"div[class*="detail_wbtext"]"#
            )
            .to_string(),
            link: r#".from a[href*="weibo.com"], a[class*="head-info_time"]"#.to_string(),
            time: r#".from a[node-type="feed_list_item_date"], a[class*="head-info_time"]"#
                .to_string(),
            images: r#".media-piclist img, div[class*="picture"] img, img.woo-picture-img"#
                .to_string(),
            expand: r#"a[action-type="fl_unfold"], span[class*="expand"]"#.to_string(),
            comment: r#"[node-type="feed_list_commentList"] .txt, .card-review .txt"#.to_string(),
            end_marker: ".m-page, .card-no-result".to_string(),
            next_page: ".m-page a.next".to_string(),
            login_marker: ".woo-font--profile".to_string(),
        }
    }
}

/// Weibo keyword search and user feeds. Cards are read inline.
#[derive(Debug, Clone)]
pub struct Weibo {
    selectors: WeiboSelectors,
    search_days: u32,
    max_pages: u32,
    feed_timeout: Duration,
    collect_comments: bool,
    max_comments: usize,
}

impl Weibo {
    pub fn new(selectors: WeiboSelectors, crawl: &CrawlConfig) -> Self {
        Self {
            selectors,
            search_days: crawl.search_days,
            max_pages: crawl.max_result_pages.max(1),
            feed_timeout: crawl.detail_timeout(),
            collect_comments: crawl.collect_comments,
            max_comments: crawl.max_comments,
        }
    }

    fn feed_url(&self, query: &Query, page: u32) -> Result<String> {
        match query {
            Query::Keyword(keyword) => {
                search_url(keyword, page, Local::now().date_naive(), self.search_days)
            }
            Query::User(id) => Ok(format!("https://weibo.com/u/{}", id)),
        }
    }

    async fn wait_for_feed(&self, page: &dyn PageDriver) -> Result<()> {
        let ready = format!("{}, {}", self.selectors.item, self.selectors.end_marker);
        page.wait_for_selector(&ready, self.feed_timeout).await
    }
}

/// Search URL for result page `page` covering the last `days` days.
pub fn search_url(keyword: &str, page: u32, today: NaiveDate, days: u32) -> Result<String> {
    let start = today - chrono::Days::new(u64::from(days));
    let timescope = format!(
        "custom:{}:{}",
        start.format("%Y-%m-%d"),
        today.format("%Y-%m-%d")
    );
    let page = page.max(1).to_string();
    let url = Url::parse_with_params(
        SEARCH_URL,
        &[
            ("q", keyword),
            ("typeall", "1"),
            ("suball", "1"),
            ("timescope", timescope.as_str()),
            ("Refer", "g"),
            ("page", page.as_str()),
        ],
    )?;
    Ok(url.to_string())
}

/// Rewrite a thumbnail URL to its full-size variant
pub fn large_image_url(url: &str) -> String {
    for segment in THUMBNAIL_SEGMENTS {
        if url.contains(segment) {
            return url.replacen(segment, "/large/", 1);
        }
    }
    url.to_string()
}

fn parse_candidates(value: Value) -> Result<Vec<Candidate>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        _ => Ok(Vec::new()),
    }
}

#[async_trait]
impl Navigator for Weibo {
    async fn open_feed(&self, page: &dyn PageDriver, task: &TaskRun) -> Result<()> {
        let url = self.feed_url(&task.query, 1)?;
        debug!("Opening {}", url);
        page.navigate(&url).await?;
        self.wait_for_feed(page).await
    }

    async fn next_page(&self, page: &dyn PageDriver, task: &TaskRun, current: u32) -> Result<bool> {
        if !matches!(task.query, Query::Keyword(_)) || current >= self.max_pages {
            return Ok(false);
        }
        if !page.exists(&self.selectors.next_page).await? {
            return Ok(false);
        }

        let url = self.feed_url(&task.query, current + 1)?;
        debug!("Moving to result page {}", current + 1);
        page.navigate(&url).await?;
        self.wait_for_feed(page).await?;
        Ok(true)
    }

    async fn is_logged_in(&self, page: &dyn PageDriver) -> Result<bool> {
        page.exists(&self.selectors.login_marker).await
    }
}

#[async_trait]
impl ContentExtractor for Weibo {
    async fn scan(&self, page: &dyn PageDriver) -> Result<Vec<Candidate>> {
        let script = scripts::scan_script(
            &self.selectors.item,
            &self.selectors.text,
            &self.selectors.link,
        );
        parse_candidates(page.evaluate(&script).await?)
    }

    async fn open_item(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<()> {
        let script = scripts::click_all_script(&candidate.selector(), &self.selectors.expand);
        let clicked = page.evaluate(&script).await?.as_u64().unwrap_or(0);
        if clicked > 0 {
            debug!("Expanded {} truncated sections", clicked);
            tokio::time::sleep(EXPAND_WAIT).await;
        }
        Ok(())
    }

    async fn extract(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<DetailFields> {
        let selector = candidate.selector();
        let script = scripts::detail_script(&DetailQuery {
            scope: Some(&selector),
            title: None,
            text: &self.selectors.text,
            link: &self.selectors.link,
            time: &self.selectors.time,
            images: &self.selectors.images,
            page_url_fallback: false,
        });

        let value = page.evaluate(&script).await?;
        if value.is_null() {
            return Err(CrawlError::NotFound(selector));
        }

        let mut fields: DetailFields = serde_json::from_value(value)?;
        fields.image_urls = fields.image_urls.iter().map(|u| large_image_url(u)).collect();
        if fields.url.is_none() {
            fields.url = candidate.url.clone();
        }
        Ok(fields)
    }

    async fn comments(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<Vec<String>> {
        if !self.collect_comments {
            return Ok(Vec::new());
        }
        let script = scripts::texts_script(
            Some(&candidate.selector()),
            &self.selectors.comment,
            self.max_comments,
        );
        match page.evaluate(&script).await? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn close_item(&self, _page: &dyn PageDriver, _candidate: &Candidate) -> Result<()> {
        Ok(())
    }

    async fn end_of_feed(&self, page: &dyn PageDriver) -> Result<bool> {
        let script = scripts::reached_script(&self.selectors.end_marker);
        Ok(page.evaluate(&script).await?.as_bool().unwrap_or(false))
    }
}
