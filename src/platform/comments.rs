use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CrawlConfig;
use crate::platform::scripts;
use crate::scraper::{Outcome, PageDriver, StallCounter, Supervisor};

/// Share of the container height scrolled per step
const SCROLL_FRACTION: f64 = 0.8;

/// Where comments live inside an open detail view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentSelectors {
    /// Scrollable element holding the comment list
    pub container: String,
    /// One comment's text
    pub comment: String,
    /// Shown once every comment is loaded
    pub end_marker: String,
}

impl Default for CommentSelectors {
    fn default() -> Self {
        Self {
            container: "#noteContainer .note-scroller".to_string(),
            comment: "#noteContainer .comments-el .content".to_string(),
            end_marker: "#noteContainer .comments-el .end-container".to_string(),
        }
    }
}

/// Scrolls a comment container until it stops yielding new comments.
#[derive(Debug, Clone)]
pub struct CommentCollector {
    selectors: CommentSelectors,
    stall_limit: u32,
    scroll_delay: Duration,
    max_scrolls: u32,
    max_comments: usize,
    supervisor: Supervisor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentState {
    found: bool,
    comments: Vec<String>,
    end: bool,
    bottom: bool,
}

impl CommentCollector {
    pub fn new(selectors: CommentSelectors, crawl: &CrawlConfig, supervisor: Supervisor) -> Self {
        Self {
            selectors,
            stall_limit: crawl.comment_stall_limit,
            scroll_delay: crawl.comment_scroll_delay(),
            max_scrolls: crawl.comment_max_scrolls,
            max_comments: crawl.max_comments,
            supervisor,
        }
    }

    /// Collect distinct comments in the order they appear.
    ///
    /// Never fails: a step that keeps failing ends collection with what
    /// was gathered so far.
    pub async fn collect(&self, page: &dyn PageDriver) -> Vec<String> {
        let state_script = scripts::comment_state_script(
            &self.selectors.container,
            &self.selectors.comment,
            &self.selectors.end_marker,
        );
        let scroll_script = scripts::scroll_container_script(&self.selectors.container, SCROLL_FRACTION);

        let mut comments = Vec::new();
        let mut seen = HashSet::new();
        let mut stall = StallCounter::new(self.stall_limit);

        for step in 0..=self.max_scrolls {
            let state = match self
                .supervisor
                .run("read comments", || page.evaluate(&state_script))
                .await
            {
                Outcome::Done(value) => parse_state(value),
                Outcome::Skipped(e) | Outcome::Exhausted(e) => {
                    warn!("Stopping comment collection after {} comments: {}", comments.len(), e);
                    break;
                }
            };

            if !state.found {
                debug!("No comment container");
                break;
            }

            let before = comments.len();
            for text in state.comments {
                if comments.len() >= self.max_comments {
                    break;
                }
                if seen.insert(text.clone()) {
                    comments.push(text);
                }
            }
            let added = comments.len() - before;

            if added > 0 {
                stall.reset();
            } else {
                stall.miss();
            }

            if comments.len() >= self.max_comments {
                debug!("Comment cap of {} reached", self.max_comments);
                break;
            }
            if state.end {
                debug!("End of comments after {} scrolls", step);
                break;
            }
            if state.bottom && added == 0 {
                break;
            }
            if stall.is_stalled() || step == self.max_scrolls {
                break;
            }

            match self
                .supervisor
                .run("scroll comments", || page.evaluate(&scroll_script))
                .await
            {
                Outcome::Done(Value::Bool(true)) => {}
                Outcome::Done(_) => break,
                Outcome::Skipped(e) | Outcome::Exhausted(e) => {
                    warn!("Stopping comment collection after {} comments: {}", comments.len(), e);
                    break;
                }
            }

            if !self.scroll_delay.is_zero() {
                tokio::time::sleep(self.scroll_delay).await;
            }
        }

        comments
    }
}

fn parse_state(value: Value) -> CommentState {
    serde_json::from_value(value).unwrap_or_default()
}
