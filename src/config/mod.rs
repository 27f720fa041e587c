//! Configuration management.
//!
//! Configuration is read from `~/.config/socialcrawl/config.toml` at startup,
//! or from a path given on the command line. If the default file doesn't
//! exist, a default configuration with comments is created.

mod run;

pub use run::TaskRunConfig;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ocr::OcrConfig;
use crate::platform::{WeiboSelectors, XhsSelectors};
use crate::scraper::{PacingConfig, RetryConfig, ScraperConfig};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: ScraperConfig,
    pub crawl: CrawlConfig,
    pub pacing: PacingConfig,
    pub retry: RetryConfig,
    pub ocr: OcrConfig,
    pub weibo: WeiboSelectors,
    pub xhs: XhsSelectors,
}

/// Settings of the scroll-and-extract loop
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Root of the task directories (default: "data")
    pub data_dir: PathBuf,

    /// Directory holding `weibo_cookie.json` / `xiaohongshu_cookie.json` (default: ".")
    pub cookie_dir: PathBuf,

    /// Consecutive scans without new items before giving up (default: 5)
    pub stall_limit: u32,

    /// Share of the viewport height scrolled per step (default: 0.8)
    pub scroll_fraction: f64,

    /// Wait after each scroll step for lazy content in milliseconds (default: 2000)
    pub settle_delay_ms: u64,

    /// Timeout for an item's detail content to populate in seconds (default: 10)
    pub detail_timeout_secs: u64,

    /// Collect comments for each item (default: true)
    pub collect_comments: bool,

    /// Comment scrolls without new comments before stopping (default: 3)
    pub comment_stall_limit: u32,

    /// Wait after each comment scroll in milliseconds (default: 3000)
    pub comment_scroll_delay_ms: u64,

    /// Upper bound on comment scroll steps per item (default: 30)
    pub comment_max_scrolls: u32,

    /// Upper bound on comments kept per item (default: 200)
    pub max_comments: usize,

    /// Keyword searches cover this many recent days where supported (default: 3)
    pub search_days: u32,

    /// Upper bound on paginated result pages (default: 50)
    pub max_result_pages: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cookie_dir: PathBuf::from("."),
            stall_limit: 5,
            scroll_fraction: 0.8,
            settle_delay_ms: 2000,
            detail_timeout_secs: 10,
            collect_comments: true,
            comment_stall_limit: 3,
            comment_scroll_delay_ms: 3000,
            comment_max_scrolls: 30,
            max_comments: 200,
            search_days: 3,
            max_result_pages: 50,
        }
    }
}

impl CrawlConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    pub fn comment_scroll_delay(&self) -> Duration {
        Duration::from_millis(self.comment_scroll_delay_ms)
    }

    /// Scroll fraction clamped to a sensible range
    pub fn scroll_fraction(&self) -> f64 {
        if self.scroll_fraction.is_finite() {
            self.scroll_fraction.clamp(0.1, 1.0)
        } else {
            0.8
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    ///
    /// If the default config file doesn't exist, creates a default one with
    /// comments. An explicit path must exist. Missing fields use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::default_config_path()?;
                if !default_path.exists() {
                    Self::create_default_config(&default_path)?;
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get the default config file path: `~/.config/socialcrawl/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("socialcrawl").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# socialcrawl configuration
#
# Every key is optional; missing keys fall back to the values shown here.

[browser]
# Run browser in headless mode (no visible window); --visible overrides
headless = true

# Navigation timeout in seconds
timeout_secs = 30

# Wait time after navigation for dynamic content (milliseconds)
wait_after_load_ms = 3000

viewport_width = 1920
viewport_height = 1080

# executable = "/usr/bin/chromium"

[crawl]
# Task directories are created under <data_dir>/<platform>/<keyword or user>
data_dir = "data"

# Where weibo_cookie.json and xiaohongshu_cookie.json live
cookie_dir = "."

# Stop after this many scans in a row find nothing new
stall_limit = 5

# Scroll this share of the viewport per step
scroll_fraction = 0.8

# Wait after each scroll for lazy-loaded content (milliseconds)
settle_delay_ms = 2000

# How long an opened item may take to show its text (seconds)
detail_timeout_secs = 10

collect_comments = true
comment_stall_limit = 3
comment_scroll_delay_ms = 3000
comment_max_scrolls = 30
max_comments = 200

# Weibo keyword searches cover the most recent N days
search_days = 3
max_result_pages = 50

[pacing]
# Randomized delay between interactions (milliseconds)
min_delay_ms = 2000
max_delay_ms = 4000

[retry]
# Attempts per page operation; waits double after each failure
max_attempts = 3
base_delay_ms = 2000

[ocr]
# Any command printing the recognized text, or {"text": "..."}, to stdout.
# {image} is replaced by the absolute image path.
enabled = true
program = "tesseract"
args = ["{image}", "stdout", "-l", "chi_sim+eng"]
timeout_secs = 120

# Selectors for each platform can be overridden under [weibo] and [xhs].
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config = Config::parse(&content).expect("Default config should be valid TOML");

        assert!(config.browser.headless);
        assert_eq!(config.crawl.stall_limit, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.ocr.program, "tesseract");
        assert_eq!(config.pacing.max_delay_ms, 4000);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[crawl]
stall_limit = 2
data_dir = "/srv/crawl"

[xhs]
item = "div.note"
"##;
        let config = Config::parse(content).expect("Partial config should work");

        assert_eq!(config.crawl.stall_limit, 2);
        assert_eq!(config.crawl.data_dir, PathBuf::from("/srv/crawl"));
        // Default value
        assert_eq!(config.crawl.scroll_fraction, 0.8);
        assert_eq!(config.xhs.item, "div.note");
        assert_eq!(config.xhs.detail_title, XhsSelectors::default().detail_title);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").expect("Empty config should work");
        assert_eq!(config.crawl.stall_limit, 5);
        assert!(config.ocr.enabled);
    }

    #[test]
    fn test_scroll_fraction_clamped() {
        let crawl = CrawlConfig {
            scroll_fraction: 7.0,
            ..Default::default()
        };
        assert_eq!(crawl.scroll_fraction(), 1.0);
        let crawl = CrawlConfig {
            scroll_fraction: f64::NAN,
            ..Default::default()
        };
        assert_eq!(crawl.scroll_fraction(), 0.8);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry]\nmax_attempts = 5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[crawl\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
