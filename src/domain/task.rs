use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::{CrawlError, Result};

pub const DEFAULT_MAX_ITEMS: usize = 10;

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Weibo,
    #[serde(alias = "xiaohongshu")]
    Xhs,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Weibo => "weibo",
            Platform::Xhs => "xhs",
        }
    }

    /// Prefix of the numbered item folders inside a task directory
    pub fn folder_prefix(&self) -> &'static str {
        match self {
            Platform::Weibo => "post",
            Platform::Xhs => "note",
        }
    }

    pub fn cookie_file_name(&self) -> &'static str {
        match self {
            Platform::Weibo => "weibo_cookie.json",
            Platform::Xhs => "xiaohongshu_cookie.json",
        }
    }

    pub fn home_url(&self) -> &'static str {
        match self {
            Platform::Weibo => "https://weibo.com",
            Platform::Xhs => "https://www.xiaohongshu.com",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform selection from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PlatformChoice {
    #[default]
    Auto,
    Weibo,
    Xhs,
}

impl PlatformChoice {
    fn forced(&self) -> Option<Platform> {
        match self {
            PlatformChoice::Auto => None,
            PlatformChoice::Weibo => Some(Platform::Weibo),
            PlatformChoice::Xhs => Some(Platform::Xhs),
        }
    }
}

/// What a task crawls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Keyword(String),
    User(String),
}

impl Query {
    /// Directory-safe name for this query
    pub fn slug(&self) -> String {
        match self {
            Query::Keyword(keyword) => sanitize(keyword),
            Query::User(id) => format!("user_{}", sanitize(id)),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Keyword(keyword) => write!(f, "keyword '{}'", keyword),
            Query::User(id) => write!(f, "user {}", id),
        }
    }
}

/// `export` may be `true` (default directory) or a directory path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExportTarget {
    Enabled(bool),
    Dir(PathBuf),
}

impl ExportTarget {
    pub const DEFAULT_DIR: &'static str = "export";

    pub fn resolve(&self) -> Option<PathBuf> {
        match self {
            ExportTarget::Enabled(true) => Some(PathBuf::from(Self::DEFAULT_DIR)),
            ExportTarget::Enabled(false) => None,
            ExportTarget::Dir(dir) if dir.as_os_str().is_empty() => None,
            ExportTarget::Dir(dir) => Some(dir.clone()),
        }
    }
}

/// Contents of a task file: `{"tasks": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

impl TaskFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file = serde_json::from_str(&content)?;
        Ok(file)
    }
}

/// One task as written in the task file, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub keyword: Option<String>,
    pub user_id: Option<String>,
    pub user_url: Option<String>,
    pub platform: Option<Platform>,
    pub max_items: Option<usize>,
    #[serde(default)]
    pub noimage: bool,
    pub export: Option<ExportTarget>,
}

impl TaskEntry {
    /// Validate this entry into an immutable [`TaskRun`].
    pub fn resolve(&self, choice: PlatformChoice) -> Result<TaskRun> {
        let (typed_platform, is_user) = match self.kind.as_str() {
            "wb_keyword" => (Some(Platform::Weibo), false),
            "wb_user" => (Some(Platform::Weibo), true),
            "xhs_keyword" => (Some(Platform::Xhs), false),
            "keyword" => (None, false),
            "user" => (None, true),
            other => {
                return Err(CrawlError::Task(format!("unknown task type '{}'", other)));
            }
        };

        let platform = typed_platform
            .or(self.platform)
            .or_else(|| choice.forced())
            .ok_or_else(|| {
                CrawlError::Task(format!(
                    "task type '{}' needs a platform (task field or --platform)",
                    self.kind
                ))
            })?;

        if let (Some(typed), Some(forced)) = (typed_platform, choice.forced()) {
            if typed != forced {
                return Err(CrawlError::Task(format!(
                    "task type '{}' does not run on {}",
                    self.kind, forced
                )));
            }
        }

        let query = if is_user {
            let id = self
                .user_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .or_else(|| self.user_url.as_deref().and_then(user_id_from_url))
                .ok_or_else(|| CrawlError::Task("user task without user_id or user_url".into()))?;
            if platform == Platform::Xhs {
                return Err(CrawlError::Task("user tasks are only supported on weibo".into()));
            }
            Query::User(id)
        } else {
            let keyword = self
                .keyword
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| CrawlError::Task("keyword task without keyword".into()))?;
            Query::Keyword(keyword.to_string())
        };

        let max_items = self.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        if max_items == 0 {
            return Err(CrawlError::Task("max_items must be positive".into()));
        }

        Ok(TaskRun {
            platform,
            query,
            max_items,
            image_processing: !self.noimage,
            export: self.export.as_ref().and_then(ExportTarget::resolve),
        })
    }
}

/// A validated task. Immutable once running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRun {
    pub platform: Platform,
    pub query: Query,
    pub max_items: usize,
    /// Run OCR on downloaded images
    pub image_processing: bool,
    pub export: Option<PathBuf>,
}

impl TaskRun {
    /// Storage directory of this task under the data root
    pub fn storage_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.platform.as_str()).join(self.query.slug())
    }
}

/// Extract the numeric user id from a profile URL such as
/// `https://weibo.com/u/1234567` or `https://weibo.com/1234567`.
pub fn user_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;
    let candidate = if first == "u" { segments.next()? } else { first };
    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: &str) -> TaskEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_resolve_xhs_keyword() {
        let task = entry(r#"{"type": "xhs_keyword", "keyword": "咖啡", "max_items": 5}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap();
        assert_eq!(task.platform, Platform::Xhs);
        assert_eq!(task.query, Query::Keyword("咖啡".into()));
        assert_eq!(task.max_items, 5);
        assert!(task.image_processing);
        assert_eq!(task.export, None);
    }

    #[test]
    fn test_resolve_weibo_user_from_url() {
        let task = entry(r#"{"type": "wb_user", "user_url": "https://weibo.com/u/5678", "noimage": true}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap();
        assert_eq!(task.query, Query::User("5678".into()));
        assert_eq!(task.max_items, DEFAULT_MAX_ITEMS);
        assert!(!task.image_processing);
    }

    #[test]
    fn test_generic_keyword_needs_platform() {
        let raw = entry(r#"{"type": "keyword", "keyword": "foo", "max_items": 2}"#);
        assert!(raw.resolve(PlatformChoice::Auto).is_err());
        let task = raw.resolve(PlatformChoice::Weibo).unwrap();
        assert_eq!(task.platform, Platform::Weibo);

        let with_field = entry(r#"{"type": "keyword", "platform": "xiaohongshu", "keyword": "foo"}"#);
        assert_eq!(with_field.resolve(PlatformChoice::Auto).unwrap().platform, Platform::Xhs);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = entry(r#"{"type": "tiktok_keyword", "keyword": "x"}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap_err();
        assert!(err.to_string().contains("unknown task type"));
    }

    #[test]
    fn test_conflicting_platform_rejected() {
        let raw = entry(r#"{"type": "xhs_keyword", "keyword": "x"}"#);
        assert!(raw.resolve(PlatformChoice::Weibo).is_err());
    }

    #[test]
    fn test_export_target_forms() {
        let on = entry(r#"{"type": "xhs_keyword", "keyword": "x", "export": true}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap();
        assert_eq!(on.export, Some(PathBuf::from("export")));

        let dir = entry(r#"{"type": "xhs_keyword", "keyword": "x", "export": "/tmp/out"}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap();
        assert_eq!(dir.export, Some(PathBuf::from("/tmp/out")));

        let off = entry(r#"{"type": "xhs_keyword", "keyword": "x", "export": false}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap();
        assert_eq!(off.export, None);
    }

    #[test]
    fn test_storage_dir_is_stable() {
        let task = entry(r#"{"type": "wb_keyword", "keyword": "rust lang/2"}"#)
            .resolve(PlatformChoice::Auto)
            .unwrap();
        assert_eq!(
            task.storage_dir(Path::new("data")),
            PathBuf::from("data/weibo/rust_lang_2")
        );
    }

    #[test]
    fn test_user_id_from_url() {
        assert_eq!(user_id_from_url("https://weibo.com/u/123"), Some("123".into()));
        assert_eq!(user_id_from_url("https://weibo.com/456?tab=home"), Some("456".into()));
        assert_eq!(user_id_from_url("https://weibo.com/u/abc"), None);
        assert_eq!(user_id_from_url("not a url"), None);
    }

    #[test]
    fn test_task_file_parses() {
        let file: TaskFile = serde_json::from_str(
            r#"{"tasks": [{"type": "xhs_keyword", "keyword": "a"}, {"type": "wb_user", "user_id": "1"}]}"#,
        )
        .unwrap();
        assert_eq!(file.tasks.len(), 2);
    }
}
