use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Stable key for one scraped unit of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Derive an identifier from the item's URL, falling back to a hash of its title.
    ///
    /// Returns `None` when neither is usable.
    pub fn derive(url: Option<&str>, title: &str) -> Option<Self> {
        if let Some(url) = url.and_then(Self::canonical_url) {
            return Some(Self(url));
        }

        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self::from_content(title))
    }

    /// Hash-based identifier for items without a usable URL
    pub fn from_content(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    /// Drop query and fragment; share tokens in them differ between visits.
    fn canonical_url(raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_query(None);
        url.set_fragment(None);
        let mut canonical = url.to_string();
        if canonical.ends_with('/') && url.path() != "/" {
            canonical.pop();
        }
        Some(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A rendered feed entry located by a scan of the live page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    /// Value of the `data-crawl-ref` attribute stamped on the element
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Candidate {
    /// CSS selector addressing this candidate's element
    pub fn selector(&self) -> String {
        format!("[data-crawl-ref=\"{}\"]", self.reference.replace('"', "\\\""))
    }

    pub fn identifier(&self) -> Option<Identifier> {
        Identifier::derive(self.url.as_deref(), &self.title)
    }

    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            "(untitled)"
        } else {
            title
        }
    }
}

/// Structured fields pulled from a loaded detail view.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetailFields {
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub image_urls: Vec<String>,
}

impl DetailFields {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.text.trim().is_empty()
    }

    /// Image URLs in encounter order with duplicates removed.
    pub fn unique_image_urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.image_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| u.starts_with("http"))
            .filter(|u| seen.insert(u.to_string()))
            .map(String::from)
            .collect()
    }
}

/// One downloaded image and the text recognized in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Path relative to the task directory
    pub path: String,
    pub source_url: String,
    #[serde(default)]
    pub ocr_text: String,
}

/// The persisted unit, written once as `content.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub identifier: Identifier,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    pub url: String,
    #[serde(default)]
    pub published_at: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Top-level fields a record file must carry to count as complete
    pub const REQUIRED_FIELDS: [&'static str; 4] = ["identifier", "title", "text", "url"];

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "No Title"
        } else {
            &self.title
        }
    }
}
