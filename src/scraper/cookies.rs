use std::path::Path;

use serde::Deserialize;

use crate::app::Result;

/// A cookie in the shape browsers export it (`page.cookies()` JSON dumps).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Seconds since the epoch; `-1` for session cookies
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub same_site: Option<String>,
}

impl BrowserCookie {
    /// Expiry to forward to the browser; session cookies have none
    pub fn persistent_expiry(&self) -> Option<f64> {
        self.expires.filter(|e| *e > 0.0)
    }
}

/// Read a JSON array of cookies from disk.
pub fn load_cookies(path: &Path) -> Result<Vec<BrowserCookie>> {
    let content = std::fs::read_to_string(path)?;
    let cookies: Vec<BrowserCookie> = serde_json::from_str(&content)?;
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_exported_cookies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("xiaohongshu_cookie.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "web_session", "value": "abc", "domain": ".xiaohongshu.com",
                 "path": "/", "expires": 1893456000.5, "size": 14, "httpOnly": true,
                 "secure": true, "session": false, "sameSite": "Lax"},
                {"name": "a1", "value": "z", "domain": ".xiaohongshu.com", "expires": -1}
            ]"#,
        )
        .unwrap();

        let cookies = load_cookies(&path).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "web_session");
        assert_eq!(cookies[0].http_only, Some(true));
        assert_eq!(cookies[0].same_site.as_deref(), Some("Lax"));
        assert_eq!(cookies[0].persistent_expiry(), Some(1893456000.5));
        assert_eq!(cookies[1].persistent_expiry(), None);
    }

    #[test]
    fn test_malformed_cookie_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weibo_cookie.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(load_cookies(&path).is_err());
    }
}
