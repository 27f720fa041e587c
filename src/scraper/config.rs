use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Navigation timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Wait time after navigation for dynamic content in milliseconds (default: 3000)
    pub wait_after_load_ms: u64,

    /// Browser viewport width in pixels (default: 1920)
    pub viewport_width: u32,

    /// Browser viewport height in pixels (default: 1080)
    pub viewport_height: u32,

    /// Path to a Chrome/Chromium executable; auto-detected when unset
    pub executable: Option<String>,

    /// User agent string to use
    pub user_agent: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_secs: 30,
            wait_after_load_ms: 3000,
            viewport_width: 1920,
            viewport_height: 1080,
            executable: None,
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
        }
    }
}

impl ScraperConfig {
    /// Get the navigation timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the wait time after load as a Duration
    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }

    /// Same settings with a visible browser window
    pub fn visible(self) -> Self {
        Self {
            headless: false,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.wait_after_load_ms, 3000);
        assert_eq!(config.viewport_width, 1920);
        assert!(config.executable.is_none());
        assert!(config.user_agent.is_some());
    }

    #[test]
    fn test_visible_keeps_other_settings() {
        let config = ScraperConfig {
            timeout_secs: 5,
            ..Default::default()
        }
        .visible();
        assert!(!config.headless);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_durations() {
        let config = ScraperConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.wait_after_load(), Duration::from_millis(3000));
    }
}
