use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::domain::Platform;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::ocr::{CommandOcr, OcrService};

pub struct AppContext {
    pub config: Config,
    pub ocr: Option<Arc<dyn OcrService>>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let ocr: Option<Arc<dyn OcrService>> = if config.ocr.enabled {
            Some(Arc::new(CommandOcr::new(&config.ocr)))
        } else {
            None
        };

        Self { config, ocr }
    }

    /// Image client for a platform; its CDN expects the site as referer.
    pub fn fetcher_for(&self, platform: Platform) -> Result<HttpFetcher> {
        let fetcher = HttpFetcher::new(self.config.browser.user_agent.as_deref())?;
        Ok(fetcher.with_referer(&format!("{}/", platform.home_url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_follows_config() {
        let ctx = AppContext::new(Config::default());
        assert!(ctx.ocr.is_some());

        let mut config = Config::default();
        config.ocr.enabled = false;
        assert!(AppContext::new(config).ocr.is_none());
    }

    #[test]
    fn test_fetcher_builds_for_each_platform() {
        let ctx = AppContext::new(Config::default());
        assert!(ctx.fetcher_for(Platform::Weibo).is_ok());
        assert!(ctx.fetcher_for(Platform::Xhs).is_ok());
    }
}
