use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::Client;

use crate::app::{CrawlError, Result};
use crate::fetcher::{FetchedImage, ImageFetcher};

pub struct HttpFetcher {
    client: Client,
    referer: Option<HeaderValue>,
}

impl HttpFetcher {
    pub fn new(user_agent: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent.unwrap_or(concat!("socialcrawl/", env!("CARGO_PKG_VERSION"))))
            .build()
            .map_err(|e| CrawlError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            referer: None,
        })
    }

    /// Send a `Referer` with every request; image CDNs reject hotlinks without one
    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = HeaderValue::from_str(referer).ok();
        self
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let mut request = self.client.get(url);
        if let Some(ref referer) = self.referer {
            request = request.header(REFERER, referer.clone());
        }

        let response = request.send().await?;
        response.error_for_status_ref()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.bytes().await?.to_vec();
        if body.is_empty() {
            return Err(CrawlError::Other(format!("Empty image body from {}", url)));
        }

        Ok(FetchedImage { body, content_type })
    }
}
