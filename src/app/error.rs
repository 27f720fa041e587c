use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Execution context was destroyed: {0}")]
    ContextDestroyed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("No content extracted: {0}")]
    EmptyContent(String),

    #[error("{0}")]
    Other(String),
}

impl CrawlError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Structural failures (an element that is confirmed absent, empty
    /// content, bad configuration) are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlError::Timeout(_) | CrawlError::ContextDestroyed(_) => true,
            // A client error answers the same way every time, except for
            // request timeouts and rate limiting
            CrawlError::Http(e) => match e.status() {
                Some(status) if status.is_client_error() => matches!(status.as_u16(), 408 | 429),
                _ => true,
            },
            CrawlError::Browser(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("navigation")
                    || msg.contains("connection")
                    || msg.contains("context was destroyed")
                    || msg.contains("detached")
            }
            _ => false,
        }
    }

    /// Classify a raw browser engine error message.
    pub fn from_browser(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.contains("Execution context was destroyed")
            || msg.contains("Cannot find context with specified id")
        {
            CrawlError::ContextDestroyed(msg)
        } else if msg.to_lowercase().contains("timeout") {
            CrawlError::Timeout(msg)
        } else {
            CrawlError::Browser(msg)
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_transient() {
        assert!(CrawlError::Timeout("#detail-title".into()).is_transient());
        assert!(CrawlError::ContextDestroyed("navigated".into()).is_transient());
    }

    #[test]
    fn test_not_found_is_structural() {
        assert!(!CrawlError::NotFound("[data-crawl-ref=\"3\"]".into()).is_transient());
        assert!(!CrawlError::EmptyContent("no title".into()).is_transient());
        assert!(!CrawlError::Config("bad".into()).is_transient());
    }

    /// Serve one canned HTTP response per connection
    async fn serve(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/image.jpg", addr)
    }

    async fn status_error(status_line: &'static str) -> CrawlError {
        let url = serve(status_line).await;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client.get(&url).send().await.unwrap();
        CrawlError::from(response.error_for_status().unwrap_err())
    }

    #[tokio::test]
    async fn test_http_client_errors_are_structural() {
        assert!(!status_error("404 Not Found").await.is_transient());
        assert!(!status_error("403 Forbidden").await.is_transient());
        assert!(status_error("429 Too Many Requests").await.is_transient());
        assert!(status_error("408 Request Timeout").await.is_transient());
        assert!(status_error("502 Bad Gateway").await.is_transient());
    }

    #[tokio::test]
    async fn test_http_timeout_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                drop(socket);
            }
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let err = client
            .get(format!("http://{}/image.jpg", addr))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(CrawlError::from(err).is_transient());
    }

    #[test]
    fn test_browser_message_classification() {
        assert!(matches!(
            CrawlError::from_browser("Execution context was destroyed, most likely because of a navigation"),
            CrawlError::ContextDestroyed(_)
        ));
        assert!(matches!(
            CrawlError::from_browser("Request timeout"),
            CrawlError::Timeout(_)
        ));
        let other = CrawlError::from_browser("Node is detached from document");
        assert!(matches!(other, CrawlError::Browser(_)));
        assert!(other.is_transient());
        assert!(!CrawlError::from_browser("Protocol error: bad params").is_transient());
    }
}
