pub mod http_fetcher;

pub use http_fetcher::HttpFetcher;

use async_trait::async_trait;

use crate::app::Result;

/// A downloaded image body
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedImage {
    /// File extension for this image: from the URL path when it names a
    /// known image type, else from the content type, else `jpg`.
    pub fn extension(&self, url: &str) -> &'static str {
        extension_from_url(url)
            .or_else(|| self.content_type.as_deref().and_then(extension_from_mime))
            .unwrap_or("jpg")
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let path = url::Url::parse(url).ok()?.path().to_lowercase();
    let ext = path.rsplit_once('.')?.1.to_string();
    normalize_extension(&ext)
}

fn extension_from_mime(mime: &str) -> Option<&'static str> {
    let subtype = mime.split(';').next()?.trim().strip_prefix("image/")?;
    normalize_extension(&subtype.to_lowercase())
}

fn normalize_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" | "pjpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "bmp" => Some("bmp"),
        "avif" => Some("avif"),
        "heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(content_type: Option<&str>) -> FetchedImage {
        FetchedImage {
            body: Vec::new(),
            content_type: content_type.map(String::from),
        }
    }

    #[test]
    fn test_extension_from_url_path() {
        let img = image(Some("image/png"));
        assert_eq!(img.extension("https://wx1.sinaimg.cn/large/abc.JPG?x=1"), "jpg");
        assert_eq!(img.extension("https://cdn/x/photo.webp"), "webp");
    }

    #[test]
    fn test_extension_from_content_type() {
        let img = image(Some("image/webp; charset=binary"));
        assert_eq!(img.extension("https://sns-webpic.xhscdn.com/1040g2sg!nd_dft_wlteh_webp_3"), "webp");
    }

    #[test]
    fn test_extension_default() {
        assert_eq!(image(None).extension("https://cdn/blob"), "jpg");
        assert_eq!(image(Some("text/html")).extension("not a url"), "jpg");
    }
}
