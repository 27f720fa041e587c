use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::app::{CrawlError, Result};
use crate::config::TaskRunConfig;
use crate::domain::{Candidate, DetailFields, Identifier, ImageEntry, ItemRecord};
use crate::fetcher::ImageFetcher;
use crate::ocr::OcrService;
use crate::platform::ContentExtractor;
use crate::scraper::{Pacing, PageDriver, Supervisor};
use crate::store::{write_record, FolderAllocator};

/// A record written to its item folder
#[derive(Debug, Clone)]
pub struct Persisted {
    pub index: u32,
    pub folder: PathBuf,
    pub record: ItemRecord,
}

/// Turns one on-screen candidate into a persisted record.
pub struct ItemPipeline<'a> {
    extractor: &'a dyn ContentExtractor,
    fetcher: &'a dyn ImageFetcher,
    ocr: Option<&'a dyn OcrService>,
    supervisor: Supervisor,
    pacing: Pacing,
    allocator: FolderAllocator,
}

impl<'a> ItemPipeline<'a> {
    /// `ocr` is dropped when the task has image processing turned off.
    pub fn new(
        run: &TaskRunConfig,
        extractor: &'a dyn ContentExtractor,
        fetcher: &'a dyn ImageFetcher,
        ocr: Option<&'a dyn OcrService>,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            ocr: ocr.filter(|_| run.ocr_enabled),
            supervisor: run.supervisor(),
            pacing: run.pacing(),
            allocator: FolderAllocator::new(run.task_dir(), run.folder_prefix()),
        }
    }

    /// Open, read and persist one item, always leaving the detail view
    /// before returning.
    pub async fn process(
        &self,
        page: &dyn PageDriver,
        candidate: &Candidate,
        identifier: &Identifier,
    ) -> Result<Persisted> {
        let gathered = self.gather(page, candidate).await;

        if let Err(e) = self.extractor.close_item(page, candidate).await {
            warn!("Failed to close '{}': {}", candidate.display_title(), e);
        }

        let (fields, comments) = gathered?;
        self.persist(candidate, identifier, fields, comments).await
    }

    async fn gather(
        &self,
        page: &dyn PageDriver,
        candidate: &Candidate,
    ) -> Result<(DetailFields, Vec<String>)> {
        let selector = candidate.selector();

        let visible = self
            .supervisor
            .run("check visibility", || page.is_in_viewport(&selector))
            .await
            .into_result()?;
        if !visible {
            debug!("Scrolling '{}' into view", candidate.display_title());
            self.supervisor
                .run("scroll into view", || page.scroll_into_view(&selector))
                .await
                .into_result()?;
            self.pacing.pause().await;
        }

        self.supervisor
            .run("open item", || self.extractor.open_item(page, candidate))
            .await
            .into_result()?;
        self.pacing.pause().await;

        let fields = self
            .supervisor
            .run("extract item", || self.extractor.extract(page, candidate))
            .await
            .into_result()?;
        if fields.is_empty() {
            return Err(CrawlError::EmptyContent(candidate.display_title().to_string()));
        }

        let comments = match self.extractor.comments(page, candidate).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!("No comments for '{}': {}", candidate.display_title(), e);
                Vec::new()
            }
        };

        Ok((fields, comments))
    }

    async fn persist(
        &self,
        candidate: &Candidate,
        identifier: &Identifier,
        fields: DetailFields,
        comments: Vec<String>,
    ) -> Result<Persisted> {
        let (index, folder) = self.allocator.allocate()?;

        match self
            .write_item(&folder, candidate, identifier, fields, comments)
            .await
        {
            Ok(record) => Ok(Persisted {
                index,
                folder,
                record,
            }),
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&folder) {
                    warn!("Failed to remove {}: {}", folder.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    async fn write_item(
        &self,
        folder: &Path,
        candidate: &Candidate,
        identifier: &Identifier,
        fields: DetailFields,
        comments: Vec<String>,
    ) -> Result<ItemRecord> {
        let images = self.download_images(folder, &fields).await;

        let url = fields
            .url
            .clone()
            .or_else(|| candidate.url.clone())
            .unwrap_or_default();
        let title = if fields.title.trim().is_empty() {
            candidate.title.trim().to_string()
        } else {
            fields.title
        };

        let record = ItemRecord {
            identifier: identifier.clone(),
            title,
            text: fields.text,
            comments,
            images,
            url,
            published_at: fields.published_at,
            captured_at: Utc::now(),
        };
        write_record(folder, &record)?;
        Ok(record)
    }

    /// Download each distinct image as `image_<n>.<ext>`; failures skip
    /// that image only.
    async fn download_images(&self, folder: &Path, fields: &DetailFields) -> Vec<ImageEntry> {
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut images = Vec::new();
        for (i, url) in fields.unique_image_urls().into_iter().enumerate() {
            let n = i + 1;
            let image = match self
                .supervisor
                .run("download image", || self.fetcher.fetch(&url))
                .await
                .into_result()
            {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping image {} ({}): {}", n, url, e);
                    continue;
                }
            };

            let file_name = format!("image_{}.{}", n, image.extension(&url));
            let path = folder.join(&file_name);
            if let Err(e) = tokio::fs::write(&path, &image.body).await {
                warn!("Failed to save image {}: {}", path.display(), e);
                continue;
            }

            let ocr_text = match self.ocr {
                Some(ocr) => match ocr.extract_text(&path).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("OCR failed for {}: {}", path.display(), e);
                        String::new()
                    }
                },
                None => String::new(),
            };

            images.push(ImageEntry {
                path: format!("{}/{}", folder_name, file_name),
                source_url: url,
                ocr_text,
            });
        }

        if !images.is_empty() {
            info!("Saved {} images to {}", images.len(), folder.display());
        }
        images
    }
}
