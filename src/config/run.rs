use std::path::{Path, PathBuf};

use crate::config::{Config, CrawlConfig};
use crate::domain::TaskRun;
use crate::scraper::{Pacing, PacingConfig, RetryConfig, Supervisor};

/// Everything one task run needs, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct TaskRunConfig {
    pub task: TaskRun,
    pub task_dir: PathBuf,
    pub cookie_path: PathBuf,
    pub crawl: CrawlConfig,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
    /// OCR is allowed globally and the task didn't opt out
    pub ocr_enabled: bool,
}

impl TaskRunConfig {
    pub fn new(task: TaskRun, config: &Config) -> Self {
        let task_dir = task.storage_dir(&config.crawl.data_dir);
        let cookie_path = config
            .crawl
            .cookie_dir
            .join(task.platform.cookie_file_name());
        let ocr_enabled = config.ocr.enabled && task.image_processing;

        Self {
            task,
            task_dir,
            cookie_path,
            crawl: config.crawl.clone(),
            retry: config.retry.clone(),
            pacing: config.pacing.clone(),
            ocr_enabled,
        }
    }

    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(&self.retry)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(&self.pacing)
    }

    pub fn folder_prefix(&self) -> &'static str {
        self.task.platform.folder_prefix()
    }
}
