//! Task execution.
//!
//! A task run owns one ledger, one folder sequence and one scroll session:
//!
//! ```text
//! cookies → home page → login check → feed → ScrollLoop ⇄ ItemPipeline → merge/export
//! ```
//!
//! Only failing to reach the platform at all ends a task early; everything
//! after that degrades per item.

mod pipeline;
mod runner;
mod scroll_loop;
#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{ItemPipeline, Persisted};
pub use runner::{RunSummary, TaskRunner};
pub use scroll_loop::{LoopReport, LoopState, ScrollLoop, SessionState, StopReason};

use std::fs;

use tracing::{info, warn};

use crate::app::Result;
use crate::config::TaskRunConfig;
use crate::fetcher::ImageFetcher;
use crate::ocr::OcrService;
use crate::platform::PlatformKit;
use crate::scraper::{load_cookies, PageDriver};
use crate::store::{merge_records, Ledger, MergeSummary};

/// What one task run produced
#[derive(Debug)]
pub struct TaskOutcome {
    pub report: LoopReport,
    pub merge: Option<MergeSummary>,
}

/// Run one task on an open page.
///
/// Fails only when the platform or the task directory can't be reached;
/// item-level problems are logged and skipped.
pub async fn run_task(
    page: &dyn PageDriver,
    kit: &PlatformKit,
    run: &TaskRunConfig,
    fetcher: &dyn ImageFetcher,
    ocr: Option<&dyn OcrService>,
) -> Result<TaskOutcome> {
    let task = &run.task;
    fs::create_dir_all(run.task_dir())?;

    let mut ledger = Ledger::load(run.task_dir());
    info!(
        "Starting {} {} on {}: {} items wanted, {} already saved",
        task.platform,
        task.query,
        run.task_dir().display(),
        task.max_items,
        ledger.len()
    );
    if ledger.pruned() > 0 {
        info!("Dropped {} stale ledger entries", ledger.pruned());
    }

    install_cookies(page, run).await;

    let supervisor = run.supervisor();
    supervisor
        .run("open home page", || kit.navigator.open_home(page, task))
        .await
        .into_result()?;

    match kit.navigator.is_logged_in(page).await {
        Ok(true) => info!("Logged in to {}", task.platform),
        Ok(false) => warn!(
            "Not logged in to {}; results may be limited. Check {}",
            task.platform,
            run.cookie_path.display()
        ),
        Err(e) => warn!("Could not check login state: {}", e),
    }

    supervisor
        .run("open feed", || kit.navigator.open_feed(page, task))
        .await
        .into_result()?;

    let pipeline = ItemPipeline::new(run, kit.extractor.as_ref(), fetcher, ocr);
    let report = ScrollLoop::new(run, kit, pipeline)
        .run(page, &mut ledger)
        .await;

    let name = task.query.slug();
    let merge = match merge_records(
        run.task_dir(),
        run.folder_prefix(),
        &name,
        task.export.as_deref(),
    ) {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Failed to merge records of {}: {}", run.task_dir().display(), e);
            None
        }
    };

    Ok(TaskOutcome { report, merge })
}

async fn install_cookies(page: &dyn PageDriver, run: &TaskRunConfig) {
    let cookies = match load_cookies(&run.cookie_path) {
        Ok(cookies) => cookies,
        Err(e) => {
            warn!(
                "No cookies loaded from {}: {}",
                run.cookie_path.display(),
                e
            );
            return;
        }
    };

    if cookies.is_empty() {
        warn!("Cookie file {} is empty", run.cookie_path.display());
        return;
    }

    match page.set_cookies(&cookies).await {
        Ok(()) => info!("Loaded {} cookies", cookies.len()),
        Err(e) => warn!("Failed to install cookies: {}", e),
    }
}
