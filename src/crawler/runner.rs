use tracing::{error, info, warn};

use crate::app::{AppContext, CrawlError, Result};
use crate::config::TaskRunConfig;
use crate::crawler::{run_task, TaskOutcome};
use crate::domain::{PlatformChoice, TaskEntry, TaskRun};
use crate::platform::PlatformKit;
use crate::scraper::{ChromeSession, Pacing};

/// Totals over a batch of tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Entries rejected before running
    pub invalid: usize,
    pub items: usize,
}

/// Runs tasks one after another on a shared browser.
pub struct TaskRunner<'a> {
    ctx: &'a AppContext,
    session: Option<ChromeSession>,
    pacing: Pacing,
}

impl<'a> TaskRunner<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self {
            ctx,
            session: None,
            pacing: Pacing::new(&ctx.config.pacing),
        }
    }

    /// Run every entry in order. Invalid entries and failed tasks are logged
    /// and the batch moves on.
    pub async fn run_all(&mut self, entries: &[TaskEntry], choice: PlatformChoice) -> RunSummary {
        let mut summary = RunSummary::default();

        for (i, entry) in entries.iter().enumerate() {
            let task = match entry.resolve(choice) {
                Ok(task) => task,
                Err(e) => {
                    warn!("Skipping task {} ({}): {}", i + 1, entry.kind, e);
                    summary.invalid += 1;
                    continue;
                }
            };

            info!(
                "Task {}/{}: {} {}",
                i + 1,
                entries.len(),
                task.platform,
                task.query
            );

            match self.run_one(task).await {
                Ok(outcome) => {
                    summary.completed += 1;
                    summary.items += outcome.report.extracted;
                    if let Some(merge) = outcome.merge {
                        info!("Merged output: {}", merge.txt_path.display());
                    }
                }
                Err(e) => {
                    error!("Task {} failed: {}", i + 1, e);
                    summary.failed += 1;
                    self.pacing.pause_scaled(2).await;
                }
            }
        }

        summary
    }

    async fn run_one(&mut self, task: TaskRun) -> Result<TaskOutcome> {
        let ctx = self.ctx;
        let run = TaskRunConfig::new(task, &ctx.config);
        let kit = PlatformKit::for_task(&run, &ctx.config);
        let fetcher = ctx.fetcher_for(run.task.platform)?;

        let page = self.session().await?.new_page().await?;
        let result = run_task(&page, &kit, &run, &fetcher, ctx.ocr.as_deref()).await;
        page.close().await;
        result
    }

    /// The browser is launched on first use and shared by later tasks.
    async fn session(&mut self) -> Result<&ChromeSession> {
        if self.session.is_none() {
            info!("Launching browser");
            self.session = Some(ChromeSession::launch(&self.ctx.config.browser).await?);
        }
        self.session
            .as_ref()
            .ok_or_else(|| CrawlError::Browser("browser is not running".into()))
    }

    pub async fn shutdown(self) {
        if let Some(session) = self.session {
            session.close().await;
        }
    }
}
