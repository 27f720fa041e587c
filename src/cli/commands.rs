use std::path::Path;

use crate::app::{AppContext, CrawlError, Result};
use crate::crawler::{RunSummary, TaskRunner};
use crate::domain::{Platform, PlatformChoice, TaskFile};
use crate::store::{merge_records, FolderAllocator, Ledger, MergeSummary};

pub async fn run_tasks(ctx: &AppContext, input: &Path, choice: PlatformChoice) -> Result<RunSummary> {
    let file = TaskFile::load(input)?;
    if file.tasks.is_empty() {
        println!("No tasks in {}", input.display());
        return Ok(RunSummary::default());
    }

    println!("Running {} tasks from {}", file.tasks.len(), input.display());

    let mut runner = TaskRunner::new(ctx);
    let summary = runner.run_all(&file.tasks, choice).await;
    runner.shutdown().await;

    println!(
        "Done: {} completed, {} failed, {} skipped, {} new items",
        summary.completed, summary.failed, summary.invalid, summary.items
    );
    Ok(summary)
}

pub fn export_task(task_dir: &Path, name: Option<&str>, to: Option<&Path>) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => task_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CrawlError::Task(format!("cannot name {}", task_dir.display())))?,
    };

    match merge_task_dir(task_dir, &name, to)? {
        Some(summary) => {
            println!("Merged {} records", summary.count);
            println!("  {}", summary.txt_path.display());
            println!("  {}", summary.md_path.display());
            if let Some(dir) = summary.exported_to {
                println!("Copied to {}", dir.display());
            }
        }
        None => println!("No records in {}", task_dir.display()),
    }
    Ok(())
}

/// Merge with whichever folder prefix the directory actually uses.
fn merge_task_dir(task_dir: &Path, name: &str, to: Option<&Path>) -> Result<Option<MergeSummary>> {
    if !task_dir.is_dir() {
        return Err(CrawlError::Task(format!("{} is not a directory", task_dir.display())));
    }

    for platform in [Platform::Xhs, Platform::Weibo] {
        let prefix = platform.folder_prefix();
        if FolderAllocator::new(task_dir, prefix).existing_indices()?.is_empty() {
            continue;
        }
        return merge_records(task_dir, prefix, name, to);
    }
    Ok(None)
}

pub fn verify_task(task_dir: &Path) -> Result<()> {
    if !task_dir.is_dir() {
        return Err(CrawlError::Task(format!("{} is not a directory", task_dir.display())));
    }

    let ledger = Ledger::load(task_dir);
    println!("{}", ledger.path().display());
    println!("  {} entries kept", ledger.len());
    println!("  {} stale entries removed", ledger.pruned());
    Ok(())
}
