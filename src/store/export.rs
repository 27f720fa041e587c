use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::app::Result;
use crate::domain::ItemRecord;
use crate::store::{read_record, FolderAllocator};

/// Files produced by a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub count: usize,
    pub txt_path: PathBuf,
    pub md_path: PathBuf,
    pub exported_to: Option<PathBuf>,
}

/// Merge every record of a task directory into `<name>_<n>items.txt` and
/// `.md`, in folder index order, optionally copying both to `export_dir`.
///
/// Returns `None` when the directory has no readable records.
pub fn merge_records(
    task_dir: &Path,
    prefix: &str,
    name: &str,
    export_dir: Option<&Path>,
) -> Result<Option<MergeSummary>> {
    let allocator = FolderAllocator::new(task_dir, prefix);
    let mut records = Vec::new();
    for index in allocator.existing_indices()? {
        let folder = allocator.folder_path(index);
        match read_record(&folder) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping {} in merge: {}", folder.display(), e),
        }
    }

    if records.is_empty() {
        info!("No records found to merge in {}", task_dir.display());
        return Ok(None);
    }

    let base = format!("{}_{}items", name, records.len());
    let txt_path = task_dir.join(format!("{}.txt", base));
    let md_path = task_dir.join(format!("{}.md", base));
    fs::write(&txt_path, render_text(&records))?;
    fs::write(&md_path, render_markdown(&records))?;

    let exported_to = match export_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            fs::copy(&txt_path, dir.join(format!("{}.txt", base)))?;
            fs::copy(&md_path, dir.join(format!("{}.md", base)))?;
            Some(dir.to_path_buf())
        }
        None => None,
    };

    info!(
        "Merged {} records to {} and {}",
        records.len(),
        txt_path.display(),
        md_path.display()
    );

    Ok(Some(MergeSummary {
        count: records.len(),
        txt_path,
        md_path,
        exported_to,
    }))
}

pub fn render_text(records: &[ItemRecord]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Title: {}", record.display_title());
        let _ = writeln!(out, "Content: {}", or_placeholder(&record.text, "No Content"));
        if let Some(published) = &record.published_at {
            let _ = writeln!(out, "Published: {}", published);
        }
        if !record.comments.is_empty() {
            out.push_str("Comments:\n");
            for comment in &record.comments {
                let _ = writeln!(out, "- {}", comment);
            }
        }
        if record.images.iter().any(|img| !img.ocr_text.is_empty()) {
            out.push_str("OCR Text:\n");
            for (n, image) in record.images.iter().enumerate() {
                if !image.ocr_text.is_empty() {
                    let _ = writeln!(out, "- Image{}: {}", n + 1, image.ocr_text);
                }
            }
        }
        let _ = writeln!(out, "URL: {}", or_placeholder(&record.url, "No URL"));
        out.push_str("---\n");
    }
    out
}

pub fn render_markdown(records: &[ItemRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let _ = writeln!(out, "# {}\n", record.display_title());
        let _ = writeln!(out, "{}\n", or_placeholder(&record.text, "No Content"));
        if !record.comments.is_empty() {
            out.push_str("## Comments\n\n");
            for comment in &record.comments {
                let _ = writeln!(out, "* {}", comment);
            }
            out.push('\n');
        }
        if record.images.iter().any(|img| !img.ocr_text.is_empty()) {
            out.push_str("## OCR Text\n\n");
            for (n, image) in record.images.iter().enumerate() {
                if !image.ocr_text.is_empty() {
                    let _ = writeln!(out, "* Image{}: {}", n + 1, image.ocr_text);
                }
            }
            out.push('\n');
        }
        let link = if record.url.is_empty() { "#" } else { &record.url };
        let _ = writeln!(out, "[Original Link]({})\n\n---\n", link);
    }
    out
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}
