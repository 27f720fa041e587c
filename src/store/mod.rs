//! On-disk persistence for a task directory.
//!
//! ```text
//! <data_dir>/<platform>/<slug>/
//!     history.json        ledger of persisted identifiers
//!     note_1/content.json one record per numbered folder
//!     note_1/image_1.jpg
//!     <slug>_<n>items.txt merged exports
//!     <slug>_<n>items.md
//! ```
//!
//! The directory is the source of truth: nothing here keeps counters in
//! memory across runs.

pub mod allocator;
pub mod export;
pub mod ledger;
pub mod record;

pub use allocator::FolderAllocator;
pub use export::{merge_records, MergeSummary};
pub use ledger::{Ledger, LedgerEntry};
pub use record::{is_complete_record, read_record, write_record, RECORD_FILE};

use std::fs;
use std::path::{Path, PathBuf};

use crate::app::Result;

/// Write `contents` to `path` through a sibling temporary file and a rename,
/// so readers only ever see the old or the new file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");

        write_atomic(&path, b"first version that is long").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("history.json.tmp").exists());
    }
}
