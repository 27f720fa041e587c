use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::app::Result;

/// Hands out numbered item folders (`<prefix>_<n>`) inside a task directory.
#[derive(Debug, Clone)]
pub struct FolderAllocator {
    task_dir: PathBuf,
    prefix: String,
}

impl FolderAllocator {
    pub fn new(task_dir: &Path, prefix: &str) -> Self {
        Self {
            task_dir: task_dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    pub fn folder_path(&self, index: u32) -> PathBuf {
        self.task_dir.join(format!("{}_{}", self.prefix, index))
    }

    /// Parse `<prefix>_<n>` into `n`.
    pub fn parse_index(&self, name: &str) -> Option<u32> {
        name.strip_prefix(&self.prefix)?
            .strip_prefix('_')?
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
    }

    /// Indices of the numbered folders currently on disk.
    pub fn existing_indices(&self) -> Result<BTreeSet<u32>> {
        let mut indices = BTreeSet::new();
        let entries = match fs::read_dir(&self.task_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(indices),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(index) = entry.file_name().to_str().and_then(|n| self.parse_index(n)) {
                indices.insert(index);
            }
        }

        Ok(indices)
    }

    /// Smallest positive index with no folder on disk.
    ///
    /// Fills gaps left by deleted folders, otherwise returns `max + 1`.
    pub fn next_index(&self) -> Result<u32> {
        let taken = self.existing_indices()?;
        let mut index = 1;
        while taken.contains(&index) || self.folder_path(index).exists() {
            index += 1;
        }
        Ok(index)
    }

    /// Claim the next index by creating its folder.
    pub fn allocate(&self) -> Result<(u32, PathBuf)> {
        fs::create_dir_all(&self.task_dir)?;
        loop {
            let index = self.next_index()?;
            let path = self.folder_path(index);
            match fs::create_dir(&path) {
                Ok(()) => return Ok((index, path)),
                // Lost a race with something else creating it; look again
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
