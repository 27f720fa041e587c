use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::domain::Identifier;
use crate::store::{is_complete_record, write_atomic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub identifier: Identifier,
    /// Item folder, relative to the task directory when possible
    pub storage_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    entries: Vec<LedgerEntry>,
}

/// Durable record of which identifiers a task has already persisted.
///
/// Every [`Ledger::add`] rewrites the whole file, so the file on disk is
/// always a complete snapshot.
#[derive(Debug)]
pub struct Ledger {
    task_dir: PathBuf,
    entries: Vec<LedgerEntry>,
    seen: HashSet<Identifier>,
    pruned: usize,
}

impl Ledger {
    pub const FILE_NAME: &'static str = "history.json";

    /// Load the ledger of `task_dir`, dropping entries whose folder no longer
    /// holds a complete record, and rewrite the file with the survivors.
    ///
    /// An unreadable or corrupt file yields an empty ledger.
    pub fn load(task_dir: &Path) -> Self {
        let path = task_dir.join(Self::FILE_NAME);
        let stored = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => file.entries,
                Err(e) => {
                    warn!("Ledger {} is corrupt, starting empty: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Failed to read ledger {}, starting empty: {}", path.display(), e);
                Vec::new()
            }
        };

        let total = stored.len();
        let mut ledger = Self {
            task_dir: task_dir.to_path_buf(),
            entries: Vec::with_capacity(total),
            seen: HashSet::with_capacity(total),
            pruned: 0,
        };

        for entry in stored {
            if ledger.seen.contains(&entry.identifier) {
                debug!("Dropping duplicate ledger entry {}", entry.identifier);
                ledger.pruned += 1;
                continue;
            }
            if !is_complete_record(&ledger.resolve(&entry.storage_path)) {
                info!(
                    "Pruning ledger entry {}: no complete record at {}",
                    entry.identifier,
                    entry.storage_path.display()
                );
                ledger.pruned += 1;
                continue;
            }
            ledger.seen.insert(entry.identifier.clone());
            ledger.entries.push(entry);
        }

        if task_dir.exists() {
            if let Err(e) = ledger.flush() {
                warn!("Failed to rewrite ledger {}: {}", path.display(), e);
            }
        }

        ledger
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.seen.contains(identifier)
    }

    pub fn identifiers(&self) -> HashSet<Identifier> {
        self.seen.clone()
    }

    /// Record a persisted item and flush the whole ledger to disk.
    ///
    /// Must only be called after the item's record file is written.
    pub fn add(&mut self, identifier: Identifier, storage_path: &Path) -> Result<()> {
        let storage_path = storage_path
            .strip_prefix(&self.task_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| storage_path.to_path_buf());

        let entry = LedgerEntry {
            identifier: identifier.clone(),
            storage_path,
            timestamp: Utc::now(),
        };

        if self.seen.insert(identifier.clone()) {
            self.entries.push(entry);
        } else if let Some(existing) = self.entries.iter_mut().find(|e| e.identifier == identifier) {
            *existing = entry;
        }

        self.flush()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries dropped while loading
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    pub fn path(&self) -> PathBuf {
        self.task_dir.join(Self::FILE_NAME)
    }

    fn resolve(&self, storage_path: &Path) -> PathBuf {
        if storage_path.is_absolute() {
            storage_path.to_path_buf()
        } else {
            self.task_dir.join(storage_path)
        }
    }

    fn flush(&self) -> Result<()> {
        let file = LedgerFile {
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path(), &json)
    }
}
