use std::fs;
use std::path::{Path, PathBuf};

use crate::app::Result;
use crate::domain::ItemRecord;
use crate::store::write_atomic;

pub const RECORD_FILE: &str = "content.json";

/// Write the record into its item folder as a single file.
pub fn write_record(item_dir: &Path, record: &ItemRecord) -> Result<PathBuf> {
    let path = item_dir.join(RECORD_FILE);
    let json = serde_json::to_vec_pretty(record)?;
    write_atomic(&path, &json)?;
    Ok(path)
}

pub fn read_record(item_dir: &Path) -> Result<ItemRecord> {
    let content = fs::read_to_string(item_dir.join(RECORD_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

/// A folder holds a complete record iff its record file parses as a JSON
/// object carrying every required top-level field.
pub fn is_complete_record(item_dir: &Path) -> bool {
    let Ok(content) = fs::read_to_string(item_dir.join(RECORD_FILE)) else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
        return false;
    };
    let Some(object) = value.as_object() else {
        return false;
    };
    ItemRecord::REQUIRED_FIELDS
        .iter()
        .all(|field| object.contains_key(*field))
}
