pub mod item;
pub mod task;

pub use item::{Candidate, DetailFields, Identifier, ImageEntry, ItemRecord};
pub use task::{
    ExportTarget, Platform, PlatformChoice, Query, TaskEntry, TaskFile, TaskRun, DEFAULT_MAX_ITEMS,
};
