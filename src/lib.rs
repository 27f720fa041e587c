//! # Socialcrawl
//!
//! A browser-driven crawler for Weibo and Xiaohongshu.
//!
//! ## Architecture
//!
//! Each task runs one convergence loop over a live page:
//!
//! ```text
//! TaskFile → TaskRun → Navigator → ScrollLoop ⇄ ItemPipeline → Store → Export
//!                                      ↑               ↓
//!                                  Supervisor     Fetcher → OCR
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Run every task in tasks.json
//! socialcrawl --input tasks.json
//!
//! # Watch the browser while it works
//! socialcrawl --input tasks.json --visible --platform xhs
//!
//! # Re-merge a task directory
//! socialcrawl export data/xhs/coffee --to ./export
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Configuration file and per-task settings
//! - [`crawler`]: Scroll loop, item pipeline and task runner
//! - [`domain`]: Items, identifiers and tasks
//! - [`fetcher`]: Image downloads
//! - [`ocr`]: OCR subprocess
//! - [`platform`]: Weibo and Xiaohongshu page logic
//! - [`scraper`]: Browser driver, retries and pacing
//! - [`store`]: Ledger, item folders and merged exports

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct holds the loaded config and the
/// shared OCR service.
pub mod app;

/// Command-line interface using clap.
///
/// - default: run the tasks of `--input`
/// - `export <task_dir>` - merge an existing task directory
/// - `verify <task_dir>` - prune a task's ledger
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/socialcrawl/config.toml`; see
/// [`TaskRunConfig`](config::TaskRunConfig) for the per-task view.
pub mod config;

/// Task execution.
pub mod crawler;

/// Core domain models.
///
/// - [`Identifier`](domain::Identifier): canonical URL or content hash
/// - [`ItemRecord`](domain::ItemRecord): the persisted `content.json`
/// - [`TaskEntry`](domain::TaskEntry) / [`TaskRun`](domain::TaskRun): tasks before and after validation
pub mod domain;

/// Image downloading.
///
/// - [`ImageFetcher`](fetcher::ImageFetcher): async trait for downloads
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Text recognition through an external program.
pub mod ocr;

/// Platform-specific navigation and extraction.
pub mod platform;

/// Headless Chrome plumbing.
///
/// - [`PageDriver`](scraper::PageDriver): the page operations the crawler needs
/// - [`ChromeSession`](scraper::ChromeSession): chromiumoxide-backed browser
/// - [`Supervisor`](scraper::Supervisor): bounded retries with backoff
pub mod scraper;

/// On-disk persistence.
///
/// - [`Ledger`](store::Ledger): identifiers already saved for a task
/// - [`FolderAllocator`](store::FolderAllocator): `note_<n>` / `post_<n>` folders
/// - [`merge_records`](store::merge_records): txt/md exports
pub mod store;
