pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::PlatformChoice;

#[derive(Parser)]
#[command(name = "socialcrawl")]
#[command(about = "Browser-driven crawler for Weibo and Xiaohongshu", long_about = None)]
pub struct Cli {
    /// Task file (JSON with a "tasks" array)
    #[arg(short, long, default_value = "tasks.json")]
    pub input: PathBuf,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub visible: bool,

    /// Platform for tasks that don't name one
    #[arg(short, long, value_enum, default_value_t = PlatformChoice::Auto)]
    pub platform: PlatformChoice,

    /// Config file (default: ~/.config/socialcrawl/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge the records of an existing task directory into txt/md files
    Export {
        /// Task directory, e.g. data/xhs/coffee
        task_dir: PathBuf,

        /// Base name of the merged files (default: directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Also copy the merged files to this directory
        #[arg(short, long)]
        to: Option<PathBuf>,
    },
    /// Check a task's ledger against its folders, dropping stale entries
    Verify {
        /// Task directory, e.g. data/weibo/user_1234567890
        task_dir: PathBuf,
    },
}
