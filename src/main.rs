use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use socialcrawl::app::AppContext;
use socialcrawl::cli::{commands, Cli, Commands};
use socialcrawl::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Export { task_dir, name, to }) => {
            commands::export_task(&task_dir, name.as_deref(), to.as_deref())?;
        }
        Some(Commands::Verify { task_dir }) => {
            commands::verify_task(&task_dir)?;
        }
        None => {
            let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
            if cli.visible {
                config.browser = config.browser.visible();
            }
            let ctx = AppContext::new(config);
            commands::run_tasks(&ctx, &cli.input, cli.platform)
                .await
                .with_context(|| format!("failed to load tasks from {}", cli.input.display()))?;
        }
    }

    Ok(())
}
