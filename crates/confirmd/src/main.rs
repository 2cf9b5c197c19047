//! Confirmation daemon
#![warn(missing_docs)]

use anyhow::Result;
use clap::Parser;
use confirmd::cli::CLIArgs;
use confirmd::{get_work_directory, load_settings, setup_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CLIArgs::parse();
    let work_dir = get_work_directory(&args)?;
    let settings = load_settings(&work_dir, args.config.clone())?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.console_level.clone());
    setup_tracing(&level)?;

    tracing::debug!("Loaded settings from {}", work_dir.display());

    confirmd::run(&settings).await
}
