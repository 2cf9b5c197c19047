//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments
#[derive(Parser)]
#[command(about = "Confirmation request daemon speaking JSON lines over stdio", author = env!("CARGO_PKG_AUTHORS"), version = env!("CARGO_PKG_VERSION"))]
pub struct CLIArgs {
    #[arg(
        short,
        long,
        help = "Use the <directory> as the working directory",
        required = false
    )]
    /// Working directory
    pub work_dir: Option<PathBuf>,
    #[arg(
        short,
        long,
        help = "Use the <file name> as the location of the config file",
        required = false
    )]
    /// Config file
    pub config: Option<PathBuf>,
    #[arg(short, long, help = "Logging level, overrides the config file")]
    /// Log level
    pub log_level: Option<String>,
}
