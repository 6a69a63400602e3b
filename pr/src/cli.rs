//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PushRelay - relay branch pushes to a chat webhook
#[derive(Parser, Debug)]
#[command(name = "pushrelay")]
#[command(author, version, about = "Relay branch push events to a chat webhook", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long = "log-stderr", global = true)]
    pub log_stderr: bool,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the feed until interrupted
    Run,

    /// Run a single poll cycle and exit
    Once,

    /// Inspect or override the stored watermark
    Watermark {
        #[command(subcommand)]
        command: WatermarkCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum WatermarkCommand {
    /// Print the stored watermark
    Show,

    /// Overwrite the stored watermark
    Set {
        /// Event id to treat as already delivered
        #[arg(required = true)]
        id: u64,
    },
}
