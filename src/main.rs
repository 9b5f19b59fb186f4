//! scrapemon - Live dashboard plumbing for a remote media-scraping worker
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scrapemon::ReplayOptions;
use scrapemon_core::{ChannelFilter, LevelFilter};

/// scrapemon - Live dashboard plumbing for a remote media-scraping worker
#[derive(Parser, Debug)]
#[command(name = "scrapemon")]
#[command(about = "Event ingestion and session tracking for a scrape worker", long_about = None)]
struct Args {
    /// Project directory holding `.scrapemon/config.toml`
    #[arg(long, global = true, value_name = "PATH")]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a captured frame log and print the resulting view
    Replay {
        /// File with one wire frame per line
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Channel to show: all, main or request
        #[arg(long, default_value = "all")]
        channel: ChannelFilter,

        /// Level to show: all, info, success, warning, error or debug
        #[arg(long, default_value = "all")]
        level: LevelFilter,

        /// Case-insensitive substring search over message text
        #[arg(long)]
        search: Option<String>,

        /// Print the failure list instead of the log
        #[arg(long)]
        failures: bool,

        /// Append a one-line session summary
        #[arg(long)]
        summary: bool,
    },

    /// Read frames from stdin and emit NDJSON events (headless mode)
    Watch,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    scrapemon_core::logging::init()?;

    let args = Args::parse();

    // Get project path from args or use current directory
    let project = args
        .project
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    match args.command {
        Command::Replay {
            file,
            channel,
            level,
            search,
            failures,
            summary,
        } => {
            let options = ReplayOptions {
                channel,
                level,
                search,
                failures,
                summary,
            };
            scrapemon::run_replay(&project, &file, &options).await?;
        }
        Command::Watch => scrapemon::run_watch(&project).await?,
    }

    Ok(())
}
