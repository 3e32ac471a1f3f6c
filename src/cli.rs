// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Global mode flags plus sync, status, clean, and version subcommands

use crate::ratelimit::MIN_RATE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notion-mirror")]
#[command(about = "Mirror a Notion page tree into a git repository as markdown", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Integration token (overrides NOTION_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Root page id (overrides NOTION_ROOT_PAGE_ID and the config file)
    #[arg(long, global = true)]
    pub root_page: Option<String>,

    /// Directory the page tree is written into (default: current directory)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Config file (default: .notion-sync.yaml in the output directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Pages processed in parallel
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Request pacing as requests per second, optionally with a burst (rate[:burst])
    #[arg(long, global = true, value_parser = parse_rate)]
    pub rate_limit: Option<(f64, u32)>,

    /// Disable request pacing (not recommended)
    #[arg(long, global = true)]
    pub no_throttle: bool,

    /// Abort the run after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Compute and print the change set without writing or committing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Commit locally but do not push
    #[arg(long, global = true)]
    pub no_push: bool,

    /// Re-render every page regardless of fingerprints
    #[arg(long, global = true)]
    pub force: bool,

    /// Verbose logging
    #[arg(long, global = true)]
    pub debug: bool,
}

fn parse_rate(s: &str) -> Result<(f64, u32), String> {
    let (rate, burst) = match s.split_once(':') {
        Some((rate, burst)) => (rate, Some(burst)),
        None => (s, None),
    };

    let rate: f64 = rate.parse().map_err(|_| "Invalid rate value")?;
    if !(rate >= MIN_RATE && rate.is_finite()) {
        return Err(format!("rate must be at least {}", MIN_RATE));
    }

    let burst = match burst {
        Some(b) => b.parse().map_err(|_| "Invalid burst value")?,
        None => rate.ceil() as u32,
    };
    if burst == 0 {
        return Err("burst must be >= 1".into());
    }

    Ok((rate, burst))
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Sync the page tree (default)
    Sync,

    /// Show the last run and per-page fingerprints without contacting Notion
    Status,

    /// Remove every synced directory, the index, and the sync state
    Clean {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Print the version
    Version,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Sync)
    }
}
