// ABOUTME: CLI entrypoint for notion-mirror command
// ABOUTME: Handles error exit codes and command dispatch

use clap::Parser;
use notion_mirror::{
    cli::{Cli, Commands},
    config::Config,
    error::PARTIAL_FAILURE_EXIT_CODE,
    logging,
    sink::GitSink,
    state::FileStateStore,
    sync::{clean, status, sync_all},
    Result,
};
use std::io::{self, BufRead, Write};
use tracing::debug;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("notion-mirror: [E{}] {}", e.exit_code(), e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let command = cli.command();

    if command == Commands::Version {
        println!("notion-mirror v{}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    logging::init(cli.debug);
    let config = Config::resolve(&cli)?;
    debug!(?config, "resolved configuration");

    let paths = config.paths();
    let store = FileStateStore::new(paths.state_file.clone(), paths.tmp_dir.clone());

    match command {
        Commands::Sync => {
            let root = config.root_page()?.to_string();
            let cancel = config.cancel_token();
            cancel.cancel_on_interrupt();
            let client = config.client(cancel.clone())?;
            let sink = GitSink::new(paths.root.clone());

            let report = sync_all(
                &client,
                &store,
                Some(&sink),
                &paths,
                &root,
                &config.sync_options(),
                &cancel,
            )?;
            print!("{}", report.summary());

            if report.is_partial() && !report.dry_run {
                return Ok(PARTIAL_FAILURE_EXIT_CODE);
            }
        }
        Commands::Status => {
            print!("{}", status(&store)?);
        }
        Commands::Clean { yes } => {
            if !yes && !confirm(&format!(
                "Remove every synced page under {} and the sync state?",
                paths.root.display()
            ))? {
                println!("Aborted.");
                return Ok(0);
            }
            let report = clean(&store, &paths)?;
            println!(
                "Removed {} page directories{}",
                report.removed_dirs.len(),
                if report.removed_index { " and the index" } else { "" }
            );
        }
        Commands::Version => {}
    }

    Ok(0)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
