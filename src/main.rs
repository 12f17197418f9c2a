mod cli;
mod commands;
mod config;
mod engine;
mod progress;
mod remote;
mod resource;
mod schema;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ImportCommand};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// `--config`, otherwise ~/.config/catalink/config.toml
    pub config_path: Option<PathBuf>,
    /// `--state`, otherwise the configured state file
    pub state_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config_path: cli.config,
        state_path: cli.state,
    };

    match cli.command {
        Command::Plan(args) => commands::declarative::plan(&ctx, args),
        Command::Apply(args) => commands::declarative::apply(&ctx, args),
        Command::Refresh(args) => commands::declarative::refresh(&ctx, args),
        Command::Destroy(args) => commands::declarative::destroy(&ctx, args),
        Command::Import(cmd) => match cmd {
            ImportCommand::Association { name, key } => {
                commands::import::association(&ctx, &name, &key)
            }
            ImportCommand::Artifact {
                name,
                product_id,
                artifact_id,
            } => commands::import::artifact(&ctx, &name, &product_id, &artifact_id),
        },
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Catalog(cmd) => commands::catalog::run(&ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "catalink", &mut io::stdout());
            Ok(())
        }
    }
}
