//! CLI module for botflow
//!
//! Provides commands:
//! - `run`: Run configured jobs until Ctrl-C
//! - `preview`: Show upcoming fire times of a cron expression
//! - `validate`: Check every configured job and trigger
//! - `config`: Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod preview;
pub mod validate;

/// Botflow job scheduler CLI
#[derive(Parser, Debug)]
#[command(name = "botflow")]
#[command(about = "Run scheduled bot jobs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run configured jobs until interrupted
    Run {
        /// Extra configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the next fire times of a cron expression
    Preview {
        /// Six-field cron expression (sec min hour day month weekday, Monday = 0)
        expression: String,
        /// Number of fire times to print
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        /// Start searching from this time (RFC 3339, default: now)
        #[arg(long)]
        from: Option<String>,
    },
    /// Validate configured jobs and triggers
    Validate {
        /// Extra configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Extra configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Run { config }) => crate::app::run(config.as_deref()).await,
        Some(Commands::Preview {
            expression,
            count,
            from,
        }) => preview::run(&expression, count, from.as_deref()),
        Some(Commands::Validate { config }) => validate::run(config.as_deref()),
        Some(Commands::Config { config }) => config::run(config.as_deref()),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
