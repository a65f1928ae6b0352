//! mergeq command line

mod cli;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Merge queue decision engine
#[derive(Parser)]
#[command(name = "mergeq", version, about = "Merge queue decision engine")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a policy file and print it normalized
    CheckConfig {
        /// Policy file (TOML)
        path: PathBuf,
    },
    /// Replay a scenario through the merge train offline
    Simulate {
        /// Scenario file (JSON)
        scenario: PathBuf,

        /// Policy file; defaults to ./mergeq.toml when present
        #[arg(short, long)]
        policy: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::CheckConfig { path } => cli::run_check_config(&path)?,
        Commands::Simulate { scenario, policy } => {
            cli::run_simulate(&scenario, policy.as_deref()).await?;
        }
    }

    Ok(())
}
