//! protoreplay CLI
//!
//! Inspect recorded protocol logs and rehearse their replay offline.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protoreplay")]
#[command(about = "protoreplay - Session-relative replay of recorded protocol logs", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a recorded log
    Inspect {
        /// Path to log file
        #[arg(short, long)]
        log: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the requests a replay would send
    Plan {
        /// Path to log file
        #[arg(short, long)]
        log: PathBuf,
        /// TOML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Replay a log against its own recorded responses
    Rehearse {
        /// Path to log file
        #[arg(short, long)]
        log: PathBuf,
        /// TOML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Skip the configured pauses
        #[arg(long)]
        no_pauses: bool,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default = if verbose {
        "protoreplay=debug"
    } else {
        "protoreplay=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let output = match cli.command {
        Commands::Inspect { log, json } => commands::inspect(&log, json).await?,
        Commands::Plan { log, config } => commands::plan(&log, config.as_deref()).await?,
        Commands::Rehearse {
            log,
            config,
            no_pauses,
        } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted; stopping before the next request");
                    on_interrupt.cancel();
                }
            });
            commands::rehearse(&log, config.as_deref(), !no_pauses, cancel).await?
        }
    };
    print!("{output}");
    Ok(())
}
