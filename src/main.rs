mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::DeviceParams;

#[derive(Parser)]
#[command(
    name = "waqt",
    version,
    about = "Scheduled-refresh coordinators for prayer times, neoHub thermostats and speakers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all sources and serve the control API
    Run {
        /// Override the API bind address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Refresh sources once and print their snapshots
    Refresh {
        /// Only refresh this source
        #[arg(short, long)]
        source: Option<String>,

        /// Print snapshots as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Compute the DST hour offset between two Maghrib times
    Offset {
        /// Timetable Maghrib (HH:MM)
        source: String,

        /// Reference Maghrib (HH:MM)
        reference: String,

        /// Times to shift by the offset
        #[arg(short, long)]
        time: Vec<String>,
    },

    /// Send a command to a neoHub source
    Neohub {
        /// Source name
        source: String,

        /// Command JSON, e.g. '{"command":"standby","device":"Lounge","on":true}'
        command: String,
    },

    /// Send a command to a speaker source
    Speaker {
        /// Source name
        source: String,

        /// Command JSON, e.g. '{"command":"set_volume","volume":0.4}'
        command: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Run { bind } => {
            tracing::info!(config = ?cli.config, bind = ?bind, "Starting run command");
            commands::run(cli.config, bind).await?;
        }

        Commands::Refresh { source, json } => {
            tracing::info!(source = ?source, json = %json, "Starting refresh command");
            commands::refresh(cli.config, source, json).await?;
        }

        Commands::Offset {
            source,
            reference,
            time,
        } => {
            commands::offset(source, reference, time)?;
        }

        Commands::Neohub { source, command } => {
            tracing::info!(source = %source, "Starting neohub command");
            commands::neohub(DeviceParams {
                config: cli.config,
                source,
                command,
            })
            .await?;
        }

        Commands::Speaker { source, command } => {
            tracing::info!(source = %source, "Starting speaker command");
            commands::speaker(DeviceParams {
                config: cli.config,
                source,
                command,
            })
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("waqt=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("waqt=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
