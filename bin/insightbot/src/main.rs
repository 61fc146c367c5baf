mod commands;
mod engine;

use clap::{Parser, Subcommand};
use insightbot_core::Paths;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "insightbot")]
#[command(about = "Query-routing assistant for system engineers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single query and exit
    Ask {
        /// The question to ask
        #[arg(short, long)]
        message: String,
    },

    /// Interactive session with answer ratings
    Chat,

    /// Talk to a running gateway over HTTP
    Client {
        /// Gateway base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },

    /// Serve the chat API over HTTP
    Gateway {
        /// Port to listen on (overrides config gateway.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config gateway.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage the passage index
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Import prepared passages from a JSONL file ({"text", "source"} per line)
    Import {
        file: PathBuf,
    },
    /// Show passage counts
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    // Daily file alongside stderr; skipped if the logs dir is not writable.
    let paths = Paths::new();
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let log_path = paths.log_file_for(&today);
    let file_layer = std::fs::create_dir_all(paths.logs_dir())
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path))
        .ok()
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ask { message } => {
            commands::ask::run(message).await?;
        }
        Commands::Chat => {
            commands::chat::run().await?;
        }
        Commands::Client { url } => {
            commands::client::run(url).await?;
        }
        Commands::Gateway { port, host } => {
            commands::gateway::run(host, port).await?;
        }
        Commands::Index { command } => match command {
            IndexCommands::Import { file } => {
                commands::index_cmd::import(&file).await?;
            }
            IndexCommands::Stats => {
                commands::index_cmd::stats().await?;
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(force).await?;
            }
        },
    }

    Ok(())
}
