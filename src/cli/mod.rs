pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use config::HarvestOverrides;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the images of a range of screenshot indices
    Harvest {
        /// Configuration file to use instead of the default one
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First index to process (inclusive)
        #[arg(long, alias = "indexStarting")]
        index_starting: Option<u64>,

        /// Last index to process (inclusive)
        #[arg(long, alias = "indexFinal")]
        index_final: Option<u64>,

        /// Number of concurrent workers
        #[arg(short, long, alias = "workerCount")]
        worker_count: Option<usize>,

        /// Directory to save images into
        #[arg(long)]
        images: Option<PathBuf>,

        /// Proxy list, one host:port per line
        #[arg(long)]
        proxies: Option<PathBuf>,

        /// User agent list, one per line
        #[arg(long, alias = "userAgents")]
        user_agents: Option<PathBuf>,

        /// Write the run summary as JSON to this file
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Show or initialize the configuration
    Config {
        /// Configuration file to act on instead of the default one
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Write the built-in defaults to the configuration file
        #[arg(long)]
        init: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Harvest {
            config,
            index_starting,
            index_final,
            worker_count,
            images,
            proxies,
            user_agents,
            summary_json,
        } => {
            let overrides = HarvestOverrides {
                index_starting,
                index_final,
                worker_count,
                images,
                proxies,
                user_agents,
            };
            commands::harvest(config, overrides, summary_json).await
        },
        Commands::Config { path, init } => {
            if init {
                info!("Writing default configuration");
                commands::init_config(path).await
            } else {
                commands::show_config(path).await
            }
        },
    }
}
