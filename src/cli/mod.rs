pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::cli::config::RendererKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a site and print what was collected as JSON
    Crawl(CrawlArgs),

    /// Manage configuration profiles
    Config {
        /// Profile name to show or create
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Seed URL to start crawling from
    #[arg(required = true)]
    pub url: String,

    /// Regular expression a link must match to be followed (repeatable)
    #[arg(short, long = "pattern")]
    pub patterns: Vec<String>,

    /// Maximum crawling depth; values below 1 mean the default of 3
    #[arg(short, long, allow_negative_numbers = true)]
    pub depth: Option<i32>,

    /// Site profile to use instead of the default configuration
    #[arg(long)]
    pub profile: Option<String>,

    /// Renderer to use
    #[arg(short, long, value_enum)]
    pub renderer: Option<RendererKind>,

    /// Number of pages rendered at once
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Give up after this many minutes and keep what was collected
    #[arg(long)]
    pub timeout_minutes: Option<u64>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crawl(args) => {
            info!("Starting crawl on {}", args.url);
            commands::crawl(args).await
        },
        Commands::Config { profile, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if let Some(profile_name) = profile {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(profile_name)
            } else {
                info!("Showing current configuration");
                commands::show_config()
            }
        },
    }
}
