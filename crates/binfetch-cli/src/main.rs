//! binfetch - fetch the right release binary for this machine.
//!
//! Resolves release assets from GitHub, GitLab or a CDN for the running
//! platform, downloads them through the resilient transport and installs
//! them into a versioned layout.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "binfetch")]
#[command(about = "Resolve, download and install release binaries for this platform")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the asset or CDN URL chosen for this platform
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Resolve these asset names offline instead of querying a release source
        #[arg(long = "asset", value_name = "NAME")]
        assets: Vec<String>,
    },

    /// Download the latest artifact
    Download {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory to save the artifact in
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Download and install the latest binary
    Install {
        #[command(flatten)]
        source: SourceArgs,

        /// Install base directory (defaults to ~/.local/bin)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Installed binary name (defaults to the project name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Render the CDN URL of a version
    Url {
        #[command(flatten)]
        matching: MatchingArgs,

        /// Version to render
        #[arg(long)]
        version: String,
    },

    /// List built-in presets
    Presets,
}

/// Where releases come from, plus how to match them.
#[derive(Args, Debug, Clone, Default)]
struct SourceArgs {
    /// GitHub repository as owner/repo
    #[arg(long, conflicts_with = "gitlab")]
    github: Option<String>,

    /// Numeric GitLab project id
    #[arg(long)]
    gitlab: Option<i64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    matching: MatchingArgs,
}

/// Matching configuration and target platform.
#[derive(Args, Debug, Clone, Default)]
struct MatchingArgs {
    /// Built-in preset (see `binfetch presets`)
    #[arg(long, conflicts_with = "config")]
    preset: Option<String>,

    /// Matching config as a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the matching strategy
    #[arg(long)]
    strategy: Option<String>,

    /// Project name used in patterns
    #[arg(long)]
    project: Option<String>,

    /// Target OS (defaults to the running one)
    #[arg(long)]
    os: Option<String>,

    /// Target architecture (defaults to the running one)
    #[arg(long)]
    arch: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("Running {:?}", cli.command);

    match cli.command {
        Command::Resolve { source, assets } => commands::resolve(&source, &assets).await,
        Command::Download { source, output } => commands::download(&source, &output).await,
        Command::Install { source, dir, name } => {
            commands::install(&source, dir, name.as_deref()).await
        }
        Command::Url { matching, version } => commands::url(&matching, &version),
        Command::Presets => commands::presets(),
    }
}
