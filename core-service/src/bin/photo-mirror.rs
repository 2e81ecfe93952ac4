//! Command line entry point.
//!
//! ```text
//! photo-mirror download   # pull the remote library into REPOSITORY
//! photo-mirror upload     # republish downloaded media to the storage backend
//! ```
//!
//! Configuration comes from the environment (and an optional `.env` file);
//! flags override the store root and the retry threshold.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use core_runtime::config::MirrorConfig;
use core_runtime::logging::init_logging;
use core_service::{bootstrap_desktop, MirrorCommand, MirrorReport};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "photo-mirror")]
#[command(about = "Mirror a Flickr library locally and republish it to Immich")]
struct Cli {
    /// Store root, overrides REPOSITORY
    #[arg(long, global = true)]
    repository: Option<PathBuf>,

    /// Failed attempts before an operation is skipped, overrides MAX_ATTEMPTS
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Pull new media and albums from the remote source
    Download,
    /// Upload downloaded media and albums to the storage backend
    Upload,
}

impl From<Command> for MirrorCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::Download => MirrorCommand::Download,
            Command::Upload => MirrorCommand::Upload,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // A missing .env file is normal in production
    let _ = dotenvy::dotenv();

    let config = MirrorConfig::from_lookup(|name| match name {
        "REPOSITORY" => cli
            .repository
            .as_ref()
            .map(|path| path.display().to_string())
            .or_else(|| std::env::var(name).ok()),
        "MAX_ATTEMPTS" => cli
            .max_attempts
            .map(|attempts| attempts.to_string())
            .or_else(|| std::env::var(name).ok()),
        _ => std::env::var(name).ok(),
    })
    .context("Invalid configuration")?;

    init_logging(config.logging.clone()).context("Failed to initialize logging")?;

    let core = bootstrap_desktop(config)?;
    let report = core
        .run(cli.command.into())
        .await
        .with_context(|| format!("{:?} failed", cli.command))?;

    match report {
        MirrorReport::Download(report) => {
            info!(?report, "Download finished");
            if !report.is_clean() {
                warn!("Some media or albums could not be mirrored, they are retried on the next run");
            }
        }
        MirrorReport::Upload(report) => {
            info!(?report, "Upload finished");
        }
    }

    Ok(())
}
