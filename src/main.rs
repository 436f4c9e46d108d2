//! # News Recap
//!
//! Summarizes AI and robotics newsletters into Korean markdown and
//! republishes them to GitHub Discussions, Discord and a KakaoTalk bot.
//!
//! ## Usage
//!
//! ```sh
//! news_recap run https://news.smol.ai/issues/25-09-01-not-much
//! news_recap publish outputs/2025/09/full/full_20250901_090000.md --discord
//! news_recap kakao summary.md --no-shorten
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: Download the issue and convert its main content to markdown
//! 2. **Summarizing**: Links are swapped for placeholders, the model writes the
//!    Korean summary, links are restored and duplicate citations removed
//! 3. **Publishing**: Full text to GitHub Discussions, a compact re-summary to
//!    Discord in length-bounded chunks, today's summary to KakaoTalk as plain text
//! 4. **Output**: Every artifact and a JSON run record under `outputs/YYYY/MM/`

use std::error::Error;

use clap::Parser;
use tracing::{debug, error, info};

mod api;
mod chunker;
mod citations;
mod cli;
mod config;
mod error;
mod links;
mod logging;
mod markdown;
mod models;
mod notifier;
mod outputs;
mod publishers;
mod sources;
mod summarizers;
mod transcode;
mod utils;
mod workflow;

use cli::{Cli, Command};
use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.env, cli.config.as_deref(), cli.debug)?;
    logging::init(&config)?;

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "news_recap starting up");
    debug!(command = ?cli.command, channels = ?config.enabled_channels(), "Parsed CLI arguments");

    let result = match &cli.command {
        Command::Run(args) => workflow::run_command(&config, args).await,
        Command::Publish(args) => workflow::publish_command(&config, args).await,
        Command::Clean(args) => workflow::clean_command(&config, args).await,
        Command::Kakao(args) => workflow::kakao_command(args).await,
        Command::Discussions(args) => workflow::discussions_command(&config, args).await,
    };

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(?elapsed, secs = elapsed.as_secs(), "Execution complete"),
        Err(e) => error!(error = %e, ?elapsed, "Execution failed"),
    }

    // Give the error webhook a moment to flush before the runtime shuts down.
    if result.is_err() && config.error_notification_enabled() {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
    result
}
