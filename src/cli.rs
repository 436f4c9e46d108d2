//! Command-line interface definitions for News Recap.
//!
//! This module defines the CLI arguments, subcommands and options using the
//! `clap` crate. Secrets and endpoints are read from the environment (a `.env`
//! file is loaded before parsing), everything else is a flag.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::sources::NewsSource;

/// Command-line arguments for the News Recap application.
///
/// # Examples
///
/// ```sh
/// # Summarize an issue and publish it everywhere that is configured
/// news_recap run https://news.smol.ai/issues/25-09-01-not-much
///
/// # Generate and save without publishing
/// news_recap run https://weeklyrobotics.com/weekly-robotics-310 --dry-run
///
/// # Turn an existing summary into KakaoTalk text
/// news_recap kakao outputs/2025/09/full/full_20250901_090000.md
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub env: EnvArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Secrets and endpoints, normally supplied through the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chat model used for summaries
    #[arg(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Discord webhook for summaries
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub discord_webhook_url: Option<String>,

    /// Discord webhook for error alerts
    #[arg(long, env = "ERROR_DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub error_discord_webhook_url: Option<String>,

    /// GitHub token with discussion write access
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repository for discussions (`owner/name`)
    #[arg(long, env = "GH_REPO")]
    pub gh_repo: Option<String>,

    /// Organization for discussions
    #[arg(long, env = "GH_ORG")]
    pub gh_org: Option<String>,

    /// Repository holding the organization's discussions
    #[arg(long, env = "GH_ORG_REPO")]
    pub gh_org_repo: Option<String>,

    /// Discussion category name
    #[arg(long, env = "GH_DISCUSSION_CATEGORY")]
    pub gh_discussion_category: Option<String>,

    /// KakaoTalk bot webhook
    #[arg(long, env = "KAKAO_BOT_WEBHOOK_URL", hide_env_values = true)]
    pub kakao_bot_webhook_url: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for log files
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a newsletter issue and publish it
    Run(RunArgs),
    /// Publish an existing markdown file
    Publish(PublishArgs),
    /// Remove duplicate citations from a markdown file
    Clean(CleanArgs),
    /// Convert a markdown file to KakaoTalk plain text
    Kakao(KakaoArgs),
    /// List recent discussions on the board
    Discussions(DiscussionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Newsletter issue URL
    pub url: String,

    /// Force a source instead of detecting it from the URL
    #[arg(long, value_enum)]
    pub source: Option<NewsSource>,

    /// Timeframe hint passed to the model
    #[arg(long)]
    pub timeframe: Option<String>,

    /// Discussion title (generated when omitted)
    #[arg(long)]
    pub title: Option<String>,

    /// Skip GitHub Discussions
    #[arg(long)]
    pub no_github: bool,

    /// Skip Discord
    #[arg(long)]
    pub no_discord: bool,

    /// Skip KakaoTalk
    #[arg(long)]
    pub no_kakao: bool,

    /// Send the full summary to KakaoTalk when it fits
    #[arg(long)]
    pub kakao_full: bool,

    /// Generate and save, but publish nothing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Markdown file to publish
    pub file: PathBuf,

    /// Discussion title
    #[arg(long)]
    pub title: Option<String>,

    /// Tag prepended to the first Discord message
    #[arg(long)]
    pub tag: Option<String>,

    /// Publish to Discord
    #[arg(long)]
    pub discord: bool,

    /// Publish to GitHub Discussions
    #[arg(long)]
    pub github: bool,

    /// Publish to KakaoTalk
    #[arg(long)]
    pub kakao: bool,

    /// Send the full text to KakaoTalk when it fits
    #[arg(long)]
    pub kakao_full: bool,

    /// Show what would be published
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Markdown file to clean
    pub input: PathBuf,

    /// Output path (default `<stem>_cleaned.md`)
    pub output: Option<PathBuf>,

    /// Skip the model and use only the rule-based cleanup
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args, Debug, Clone)]
pub struct KakaoArgs {
    /// Markdown file to convert
    pub input: PathBuf,

    /// Output path (default `<stem>_kakao.txt`)
    pub output: Option<PathBuf>,

    /// Keep original URLs instead of shortening them
    #[arg(long)]
    pub no_shorten: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DiscussionsArgs {
    /// Number of discussions to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

impl PublishArgs {
    /// No explicit channel flag means every configured channel.
    pub fn all_channels(&self) -> bool {
        !(self.discord || self.github || self.kakao)
    }
}

/// Output path next to `input`, named `<stem><suffix>`.
pub fn sibling_path(input: &std::path::Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_parsing() {
        let cli = Cli::parse_from([
            "news_recap",
            "run",
            "https://news.smol.ai/issues/25-09-01-not-much",
            "--no-kakao",
            "--timeframe",
            "2025-09-01",
        ]);

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.url, "https://news.smol.ai/issues/25-09-01-not-much");
                assert!(args.no_kakao);
                assert!(!args.no_discord);
                assert_eq!(args.timeframe.as_deref(), Some("2025-09-01"));
                assert!(args.source.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_source_value() {
        let cli = Cli::parse_from([
            "news_recap",
            "run",
            "https://example.com/issue",
            "--source",
            "weekly-robotics",
        ]);
        match cli.command {
            Command::Run(args) => assert_eq!(args.source, Some(NewsSource::WeeklyRobotics)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["news_recap", "discussions", "--debug", "--limit", "3"]);
        assert!(cli.debug);
        match cli.command {
            Command::Discussions(args) => assert_eq!(args.limit, 3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_publish_defaults_to_all_channels() {
        let cli = Cli::parse_from(["news_recap", "publish", "summary.md"]);
        match cli.command {
            Command::Publish(args) => assert!(args.all_channels()),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["news_recap", "publish", "summary.md", "--discord"]);
        match cli.command {
            Command::Publish(args) => assert!(!args.all_channels()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sibling_path() {
        let p = sibling_path(std::path::Path::new("/tmp/out/summary.md"), "_cleaned.md");
        assert_eq!(p, PathBuf::from("/tmp/out/summary_cleaned.md"));
    }
}
