//! Runtime configuration.
//!
//! A [`Config`] is built once in `main` from three layers, highest priority
//! first: command-line flags / environment variables ([`EnvArgs`]), an
//! optional YAML file ([`FileConfig`]), and built-in defaults. It is then
//! passed by reference to everything that needs it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::chunker::{DISCORD_MAX_LENGTH, KAKAO_MAX_LENGTH};
use crate::cli::EnvArgs;
use crate::error::{RecapError, RecapResult};
use crate::publishers::Channel;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ORG_REPO: &str = "community";
pub const DEFAULT_BOT_NAME: &str = "News Bot";

/// Non-secret tuning read from `--config <file>`.
///
/// ```yaml
/// model: gpt-4o
/// request_timeout_secs: 600
/// max_retries: 3
/// output_dir: outputs
/// bot_name: News Bot
/// discord_max_length: 1900
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub bot_name: Option<String>,
    pub discord_max_length: Option<usize>,
    pub kakao_max_length: Option<usize>,
    pub discussion_category: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl FileConfig {
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> RecapResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> RecapResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Fully resolved configuration.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub request_timeout: Duration,
    pub max_retries: usize,

    pub discord_webhook_url: Option<String>,
    pub error_webhook_url: Option<String>,
    pub bot_name: String,

    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_org: Option<String>,
    pub github_org_repo: String,
    pub discussion_category: Option<String>,

    pub kakao_webhook_url: Option<String>,

    pub discord_max_length: usize,
    pub kakao_max_length: usize,

    pub output_dir: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Config {
    /// Merge flags/environment over the file over defaults.
    pub fn resolve(env: &EnvArgs, file: FileConfig, debug: bool) -> Self {
        let log_level = if debug {
            "debug".to_string()
        } else {
            non_empty(&env.log_level).unwrap_or_else(|| "info".to_string())
        };

        Self {
            openai_api_key: non_empty(&env.openai_api_key),
            openai_model: non_empty(&env.openai_model)
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: non_empty(&env.openai_base_url)
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(file.request_timeout_secs.unwrap_or(600)),
            max_retries: file.max_retries.unwrap_or(3),

            discord_webhook_url: non_empty(&env.discord_webhook_url),
            error_webhook_url: non_empty(&env.error_discord_webhook_url),
            bot_name: file
                .bot_name
                .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),

            github_token: non_empty(&env.github_token),
            github_repo: non_empty(&env.gh_repo),
            github_org: non_empty(&env.gh_org),
            github_org_repo: non_empty(&env.gh_org_repo)
                .unwrap_or_else(|| DEFAULT_ORG_REPO.to_string()),
            discussion_category: non_empty(&env.gh_discussion_category)
                .or(file.discussion_category),

            kakao_webhook_url: non_empty(&env.kakao_bot_webhook_url),

            discord_max_length: file.discord_max_length.unwrap_or(DISCORD_MAX_LENGTH),
            kakao_max_length: file.kakao_max_length.unwrap_or(KAKAO_MAX_LENGTH),

            output_dir: file.output_dir.unwrap_or_else(|| PathBuf::from("outputs")),
            log_level,
            log_dir: env
                .log_dir
                .clone()
                .or(file.log_dir)
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }

    /// Load the optional YAML file and resolve.
    pub fn load(env: &EnvArgs, path: Option<&Path>, debug: bool) -> RecapResult<Self> {
        let file = match path {
            Some(p) => FileConfig::load(p)?,
            None => FileConfig::default(),
        };
        let config = Self::resolve(env, file, debug);
        debug!(config = ?config, "Resolved configuration");
        Ok(config)
    }

    /// Settings required by any command that calls the model.
    pub fn validate(&self) -> RecapResult<()> {
        if self.openai_api_key.is_none() {
            return Err(RecapError::Config("OPENAI_API_KEY is not set".to_string()));
        }
        if self.discord_max_length == 0 || self.kakao_max_length == 0 {
            return Err(RecapError::Config(
                "message length limits must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn discord_enabled(&self) -> bool {
        self.discord_webhook_url.is_some()
    }

    pub fn github_enabled(&self) -> bool {
        self.github_token.is_some()
            && (self.github_repo.is_some() || self.github_org.is_some())
            && self.discussion_category.is_some()
    }

    pub fn kakao_enabled(&self) -> bool {
        self.kakao_webhook_url.is_some()
    }

    pub fn error_notification_enabled(&self) -> bool {
        self.error_webhook_url.is_some()
    }

    /// Channels with enough configuration to publish.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        if self.discord_enabled() {
            channels.push(Channel::Discord);
        }
        if self.github_enabled() {
            channels.push(Channel::GitHub);
        }
        if self.kakao_enabled() {
            channels.push(Channel::Kakao);
        }
        channels
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Config")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("discord_webhook_url", &redact(&self.discord_webhook_url))
            .field("error_webhook_url", &redact(&self.error_webhook_url))
            .field("bot_name", &self.bot_name)
            .field("github_token", &redact(&self.github_token))
            .field("github_repo", &self.github_repo)
            .field("github_org", &self.github_org)
            .field("github_org_repo", &self.github_org_repo)
            .field("discussion_category", &self.discussion_category)
            .field("kakao_webhook_url", &redact(&self.kakao_webhook_url))
            .field("discord_max_length", &self.discord_max_length)
            .field("kakao_max_length", &self.kakao_max_length)
            .field("output_dir", &self.output_dir)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

/// Treat empty environment values (`FOO=`) as unset.
fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
