//! Delivery channels for finished summaries.
//!
//! | Channel | Module | Receives |
//! |---------|--------|----------|
//! | GitHub Discussions | [`github`] | full markdown under a title |
//! | Discord webhook | [`discord`] | compact summary in length-bounded chunks |
//! | KakaoTalk bot webhook | [`kakao`] | today's-summary section as plain text |
//!
//! [`Publisher::enabled`] builds one publisher per configured channel.

pub mod discord;
pub mod github;
pub mod kakao;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::error::{RecapError, RecapResult};
use crate::models::DeliveryOutcome;

pub use discord::DiscordPublisher;
pub use github::GitHubPublisher;
pub use kakao::KakaoPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Discord,
    GitHub,
    Kakao,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Discord => "Discord",
            Channel::GitHub => "GitHub",
            Channel::Kakao => "Kakao",
        })
    }
}

/// What one delivery needs across all channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delivery<'a> {
    /// Discussion title; also the bold tag on the first Discord message.
    pub title: &'a str,
    /// Full markdown summary.
    pub full: &'a str,
    /// Compact re-summary for Discord; `full` is used when absent.
    pub compact: Option<&'a str>,
    /// Overrides the Discord tag built from `title`.
    pub tag: Option<&'a str>,
    /// Send the whole summary to Kakao when it fits.
    pub kakao_full: bool,
}

impl Delivery<'_> {
    fn discord_tag(&self) -> String {
        match self.tag {
            Some(tag) => tag.to_string(),
            None if self.title.trim().is_empty() => String::new(),
            None => format!("**{}**", self.title.trim()),
        }
    }
}

#[derive(Debug)]
pub enum Publisher {
    Discord(DiscordPublisher),
    GitHub(GitHubPublisher),
    Kakao(KakaoPublisher),
}

impl Publisher {
    /// One publisher per channel with enough configuration.
    pub fn enabled(config: &Config, shorten_links: bool) -> RecapResult<Vec<Publisher>> {
        config
            .enabled_channels()
            .into_iter()
            .map(|channel| Publisher::for_channel(channel, config, shorten_links))
            .collect()
    }

    pub fn for_channel(
        channel: Channel,
        config: &Config,
        shorten_links: bool,
    ) -> RecapResult<Publisher> {
        Ok(match channel {
            Channel::Discord => Publisher::Discord(DiscordPublisher::from_config(config)?),
            Channel::GitHub => Publisher::GitHub(GitHubPublisher::from_config(config)?),
            Channel::Kakao => Publisher::Kakao(KakaoPublisher::from_config(config, shorten_links)?),
        })
    }

    pub fn channel(&self) -> Channel {
        match self {
            Publisher::Discord(_) => Channel::Discord,
            Publisher::GitHub(_) => Channel::GitHub,
            Publisher::Kakao(_) => Channel::Kakao,
        }
    }

    /// Deliver to this channel. Returns the created URL when the channel
    /// produces one.
    pub async fn deliver(&self, delivery: &Delivery<'_>) -> RecapResult<Option<String>> {
        match self {
            Publisher::Discord(p) => {
                let content = delivery.compact.unwrap_or(delivery.full);
                p.publish(content, &delivery.discord_tag()).await?;
                Ok(None)
            }
            Publisher::GitHub(p) => p
                .create_discussion(delivery.title, delivery.full)
                .await
                .map(Some),
            Publisher::Kakao(p) => {
                p.publish(delivery.full, delivery.kakao_full).await?;
                Ok(None)
            }
        }
    }

    /// [`Publisher::deliver`] with the error logged and folded into the outcome.
    /// An empty message counts as skipped.
    #[instrument(level = "info", skip_all, fields(channel = %self.channel()))]
    pub async fn deliver_logged(&self, delivery: &Delivery<'_>) -> DeliveryOutcome {
        match self.deliver(delivery).await {
            Ok(url) => {
                info!(url = url.as_deref().unwrap_or("-"), "Delivered");
                DeliveryOutcome::Delivered { url }
            }
            Err(RecapError::NothingToSend(_)) => {
                info!("Nothing to deliver");
                DeliveryOutcome::skipped("nothing to send")
            }
            Err(e) => {
                error!(error = %e, "Delivery failed");
                DeliveryOutcome::failed(e)
            }
        }
    }
}

/// First publisher for `channel`, if enabled.
pub fn find(publishers: &[Publisher], channel: Channel) -> Option<&Publisher> {
    publishers.iter().find(|p| p.channel() == channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EnvArgs;
    use crate::config::FileConfig;

    #[test]
    fn test_discord_tag() {
        let d = Delivery {
            title: " [AI News, 25.09.01] 헤드라인 ",
            ..Delivery::default()
        };
        assert_eq!(d.discord_tag(), "**[AI News, 25.09.01] 헤드라인**");

        let d = Delivery {
            title: "ignored",
            tag: Some("custom"),
            ..Delivery::default()
        };
        assert_eq!(d.discord_tag(), "custom");
        assert_eq!(Delivery::default().discord_tag(), "");
    }

    #[test]
    fn test_enabled_publishers_follow_config() {
        let env = EnvArgs {
            discord_webhook_url: Some("https://discord.test/hook".into()),
            kakao_bot_webhook_url: Some("https://kakao.test/hook".into()),
            ..EnvArgs::default()
        };
        let config = Config::resolve(&env, FileConfig::default(), false);
        let publishers = Publisher::enabled(&config, false).unwrap();
        let channels: Vec<_> = publishers.iter().map(Publisher::channel).collect();
        assert_eq!(channels, vec![Channel::Discord, Channel::Kakao]);
        assert!(find(&publishers, Channel::GitHub).is_none());
    }

    #[test]
    fn test_channel_display_and_serde() {
        assert_eq!(Channel::GitHub.to_string(), "GitHub");
        assert_eq!(serde_json::to_string(&Channel::Kakao).unwrap(), "\"kakao\"");
    }
}
