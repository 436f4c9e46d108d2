//! Discord webhook publisher.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::chunker;
use crate::config::Config;
use crate::error::{RecapError, RecapResult};

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
    username: &'a str,
}

#[derive(Clone)]
pub struct DiscordPublisher {
    http: reqwest::Client,
    webhook_url: String,
    username: String,
    max_length: usize,
}

impl fmt::Debug for DiscordPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordPublisher")
            .field("username", &self.username)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl DiscordPublisher {
    pub fn new(
        webhook_url: impl Into<String>,
        username: impl Into<String>,
        max_length: usize,
    ) -> RecapResult<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(TIMEOUT).build()?,
            webhook_url: webhook_url.into(),
            username: username.into(),
            max_length,
        })
    }

    pub fn from_config(config: &Config) -> RecapResult<Self> {
        let url = config
            .discord_webhook_url
            .clone()
            .ok_or_else(|| RecapError::Config("DISCORD_WEBHOOK_URL is not set".to_string()))?;
        Self::new(url, config.bot_name.clone(), config.discord_max_length)
    }

    /// Post `content` as one or more messages, `tag` leading the first.
    ///
    /// Chunks go out in order; the first failure stops the rest. Returns the
    /// number of messages sent.
    #[instrument(level = "info", skip_all, fields(chars = content.chars().count()))]
    pub async fn publish(&self, content: &str, tag: &str) -> RecapResult<usize> {
        let messages = chunker::render_all(content, self.max_length, tag);
        let total = messages.len();

        for (i, message) in messages.iter().enumerate() {
            let response = self
                .http
                .post(&self.webhook_url)
                .json(&WebhookMessage {
                    content: message,
                    username: &self.username,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(RecapError::from_response("Discord", response).await);
            }
            debug!(chunk = i + 1, total, "Sent Discord message");
        }

        info!(messages = total, "Published to Discord");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_single_message_with_tag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "content": "**Title**\nhello",
                "username": "News Bot",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let publisher =
            DiscordPublisher::new(format!("{}/hook", server.uri()), "News Bot", 1900).unwrap();
        assert_eq!(publisher.publish("hello", "**Title**").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_long_content_is_chunked_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(3)
            .mount(&server)
            .await;

        let content = format!("{}\n", "가".repeat(99)).repeat(50);
        let publisher = DiscordPublisher::new(server.uri(), "bot", 1900).unwrap();
        assert_eq!(publisher.publish(&content, "").await.unwrap(), 3);

        let requests = server.received_requests().await.unwrap();
        let bodies: Vec<serde_json::Value> = requests
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        for (i, body) in bodies.iter().enumerate() {
            let text = body["content"].as_str().unwrap();
            assert!(text.contains(&format!("({}/3)", i + 1)));
            assert!(text.chars().count() <= 1900);
        }
    }

    #[tokio::test]
    async fn test_failure_stops_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .expect(1)
            .mount(&server)
            .await;

        let content = "line\n".repeat(1000);
        let publisher = DiscordPublisher::new(server.uri(), "bot", 1900).unwrap();
        let err = publisher.publish(&content, "").await.unwrap_err();
        assert!(matches!(err, RecapError::Api { status: 400, .. }));
    }
}
