//! KakaoTalk bot webhook publisher.
//!
//! The bot receives plain text only, so the markdown goes through the
//! transcoder first and is then cut to the message limit.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{RecapError, RecapResult};
use crate::markdown::extract_today_summary;
use crate::transcode::{ShortLinks, TinyUrlShortener, resolve_short_links, to_plain_dialect};
use crate::utils::{char_len, truncate_with_ellipsis};

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct BotMessage<'a> {
    text: &'a str,
}

/// Text the bot would receive for `markdown`, or `None` when there is
/// nothing to send.
///
/// With `send_full` the whole document is used if its plain form fits;
/// otherwise (and by default) only the today's-summary section is sent,
/// truncated to `max_length`.
pub fn prepare_text(
    markdown: &str,
    send_full: bool,
    max_length: usize,
    short_links: &ShortLinks,
) -> Option<String> {
    if send_full {
        let text = to_plain_dialect(markdown, short_links);
        if char_len(&text) <= max_length {
            return Some(text);
        }
        warn!(
            chars = char_len(&text),
            limit = max_length,
            "Full text too long for Kakao; sending today's summary"
        );
    }

    let section = extract_today_summary(markdown);
    if section.is_empty() {
        info!("No today's-summary section to send");
        return None;
    }

    let text = to_plain_dialect(&section, short_links);
    if char_len(&text) > max_length {
        warn!(chars = char_len(&text), limit = max_length, "Kakao message truncated");
    }
    Some(truncate_with_ellipsis(&text, max_length))
}

pub struct KakaoPublisher {
    http: reqwest::Client,
    webhook_url: String,
    max_length: usize,
    shortener: Option<TinyUrlShortener>,
}

impl fmt::Debug for KakaoPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KakaoPublisher")
            .field("max_length", &self.max_length)
            .field("shorten_links", &self.shortener.is_some())
            .finish_non_exhaustive()
    }
}

impl KakaoPublisher {
    pub fn new(
        webhook_url: impl Into<String>,
        max_length: usize,
        shortener: Option<TinyUrlShortener>,
    ) -> RecapResult<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(TIMEOUT).build()?,
            webhook_url: webhook_url.into(),
            max_length,
            shortener,
        })
    }

    pub fn from_config(config: &Config, shorten_links: bool) -> RecapResult<Self> {
        let url = config
            .kakao_webhook_url
            .clone()
            .ok_or_else(|| RecapError::Config("KAKAO_BOT_WEBHOOK_URL is not set".to_string()))?;
        let shortener = if shorten_links {
            Some(TinyUrlShortener::new()?)
        } else {
            None
        };
        Self::new(url, config.kakao_max_length, shortener)
    }

    /// [`prepare_text`] with this publisher's length limit.
    pub fn prepare(&self, markdown: &str, send_full: bool, short_links: &ShortLinks) -> Option<String> {
        prepare_text(markdown, send_full, self.max_length, short_links)
    }

    /// Convert and send. Returns the text that was posted.
    #[instrument(level = "info", skip_all, fields(send_full = send_full))]
    pub async fn publish(&self, markdown: &str, send_full: bool) -> RecapResult<String> {
        let short_links = match &self.shortener {
            Some(shortener) => resolve_short_links(markdown, shortener).await,
            None => ShortLinks::new(),
        };

        let text = self
            .prepare(markdown, send_full, &short_links)
            .ok_or(RecapError::NothingToSend("Kakao"))?;

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&BotMessage { text: &text })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RecapError::from_response("Kakao", response).await);
        }

        info!(chars = char_len(&text), "Published to Kakao");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC: &str = "## AI Twitter Recap\n\n- **모델** 출시 [링크](https://a.io/x)\n\n## 오늘의 요약\n\n- 첫째 소식\n- 둘째 소식\n";

    fn publisher(url: &str, max: usize) -> KakaoPublisher {
        KakaoPublisher::new(url, max, None).unwrap()
    }

    #[test]
    fn test_prepare_selects_today_summary() {
        let p = publisher("http://unused", 1000);
        let text = p.prepare(DOC, false, &ShortLinks::new()).unwrap();
        assert_eq!(text, "[오늘의 요약]\n\nㆍ 첫째 소식\nㆍ 둘째 소식");
    }

    #[test]
    fn test_prepare_full_when_it_fits() {
        let p = publisher("http://unused", 1000);
        let text = p.prepare(DOC, true, &ShortLinks::new()).unwrap();
        assert!(text.starts_with("[AI Twitter Recap]"));
        assert!(text.contains("모델 출시 링크 (https://a.io/x)"));
    }

    #[test]
    fn test_prepare_full_falls_back_to_summary() {
        let p = publisher("http://unused", 40);
        let text = p.prepare(DOC, true, &ShortLinks::new()).unwrap();
        assert!(text.starts_with("[오늘의 요약]"));
    }

    #[test]
    fn test_prepare_truncates() {
        let doc = format!("## 오늘의 요약\n\n{}", "가".repeat(2000));
        let text = publisher("http://unused", 1000)
            .prepare(&doc, false, &ShortLinks::new())
            .unwrap();
        assert_eq!(text.chars().count(), 1000);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_prepare_nothing_to_send() {
        let p = publisher("http://unused", 1000);
        assert!(p.prepare("## Other\n\ntext", false, &ShortLinks::new()).is_none());
    }

    #[tokio::test]
    async fn test_publish_posts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot"))
            .and(body_json(serde_json::json!({
                "text": "[오늘의 요약]\n\nㆍ 첫째 소식\nㆍ 둘째 소식"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let p = publisher(&format!("{}/bot", server.uri()), 1000);
        p.publish(DOC, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_section_fails_before_posting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let p = publisher(&server.uri(), 1000);
        assert!(p.publish("## Other\n\ntext", false).await.is_err());
    }
}
