//! Newsletter sources and issue fetching.
//!
//! # Supported Sources
//!
//! | Source | Domains | Sections summarized |
//! |--------|---------|---------------------|
//! | Smol AI News | `news.smol.ai`, `smol.ai/issues` | AI Twitter / Reddit / Discord Recap |
//! | Weekly Robotics | `weeklyrobotics.com` | whole issue |
//!
//! An issue is fetched once with `reqwest`, its main content converted to
//! markdown by [`html::html_to_markdown`], and handed to the matching
//! summarizer.

pub mod html;

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{RecapError, RecapResult};
use crate::markdown::extract_section;
use crate::models::FetchedIssue;
use crate::utils::{char_len, char_offset};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("news_recap/", env!("CARGO_PKG_VERSION"));

/// Upper bound on the markdown sent to the model for one issue.
pub const MAX_SOURCE_CHARS: usize = 120_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewsSource {
    #[value(name = "smol-ai")]
    #[serde(rename = "smol-ai")]
    SmolAiNews,
    WeeklyRobotics,
}

impl NewsSource {
    /// Detect the source from an issue URL.
    pub fn detect(url: &str) -> Option<Self> {
        let lower = url.to_ascii_lowercase();
        if lower.contains("news.smol.ai") || lower.contains("smol.ai/issues") {
            Some(Self::SmolAiNews)
        } else if lower.contains("weeklyrobotics.com") {
            Some(Self::WeeklyRobotics)
        } else {
            None
        }
    }

    /// `forced` when given, else detected from `url`.
    pub fn resolve(url: &str, forced: Option<Self>) -> RecapResult<Self> {
        forced
            .or_else(|| Self::detect(url))
            .ok_or_else(|| RecapError::UnsupportedSource(url.to_string()))
    }

    /// Label used in discussion titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::SmolAiNews => "AI News",
            Self::WeeklyRobotics => "Robotics News",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::SmolAiNews => "Smol AI News",
            Self::WeeklyRobotics => "Weekly Robotics",
        }
    }

    pub fn default_headline(self, issue_number: Option<&str>) -> String {
        match self {
            Self::SmolAiNews => "AI 뉴스 요약".to_string(),
            Self::WeeklyRobotics => {
                format!("Weekly Robotics #{}", issue_number.unwrap_or("Unknown"))
            }
        }
    }

    /// Sections of the issue worth summarizing; empty means the whole issue.
    pub fn sections(self) -> &'static [&'static str] {
        match self {
            Self::SmolAiNews => &["AI Twitter Recap", "AI Reddit Recap", "AI Discord Recap"],
            Self::WeeklyRobotics => &[],
        }
    }
}

/// Fetch an issue page and convert its main content to markdown.
#[instrument(level = "info")]
pub async fn fetch_issue(url: &str) -> RecapResult<FetchedIssue> {
    let base = Url::parse(url).map_err(|e| RecapError::Config(format!("invalid URL {url}: {e}")))?;

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?;
    let response = client.get(base.clone()).send().await?;
    if !response.status().is_success() {
        return Err(RecapError::from_response("Newsletter", response).await);
    }
    let html = response.text().await?;
    let markdown = html::html_to_markdown(&html, &base);

    info!(
        html_bytes = html.len(),
        markdown_chars = char_len(&markdown),
        "Fetched issue"
    );
    if markdown.trim().is_empty() {
        return Err(RecapError::EmptyResponse("Newsletter"));
    }

    Ok(FetchedIssue {
        url: url.to_string(),
        markdown,
    })
}

/// Keep only the named sections, in the given order.
///
/// Falls back to the whole document when none of them is present, then caps
/// the result at [`MAX_SOURCE_CHARS`].
pub fn narrow_to_sections(markdown: &str, sections: &[&str]) -> String {
    let picked: Vec<String> = sections
        .iter()
        .map(|title| extract_section(markdown, title))
        .filter(|s| !s.is_empty())
        .collect();

    let narrowed = if picked.is_empty() {
        if !sections.is_empty() {
            warn!(?sections, "None of the expected sections found; using whole issue");
        }
        markdown.to_string()
    } else {
        debug!(found = picked.len(), expected = sections.len(), "Narrowed issue to sections");
        picked.join("\n\n")
    };

    if char_len(&narrowed) > MAX_SOURCE_CHARS {
        warn!(
            chars = char_len(&narrowed),
            limit = MAX_SOURCE_CHARS,
            "Issue too long; truncating"
        );
        return narrowed[..char_offset(&narrowed, MAX_SOURCE_CHARS)].to_string();
    }
    narrowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_detect() {
        assert_eq!(
            NewsSource::detect("https://news.smol.ai/issues/25-09-01-not-much"),
            Some(NewsSource::SmolAiNews)
        );
        assert_eq!(
            NewsSource::detect("https://www.weeklyrobotics.com/weekly-robotics-310"),
            Some(NewsSource::WeeklyRobotics)
        );
        assert_eq!(NewsSource::detect("https://example.com/news"), None);
    }

    #[test]
    fn test_resolve_prefers_forced_source() {
        assert_eq!(
            NewsSource::resolve("https://example.com", Some(NewsSource::WeeklyRobotics)).unwrap(),
            NewsSource::WeeklyRobotics
        );
        assert!(matches!(
            NewsSource::resolve("https://example.com", None),
            Err(RecapError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_default_headlines() {
        assert_eq!(NewsSource::SmolAiNews.default_headline(None), "AI 뉴스 요약");
        assert_eq!(
            NewsSource::WeeklyRobotics.default_headline(Some("310")),
            "Weekly Robotics #310"
        );
    }

    #[test]
    fn test_serde_names_match_cli_names() {
        assert_eq!(serde_json::to_string(&NewsSource::SmolAiNews).unwrap(), "\"smol-ai\"");
        assert_eq!(
            serde_json::to_string(&NewsSource::WeeklyRobotics).unwrap(),
            "\"weekly-robotics\""
        );
    }

    #[test]
    fn test_narrow_to_sections() {
        let md = "# Issue\n\nintro\n\n## AI Reddit Recap\n\nreddit\n\n## Other\n\nnoise\n\n## AI Twitter Recap\n\ntwitter\n";
        let narrowed = narrow_to_sections(md, NewsSource::SmolAiNews.sections());
        assert_eq!(narrowed, "## AI Twitter Recap\n\ntwitter\n\n## AI Reddit Recap\n\nreddit");
    }

    #[test]
    fn test_narrow_falls_back_to_whole_issue() {
        assert_eq!(narrow_to_sections("# Only\n\ntext", &["Missing"]), "# Only\n\ntext");
        assert_eq!(narrow_to_sections("# Only\n\ntext", &[]), "# Only\n\ntext");
    }

    #[tokio::test]
    async fn test_fetch_issue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/25-09-01-not-much"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><main><h2>AI Twitter Recap</h2><p><a href="/x">link</a></p></main></body></html>"#,
            ))
            .mount(&server)
            .await;

        let url = format!("{}/issues/25-09-01-not-much", server.uri());
        let issue = fetch_issue(&url).await.unwrap();
        assert_eq!(
            issue.markdown,
            format!("## AI Twitter Recap\n\n[link]({}/x)", server.uri())
        );
    }

    #[tokio::test]
    async fn test_fetch_issue_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let err = fetch_issue(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert!(matches!(err, RecapError::Api { status: 404, .. }));
    }
}
