//! Compact re-summary of a finished summary, sized for a chat channel.
//!
//! One-shot prompt: a worked example goes before the real request. The
//! discussion link is appended when the model leaves it out, and any model
//! failure yields a short notice pointing at the discussion instead.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::api::{AskAsync, PromptBundle};
use crate::utils::{char_len, today_label};

use super::prompts::{
    COMPACT_AI_SYSTEM, COMPACT_EXAMPLE_INPUT, COMPACT_EXAMPLE_OUTPUT, COMPACT_ROBOTICS_SYSTEM,
    compact_user,
};

static SHORT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{2})").expect("valid short date regex"));
static LONG_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"20(\d{2})[/-](\d{2})[/-](\d{2})").expect("valid long date regex"));

/// Look of the compact summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactStyle {
    #[default]
    Discord,
}

impl CompactStyle {
    pub fn label(self) -> &'static str {
        match self {
            CompactStyle::Discord => "discord",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactSummary {
    pub markdown: String,
    pub char_count: usize,
    pub style: CompactStyle,
    /// True when the model call failed and the notice was used.
    pub fallback: bool,
}

/// Robotics content is only detected from explicit markers.
pub fn is_robotics(content: &str) -> bool {
    content.contains("Weekly Robotics")
}

/// First `yy.mm.dd` or `20yy-mm-dd` date in `content`, as `yy.mm.dd`.
pub fn detect_date(content: &str) -> Option<String> {
    SHORT_DATE_RE
        .captures(content)
        .or_else(|| LONG_DATE_RE.captures(content))
        .map(|c| format!("{}.{}.{}", &c[1], &c[2], &c[3]))
}

pub fn fallback_text(discussion_url: Option<&str>) -> String {
    format!(
        "AI 뉴스 요약이 생성되었습니다.\n\n📖 자세히 보기: {}",
        discussion_url.unwrap_or("")
    )
    .trim_end()
    .to_string()
}

/// Append the `📖 상세 뉴스레터` footer unless the URL is already present.
pub fn ensure_discussion_link(summary: &str, discussion_url: &str) -> String {
    if summary.contains(discussion_url) {
        return summary.to_string();
    }
    let mut out = summary.trim_end().to_string();
    let tail_start = out
        .char_indices()
        .rev()
        .nth(99)
        .map(|(i, _)| i)
        .unwrap_or(0);
    if !out[tail_start..].contains("---") {
        out.push_str("\n\n---");
    }
    out.push_str(&format!("\n📖 상세 뉴스레터: {discussion_url}"));
    out
}

pub struct CompactSummarizer<C> {
    client: C,
    style: CompactStyle,
}

impl<C: AskAsync> CompactSummarizer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            style: CompactStyle::default(),
        }
    }

    fn prompt(&self, content: &str, date: &str, discussion_url: Option<&str>) -> PromptBundle {
        let robotics = is_robotics(content);
        let system = if robotics {
            COMPACT_ROBOTICS_SYSTEM
        } else {
            COMPACT_AI_SYSTEM
        };
        PromptBundle::new(system, compact_user(robotics, date, discussion_url, content))
            .with_example(COMPACT_EXAMPLE_INPUT, COMPACT_EXAMPLE_OUTPUT)
    }

    /// Re-summarize `content`. Never fails.
    #[instrument(level = "info", skip_all, fields(style = self.style.label()))]
    pub async fn summarize(&self, content: &str, discussion_url: Option<&str>) -> CompactSummary {
        let date = detect_date(content).unwrap_or_else(today_label);
        info!(%date, "Generating compact summary");

        let prompt = self.prompt(content, &date, discussion_url);
        match self.client.ask(&prompt).await {
            Ok(answer) => {
                let markdown = match discussion_url {
                    Some(url) => ensure_discussion_link(answer.trim(), url),
                    None => answer.trim().to_string(),
                };
                info!(chars = char_len(&markdown), "Compact summary ready");
                CompactSummary {
                    char_count: char_len(&markdown),
                    markdown,
                    style: self.style,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "Compact summary failed; using notice");
                CompactSummary {
                    markdown: fallback_text(discussion_url),
                    char_count: 0,
                    style: self.style,
                    fallback: true,
                }
            }
        }
    }
}
