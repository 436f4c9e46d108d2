//! Weekly Robotics summarizer.
//!
//! The model writes a `**헤드라인: …**` line and, when the issue has a cover
//! image, a `**썸네일: …**` line above the summary. Both are lifted out; the
//! thumbnail is re-inserted as an image at the top and a source footer is
//! added when the model left it out.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::api::{AskAsync, PromptBundle};
use crate::citations::extract_headline;
use crate::error::RecapResult;
use crate::links;
use crate::models::{FetchedIssue, SummaryDocument};
use crate::sources::{NewsSource, narrow_to_sections};
use crate::utils::today_label;

use super::prompts::{WEEKLY_DEVELOPER, WEEKLY_SYSTEM, weekly_user};

static ISSUE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"weekly-robotics-(\d+)").expect("valid issue number regex"));

/// Issue number from a URL such as `https://www.weeklyrobotics.com/weekly-robotics-310`.
pub fn issue_number(url: &str) -> Option<String> {
    ISSUE_NUMBER_RE.captures(url).map(|c| c[1].to_string())
}

/// Thumbnail on top, source footer at the bottom.
pub fn decorate(body: &str, thumbnail: Option<&str>, url: &str, issue: &str) -> String {
    let mut markdown = body.trim().to_string();
    if let Some(thumbnail) = thumbnail {
        markdown = format!("![Weekly Robotics]({thumbnail})\n\n{markdown}");
    }
    if !markdown.contains("출처: [Weekly Robotics") {
        markdown.push_str(&format!("\n\n---\n📖 출처: [Weekly Robotics #{issue}]({url})"));
    }
    markdown
}

#[instrument(level = "info", skip_all, fields(url = %issue.url))]
pub async fn summarize<C: AskAsync>(client: &C, issue: &FetchedIssue) -> RecapResult<SummaryDocument> {
    let source = NewsSource::WeeklyRobotics;
    let number = issue_number(&issue.url);
    let content = narrow_to_sections(&issue.markdown, source.sections());
    let (protected, map) = links::preserve(&content);

    let prompt = PromptBundle::new(WEEKLY_SYSTEM, weekly_user(&issue.url, &protected))
        .with_developer(WEEKLY_DEVELOPER);
    let answer = client.ask(&prompt).await?;
    let restored = links::restore(&answer, &map);
    let report = links::validate(&content, &restored);
    if !report.is_lossless() {
        warn!(
            missing = report.missing.len(),
            added = report.added.len(),
            rate = report.preservation_rate,
            "Summary changed the issue's link set"
        );
    }

    let parts = extract_headline(&restored);
    if let Some(headline) = &parts.headline {
        info!(%headline, "Extracted headline");
    }
    if let Some(thumbnail) = &parts.thumbnail {
        info!(%thumbnail, "Extracted thumbnail");
    }

    let markdown = decorate(
        &parts.body,
        parts.thumbnail.as_deref(),
        &issue.url,
        number.as_deref().unwrap_or("Unknown"),
    );

    Ok(SummaryDocument {
        source,
        source_url: issue.url.clone(),
        date: today_label(),
        markdown,
        headline: parts.headline,
        thumbnail: parts.thumbnail,
        issue_number: number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizers::testing::Scripted;

    const URL: &str = "https://www.weeklyrobotics.com/weekly-robotics-310";

    #[test]
    fn test_issue_number() {
        assert_eq!(issue_number(URL).as_deref(), Some("310"));
        assert_eq!(issue_number("https://www.weeklyrobotics.com/"), None);
    }

    #[test]
    fn test_decorate_keeps_existing_footer() {
        let body = "## 🤖 이번 주 핵심 동향\n\n---\n📖 출처: [Weekly Robotics #310](https://x)";
        assert_eq!(decorate(body, None, URL, "310"), body);
    }

    #[tokio::test]
    async fn test_summarize_extracts_meta_lines() {
        let answer = "**헤드라인: 휴머노이드 양산 시작**\n**썸네일: https://cdn.test/cover.png**\n\n## 🤖 이번 주 핵심 동향\n\n트렌드.\n\n## 📰 주요 뉴스\n\n• **로봇**: 설명. [자세히 보기]([LINK_0001])";
        let client = Scripted::answering(&[answer]);
        let issue = FetchedIssue {
            url: URL.into(),
            markdown: "# Weekly Robotics #310\n\n- [Robot](https://robots.test/a)".into(),
        };

        let doc = summarize(&client, &issue).await.unwrap();

        assert_eq!(doc.headline.as_deref(), Some("휴머노이드 양산 시작"));
        assert_eq!(doc.thumbnail.as_deref(), Some("https://cdn.test/cover.png"));
        assert_eq!(doc.issue_number.as_deref(), Some("310"));
        assert!(doc.markdown.starts_with("![Weekly Robotics](https://cdn.test/cover.png)\n\n## 🤖"));
        assert!(doc.markdown.contains("[자세히 보기](https://robots.test/a)"));
        assert!(doc.markdown.ends_with(&format!(
            "\n\n---\n📖 출처: [Weekly Robotics #310]({URL})"
        )));
        assert_eq!(doc.title(None), format!("[Robotics News, {}] 휴머노이드 양산 시작", doc.date));
    }

    #[tokio::test]
    async fn test_default_headline_without_meta_line() {
        let client = Scripted::answering(&["## 🤖 이번 주 핵심 동향\n\n내용"]);
        let issue = FetchedIssue {
            url: URL.into(),
            markdown: "# Issue".into(),
        };
        let doc = summarize(&client, &issue).await.unwrap();
        assert_eq!(doc.headline, None);
        assert_eq!(doc.headline_or_default(), "Weekly Robotics #310");
    }
}
